//! The stack-based virtual machine: a unified-address `Memory` and the
//! fetch-decode-dispatch loop that executes a `mcc_util::Program`.

mod memory;
mod vm;

pub use memory::{Memory, STACK_BASE};
pub use vm::Vm;
