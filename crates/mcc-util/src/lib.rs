//! Shared foundation types for the mcc toolchain: the bytecode opcode set,
//! symbol-table value types, the unified error type, and logging setup.
//!
//! Everything here is deliberately small — this crate exists so the lexer,
//! parser/codegen, VM, and driver agree on one `Opcode` encoding and one
//! error vocabulary instead of each defining their own.

mod error;
mod opcode;
mod program;
mod symbol;

pub use error::{McccError, Result};
pub use opcode::Opcode;
pub use program::Program;
pub use symbol::{DataType, Symbol, SymbolClass, PTR};

/// Fixed size of the memory pool backing the source buffer, code arena,
/// data arena, and VM stack, in bytes.
pub const POOL_SIZE: usize = 256 * 1024;

/// Machine word size in bytes, used to scale pointer arithmetic.
pub const WORD_SIZE: i64 = 8;

/// Install the process-wide `tracing` subscriber.
///
/// Respects `RUST_LOG`; defaults to `info` when unset, or `trace` when
/// `debug` is requested on the command line so `-d` traces line up with
/// what `tracing` captures in addition to the VM's own stdout trace.
pub fn init_logging(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_directive = if debug { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
