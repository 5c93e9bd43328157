//! Single-pass parser and code generator for the mcc toolchain: consumes a
//! token stream from `mcc-lex` and emits a `mcc_util::Program` directly,
//! with no intermediate AST.

mod listing;
mod parser;
mod symtab;

pub use parser::{parse, ParseOutput};
pub use symtab::{install_sys_calls, SymbolTable};
