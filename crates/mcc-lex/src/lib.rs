//! Lexical analysis for the mcc toolchain: turns source text into a flat
//! token stream consumed directly by the single-pass parser/codegen.

mod lexer;
mod token;

pub use lexer::tokenize;
pub use token::{keyword_kind, Token, TokenKind};
