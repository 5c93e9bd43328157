//! Error types shared by every toolchain stage.
//!
//! Every variant's `Display` reproduces the original tool's diagnostic text
//! so stderr output stays a stable, testable interface. All errors here are
//! fatal: there is no recovery path, only immediate termination with a
//! process exit code (see [`McccError::exit_code`]).

use thiserror::Error;

/// Unified error type returned by the lexer, parser/codegen, and VM.
#[derive(Debug, Error)]
pub enum McccError {
    /// Source file could not be opened.
    #[error("could not open({0})")]
    OpenFailed(String),

    /// `read()` returned zero or a negative byte count.
    #[error("read() returned {0}")]
    ReadFailed(i64),

    /// A character matched none of the lexer's scanning rules.
    #[error("line:{line}, unexpected character '{ch}'")]
    UnexpectedChar { line: u32, ch: char },

    /// A numeric literal has more than one `.` or is a bare `.`.
    #[error("line:{line}, Invalid number: {lexeme}")]
    InvalidNumber { line: u32, lexeme: String },

    /// A numeric literal with a `.` reached the parser (no floating point support).
    #[error("line:{line}, floating point literals are not supported: {lexeme}")]
    FloatingPointLiteral { line: u32, lexeme: String },

    /// `strtoll`-equivalent conversion left trailing characters.
    #[error("bad number {0}")]
    BadNumber(String),

    /// Expected token kind did not match the actual one.
    #[error("line:{line}, expected: {expected}, but got {actual}")]
    UnexpectedToken {
        line: u32,
        expected: String,
        actual: String,
    },

    /// A base type keyword other than `char`/`int`/`void` appeared in a declaration.
    #[error("line:{line}, unsupported datatype {lexeme}")]
    UnsupportedDataType { line: u32, lexeme: String },

    /// Same `(hash, name)` inserted twice into one symbol table.
    #[error("line:{line}, duplicate definition of {name}")]
    DuplicateSymbol { line: u32, name: String },

    /// Reference to a name with no matching symbol-table entry.
    #[error("line:{line}, undefined variable {name}")]
    UndefinedVariable { line: u32, name: String },

    /// Call to a name with no matching global symbol-table entry.
    #[error("line:{line}, undefined function {name}")]
    UndefinedFunction { line: u32, name: String },

    /// `enum` initializer was not a `NUMBER` token.
    #[error("bad enum initializer:{0}")]
    BadEnumInitializer(String),

    /// Malformed global-variable declaration (bad separator).
    #[error("bad variable declaration:{0}")]
    BadGlobalDeclaration(String),

    /// Malformed local-variable declaration inside a function body.
    #[error("line:{line}, bad variable declaration:{kind}")]
    BadLocalDeclaration { line: u32, kind: String },

    /// Comma in a parameter list not followed by another parameter.
    #[error("line:{line} bad symbol {lexeme}")]
    BadParameterList { line: u32, lexeme: String },

    /// `*expr` applied to a non-pointer.
    #[error("{line}: bad dereference")]
    BadDereference { line: u32 },

    /// `&expr` applied to something that did not end in a load.
    #[error("{line}: bad address of")]
    BadAddressOf { line: u32 },

    /// Left-hand side of `=` did not end in a load.
    #[error("{line}: bad lvalue in assignment")]
    BadLvalueAssignment { line: u32 },

    /// Operand of prefix `++`/`--` did not end in a load.
    #[error("{line}: bad lvalue of pre-increment")]
    BadLvaluePreIncrement { line: u32 },

    /// Operand of postfix `++`/`--` did not end in a load.
    #[error("{line}: bad value in increment")]
    BadLvaluePostIncrement { line: u32 },

    /// `?:` without a matching `:`.
    #[error("{line}: missing colon in conditional")]
    MissingColon { line: u32 },

    /// `[]` applied to a non-pointer base.
    #[error("{line}: pointer type expected")]
    NotAPointer { line: u32 },

    /// No production matched at the start of an expression.
    #[error("line:{line}: bad expression")]
    BadExpression { line: u32 },

    /// Binary/postfix dispatch saw a token kind it has no handler for.
    #[error("{line}: compiler error, token = {kind}")]
    BadOperatorToken { line: u32, kind: String },

    /// `main` was never defined.
    #[error("main function is not defined")]
    MainNotDefined,

    /// The VM fetched a word outside the `{LEA..EXIT}` opcode range.
    #[error("unknown instruction:{0}")]
    UnknownInstruction(i64),

    /// A `Memory` access fell outside the data/heap/stack address space.
    #[error("segmentation fault: address {addr} out of bounds")]
    OutOfBounds { addr: i64 },
}

impl McccError {
    /// Process exit code the original tool would have produced for this failure.
    ///
    /// Lexical/syntactic/semantic errors and "main not defined" are reported
    /// via `exit(-1)` in the source; unknown VM opcodes return `-1` from
    /// `vm_run` rather than calling `exit` directly, but the observable
    /// process status is the same.
    pub fn exit_code(&self) -> i32 {
        match self {
            McccError::UnknownInstruction(_) | McccError::OutOfBounds { .. } => -1,
            _ => -1,
        }
    }
}

/// Result alias used throughout the toolchain.
pub type Result<T> = std::result::Result<T, McccError>;
