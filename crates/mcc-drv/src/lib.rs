//! Driver: CLI parsing, source loading, and pipeline orchestration
//! (lex → parse/codegen → listing-or-run) for the mcc toolchain.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use mcc_util::{McccError, POOL_SIZE};

#[derive(Parser, Debug)]
#[command(name = "mcc", about = "Toolchain for a restricted C-like language")]
pub struct Cli {
    /// Compile only: print the bytecode listing, do not execute.
    #[arg(short = 's')]
    pub listing_only: bool,

    /// Execute and trace every instruction.
    #[arg(short = 'd')]
    pub debug: bool,

    /// Source file to compile.
    pub file: PathBuf,

    /// Remaining arguments are passed through as the guest's argc/argv.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub guest_args: Vec<String>,
}

/// Runs the full pipeline for one invocation, returning the process exit
/// code: the guest's own return value on success, or a negative code on
/// any compile/runtime failure.
pub fn run(cli: Cli) -> i32 {
    mcc_util::init_logging(cli.debug);

    match run_inner(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            err.exit_code()
        }
    }
}

fn run_inner(cli: &Cli) -> Result<i32, McccError> {
    let source = read_source(&cli.file)?;

    tracing::debug!(file = %cli.file.display(), "lexing");
    let tokens = mcc_lex::tokenize(&source)?;

    tracing::debug!(tokens = tokens.len(), "parsing");
    let output = mcc_par::parse(tokens, cli.listing_only)?;

    if let Some(listing) = output.listing {
        print!("{listing}");
        return Ok(0);
    }

    let vm = mcc_vm::Vm::new(&output.program, &cli.guest_args, cli.debug)?;
    let code = vm.run()?;
    Ok(code as i32)
}

/// Reads the source file into a fixed-size buffer, silently truncating
/// anything past [`POOL_SIZE`] — the original tool's single pre-sized
/// source pool has no overflow warning, and this preserves that.
fn read_source(path: &std::path::Path) -> Result<String, McccError> {
    let mut file = File::open(path).map_err(|_| McccError::OpenFailed(path.display().to_string()))?;

    let mut buf = vec![0u8; POOL_SIZE - 1];
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(_) => break,
        }
    }
    if total == 0 {
        return Err(McccError::ReadFailed(0));
    }
    buf.truncate(total);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
