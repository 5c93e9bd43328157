//! `-s` source listing: a disassembly of the code arena grouped by the
//! source line that produced each run of instructions, built incrementally
//! as the single-pass emitter advances through the token stream.

use std::fmt::Write as _;

use mcc_util::Opcode;

pub struct Listing {
    buf: String,
    flushed_up_to: usize,
}

impl Listing {
    pub fn new() -> Self {
        Listing {
            buf: String::new(),
            flushed_up_to: 0,
        }
    }

    /// Called whenever the parser moves onto a new source line: flushes the
    /// instructions emitted for the line just finished, then opens a header
    /// for the line about to start.
    pub fn on_advance(&mut self, line: u32, code: &[i64]) {
        self.flush(code);
        let _ = writeln!(self.buf, "{line}:");
    }

    fn flush(&mut self, code: &[i64]) {
        let mut i = self.flushed_up_to;
        while i < code.len() {
            let op = match Opcode::from_word(code[i]) {
                Some(op) => op,
                None => break,
            };
            if op.has_immediate() && i + 1 < code.len() {
                let _ = writeln!(self.buf, "{} {}", op.mnemonic(), code[i + 1]);
                i += 2;
            } else {
                let _ = writeln!(self.buf, "{}", op.mnemonic());
                i += 1;
            }
        }
        self.flushed_up_to = i;
    }

    pub fn finish(mut self, code: &[i64]) -> String {
        self.flush(code);
        self.buf
    }
}

impl Default for Listing {
    fn default() -> Self {
        Self::new()
    }
}
