//! The bytecode opcode set shared by the code generator and the VM.
//!
//! Modeled as a tagged sum type per the redesign notes this toolchain
//! follows: the code arena still stores plain `i64` machine words (so
//! jump immediates and instruction streams are homogeneous), but every
//! site that decodes a word does so through [`Opcode::from_word`],
//! making "unknown opcode" an explicit, exhaustively-matched case rather
//! than an unchecked array index into a mnemonic table.

use std::fmt;

/// One VM instruction. Variants carrying a payload are exactly the
/// eight opcodes that consume an immediate word from the code arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Lea,
    Imm,
    Jmp,
    Jsr,
    Jz,
    Jnz,
    Ent,
    Adj,
    Lev,
    Li,
    Lc,
    Si,
    Sc,
    Push,
    Or,
    Xor,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Open,
    Read,
    Clos,
    Prtf,
    Malc,
    Mset,
    Mcmp,
    Exit,
}

impl Opcode {
    /// All opcodes, in their original enum declaration order. The order
    /// matters: it's the order that backs [`Opcode::as_word`], and it is
    /// the order the single-pass emitter and VM fetch-decode loop agree on.
    const ORDER: [Opcode; 38] = [
        Opcode::Lea,
        Opcode::Imm,
        Opcode::Jmp,
        Opcode::Jsr,
        Opcode::Jz,
        Opcode::Jnz,
        Opcode::Ent,
        Opcode::Adj,
        Opcode::Lev,
        Opcode::Li,
        Opcode::Lc,
        Opcode::Si,
        Opcode::Sc,
        Opcode::Push,
        Opcode::Or,
        Opcode::Xor,
        Opcode::And,
        Opcode::Eq,
        Opcode::Ne,
        Opcode::Lt,
        Opcode::Gt,
        Opcode::Le,
        Opcode::Ge,
        Opcode::Shl,
        Opcode::Shr,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Open,
        Opcode::Read,
        Opcode::Clos,
        Opcode::Prtf,
        Opcode::Malc,
        Opcode::Mset,
        Opcode::Mcmp,
        Opcode::Exit,
    ];

    /// Encode as the machine word stored in the code arena.
    pub fn as_word(self) -> i64 {
        self as i64
    }

    /// Decode a machine word fetched from the code arena.
    pub fn from_word(word: i64) -> Option<Opcode> {
        if word < 0 {
            return None;
        }
        Self::ORDER.get(word as usize).copied()
    }

    /// True for the eight opcodes whose encoding consumes a following
    /// immediate word (`LEA, IMM, JMP, JSR, JZ, JNZ, ENT, ADJ`).
    pub fn has_immediate(self) -> bool {
        matches!(
            self,
            Opcode::Lea
                | Opcode::Imm
                | Opcode::Jmp
                | Opcode::Jsr
                | Opcode::Jz
                | Opcode::Jnz
                | Opcode::Ent
                | Opcode::Adj
        )
    }

    /// Four-letter mnemonic, matching the original trace/listing table.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Lea => "LEA",
            Opcode::Imm => "IMM",
            Opcode::Jmp => "JMP",
            Opcode::Jsr => "JSR",
            Opcode::Jz => "JZ",
            Opcode::Jnz => "JNZ",
            Opcode::Ent => "ENT",
            Opcode::Adj => "ADJ",
            Opcode::Lev => "LEV",
            Opcode::Li => "LI",
            Opcode::Lc => "LC",
            Opcode::Si => "SI",
            Opcode::Sc => "SC",
            Opcode::Push => "PUSH",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::And => "AND",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "LT",
            Opcode::Gt => "GT",
            Opcode::Le => "LE",
            Opcode::Ge => "GE",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Open => "OPEN",
            Opcode::Read => "READ",
            Opcode::Clos => "CLOS",
            Opcode::Prtf => "PRTF",
            Opcode::Malc => "MALC",
            Opcode::Mset => "MSET",
            Opcode::Mcmp => "MCMP",
            Opcode::Exit => "EXIT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_opcode() {
        for (i, op) in Opcode::ORDER.iter().enumerate() {
            assert_eq!(op.as_word(), i as i64);
            assert_eq!(Opcode::from_word(i as i64), Some(*op));
        }
    }

    #[test]
    fn unknown_word_is_none() {
        assert_eq!(Opcode::from_word(-1), None);
        assert_eq!(Opcode::from_word(38), None);
    }

    #[test]
    fn immediate_set_matches_original_boundary() {
        for op in Opcode::ORDER {
            let expected = op.as_word() <= Opcode::Adj.as_word();
            assert_eq!(op.has_immediate(), expected, "{op:?}");
        }
    }
}
