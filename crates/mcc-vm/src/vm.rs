//! Fetch-decode-dispatch loop over the bytecode produced by `mcc-par`.
//!
//! Registers mirror the original machine directly (`pc`, `rbp`, `rsp`,
//! `rax`), but `pc` indexes a plain `Vec<i64>` code arena instead of
//! dereferencing a raw pointer, and `rbp`/`rsp` are guest addresses
//! resolved through [`Memory`] rather than host pointers into the process's
//! own stack.
//!
//! The bootstrap trailer the original embeds by writing `PUSH`/`EXIT`
//! opcode words directly into the guest stack and jumping `pc` into it is
//! replaced here by appending those two words to the code arena itself and
//! using their arena index as the fake return address — same observable
//! behavior (`main` returning falls through `PUSH` then `EXIT`), no
//! code-as-data aliasing.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Read as _;

use mcc_util::{McccError, Opcode, Program, WORD_SIZE};

use crate::memory::Memory;

const O_WRONLY: i64 = 0o1;
const O_RDWR: i64 = 0o2;
const O_CREAT: i64 = 0o100;
const O_TRUNC: i64 = 0o1000;
const O_APPEND: i64 = 0o2000;

pub struct Vm {
    code: Vec<i64>,
    mem: Memory,
    pc: usize,
    rbp: i64,
    rsp: i64,
    rax: i64,
    debug: bool,
    files: HashMap<i64, File>,
    next_fd: i64,
}

impl Vm {
    /// Builds a VM ready to execute `program`, with `guest_args` exposed to
    /// the guest as its own `argc`/`argv`.
    pub fn new(program: &Program, guest_args: &[String], debug: bool) -> Result<Self, McccError> {
        let main_entry = program.main_entry.ok_or(McccError::MainNotDefined)?;

        let mut code = program.code.clone();
        let trailer_push = code.len() as i64;
        code.push(Opcode::Push.as_word());
        code.push(Opcode::Exit.as_word());

        let mut mem = Memory::new(program.data.clone(), mcc_util::POOL_SIZE);
        let (argc, argv_addr) = setup_guest_args(&mut mem, guest_args)?;

        let mut rsp = mem.stack_top();
        rsp -= WORD_SIZE;
        mem.write_word(rsp, argc)?;
        rsp -= WORD_SIZE;
        mem.write_word(rsp, argv_addr)?;
        rsp -= WORD_SIZE;
        mem.write_word(rsp, trailer_push)?;

        tracing::debug!(main_entry, argc, "vm starting");

        Ok(Vm {
            code,
            mem,
            pc: main_entry,
            rbp: 0,
            rsp,
            rax: 0,
            debug,
            files: HashMap::new(),
            next_fd: 3,
        })
    }

    /// Runs to completion, returning the guest's exit code.
    pub fn run(mut self) -> Result<i64, McccError> {
        let mut cycle: i64 = 0;
        loop {
            let op = self.fetch_op()?;
            cycle += 1;
            self.trace(cycle, op);

            match op {
                Opcode::Imm => self.rax = self.fetch_imm()?,
                Opcode::Lea => {
                    let k = self.fetch_imm()?;
                    self.rax = self.rbp + k * WORD_SIZE;
                }
                Opcode::Jmp => self.pc = self.fetch_imm()? as usize,
                Opcode::Jz => {
                    let target = self.fetch_imm()?;
                    if self.rax == 0 {
                        self.pc = target as usize;
                    }
                }
                Opcode::Jnz => {
                    let target = self.fetch_imm()?;
                    if self.rax != 0 {
                        self.pc = target as usize;
                    }
                }
                Opcode::Jsr => {
                    let target = self.fetch_imm()?;
                    self.push(self.pc as i64)?;
                    self.pc = target as usize;
                }
                Opcode::Ent => {
                    let n = self.fetch_imm()?;
                    self.push(self.rbp)?;
                    self.rbp = self.rsp;
                    self.rsp -= n * WORD_SIZE;
                }
                Opcode::Adj => {
                    let n = self.fetch_imm()?;
                    self.rsp += n * WORD_SIZE;
                }
                Opcode::Lev => {
                    self.rsp = self.rbp;
                    self.rbp = self.pop()?;
                    self.pc = self.pop()? as usize;
                }
                Opcode::Li => self.rax = self.mem.read_word(self.rax)?,
                Opcode::Lc => self.rax = self.mem.read_byte(self.rax)? as i64,
                Opcode::Si => {
                    let addr = self.pop()?;
                    self.mem.write_word(addr, self.rax)?;
                }
                Opcode::Sc => {
                    let addr = self.pop()?;
                    self.mem.write_byte(addr, self.rax as u8)?;
                }
                Opcode::Push => self.push(self.rax)?,
                Opcode::Or => self.binary(|a, b| a | b)?,
                Opcode::Xor => self.binary(|a, b| a ^ b)?,
                Opcode::And => self.binary(|a, b| a & b)?,
                Opcode::Eq => self.binary(|a, b| (a == b) as i64)?,
                Opcode::Ne => self.binary(|a, b| (a != b) as i64)?,
                Opcode::Lt => self.binary(|a, b| (a < b) as i64)?,
                Opcode::Gt => self.binary(|a, b| (a > b) as i64)?,
                Opcode::Le => self.binary(|a, b| (a <= b) as i64)?,
                Opcode::Ge => self.binary(|a, b| (a >= b) as i64)?,
                Opcode::Shl => self.binary(|a, b| a.wrapping_shl(b as u32 & 63))?,
                Opcode::Shr => self.binary(|a, b| a.wrapping_shr(b as u32 & 63))?,
                Opcode::Add => self.binary(|a, b| a.wrapping_add(b))?,
                Opcode::Sub => self.binary(|a, b| a.wrapping_sub(b))?,
                Opcode::Mul => self.binary(|a, b| a.wrapping_mul(b))?,
                Opcode::Div => self.binary(|a, b| a.checked_div(b).unwrap_or(0))?,
                Opcode::Mod => self.binary(|a, b| a.checked_rem(b).unwrap_or(0))?,
                Opcode::Open => self.sys_open()?,
                Opcode::Read => self.sys_read()?,
                Opcode::Clos => self.sys_close()?,
                Opcode::Prtf => self.sys_printf()?,
                Opcode::Malc => {
                    let n = self.arg(0)?;
                    self.rax = self.mem.malloc(n)?;
                }
                Opcode::Mset => self.sys_memset()?,
                Opcode::Mcmp => self.sys_memcmp()?,
                Opcode::Exit => {
                    let code = self.mem.read_word(self.rsp)?;
                    println!("exit({code}) cycle = {cycle}");
                    return Ok(code);
                }
            }
        }
    }

    // ---- fetch/stack helpers -------------------------------------------

    fn fetch_op(&mut self) -> Result<Opcode, McccError> {
        let word = self.code.get(self.pc).copied().ok_or(McccError::OutOfBounds { addr: self.pc as i64 })?;
        self.pc += 1;
        Opcode::from_word(word).ok_or(McccError::UnknownInstruction(word))
    }

    fn fetch_imm(&mut self) -> Result<i64, McccError> {
        let word = self.code.get(self.pc).copied().ok_or(McccError::OutOfBounds { addr: self.pc as i64 })?;
        self.pc += 1;
        Ok(word)
    }

    fn push(&mut self, value: i64) -> Result<(), McccError> {
        self.rsp -= WORD_SIZE;
        self.mem.write_word(self.rsp, value)
    }

    fn pop(&mut self) -> Result<i64, McccError> {
        let value = self.mem.read_word(self.rsp)?;
        self.rsp += WORD_SIZE;
        Ok(value)
    }

    fn binary(&mut self, f: impl Fn(i64, i64) -> i64) -> Result<(), McccError> {
        let lhs = self.pop()?;
        self.rax = f(lhs, self.rax);
        Ok(())
    }

    /// Reads call argument `n` (0 = nearest the top) without popping it —
    /// the caller's `ADJ` is what eventually discards these words.
    fn arg(&self, n: i64) -> Result<i64, McccError> {
        self.mem.read_word(self.rsp + n * WORD_SIZE)
    }

    fn trace(&self, cycle: i64, op: Opcode) {
        if !self.debug {
            return;
        }
        if op.has_immediate() {
            let imm = self.code.get(self.pc).copied().unwrap_or(0);
            println!("{cycle}> {} {imm}", op.mnemonic());
        } else {
            println!("{cycle}> {}", op.mnemonic());
        }
    }

    // ---- system calls ----------------------------------------------------

    fn sys_open(&mut self) -> Result<(), McccError> {
        let path_addr = self.arg(1)?;
        let flags = self.arg(0)?;
        let path_bytes = self.mem.read_cstr(path_addr)?;
        let path = String::from_utf8_lossy(&path_bytes).into_owned();

        let write = flags & (O_WRONLY | O_RDWR) != 0;
        let opened = if write {
            OpenOptions::new()
                .write(true)
                .read(flags & O_RDWR != 0)
                .create(flags & O_CREAT != 0)
                .truncate(flags & O_TRUNC != 0)
                .append(flags & O_APPEND != 0)
                .open(&path)
        } else {
            File::open(&path)
        };

        self.rax = match opened {
            Ok(file) => {
                let fd = self.next_fd;
                self.next_fd += 1;
                self.files.insert(fd, file);
                fd
            }
            Err(err) => {
                tracing::debug!(%path, %err, "guest open failed");
                -1
            }
        };
        Ok(())
    }

    fn sys_read(&mut self) -> Result<(), McccError> {
        let fd = self.arg(2)?;
        let buf_addr = self.arg(1)?;
        let n = self.arg(0)?;
        self.rax = match self.files.get_mut(&fd) {
            Some(file) => {
                let mut buffer = vec![0u8; n.max(0) as usize];
                match file.read(&mut buffer) {
                    Ok(read) => {
                        self.mem.write_bytes(buf_addr, &buffer[..read])?;
                        read as i64
                    }
                    Err(_) => -1,
                }
            }
            None => -1,
        };
        Ok(())
    }

    fn sys_close(&mut self) -> Result<(), McccError> {
        let fd = self.arg(0)?;
        self.rax = if self.files.remove(&fd).is_some() { 0 } else { -1 };
        Ok(())
    }

    fn sys_memset(&mut self) -> Result<(), McccError> {
        let ptr = self.arg(2)?;
        let value = self.arg(1)? as u8;
        let n = self.arg(0)?;
        let bytes = vec![value; n.max(0) as usize];
        self.mem.write_bytes(ptr, &bytes)?;
        self.rax = ptr;
        Ok(())
    }

    fn sys_memcmp(&mut self) -> Result<(), McccError> {
        let a = self.arg(2)?;
        let b = self.arg(1)?;
        let n = self.arg(0)?.max(0) as usize;
        let lhs = self.mem.read_bytes(a, n)?.to_vec();
        let rhs = self.mem.read_bytes(b, n)?;
        self.rax = lhs
            .iter()
            .zip(rhs.iter())
            .find_map(|(&x, &y)| (x != y).then_some(x as i64 - y as i64))
            .unwrap_or(0);
        Ok(())
    }

    /// `PRTF`'s argument count lives in the immediate of the `ADJ` that
    /// must immediately follow it (the original reads `pc[1]` off the not-
    /// yet-executed next instruction).
    fn sys_printf(&mut self) -> Result<(), McccError> {
        let argc = self.code.get(self.pc + 1).copied().ok_or(McccError::OutOfBounds { addr: self.pc as i64 })?;
        let base = self.rsp + argc * WORD_SIZE;

        let fmt_addr = self.mem.read_word(base - WORD_SIZE)?;
        let fmt = self.mem.read_cstr(fmt_addr)?;

        let mut args = Vec::new();
        for i in 2..=6i64 {
            if i > argc {
                break;
            }
            args.push(self.mem.read_word(base - i * WORD_SIZE)?);
        }

        let out = format_printf(&fmt, &args, &self.mem)?;
        print!("{out}");
        self.rax = out.len() as i64;
        Ok(())
    }
}

fn setup_guest_args(mem: &mut Memory, guest_args: &[String]) -> Result<(i64, i64), McccError> {
    let mut ptrs = Vec::with_capacity(guest_args.len());
    for arg in guest_args {
        let mut bytes = arg.as_bytes().to_vec();
        bytes.push(0);
        let addr = mem.malloc(bytes.len() as i64)?;
        mem.write_bytes(addr, &bytes)?;
        ptrs.push(addr);
    }
    let table_addr = mem.malloc((ptrs.len() as i64) * WORD_SIZE)?;
    for (i, addr) in ptrs.iter().enumerate() {
        mem.write_word(table_addr + (i as i64) * WORD_SIZE, *addr)?;
    }
    Ok((guest_args.len() as i64, table_addr))
}

/// A minimal `printf` covering the conversions the language's call sites
/// actually use: `%d`/`%ld`/`%lld` (decimal), `%s` (NUL-terminated guest
/// string), `%c` (low byte), `%x` (hex), `%%` (literal percent). Anything
/// else passes through unconverted.
fn format_printf(fmt: &[u8], args: &[i64], mem: &Memory) -> Result<String, McccError> {
    let mut out = String::new();
    let mut args = args.iter();
    let mut i = 0;
    while i < fmt.len() {
        if fmt[i] != b'%' {
            out.push(fmt[i] as char);
            i += 1;
            continue;
        }
        i += 1;
        while i < fmt.len() && (fmt[i] == b'l' || fmt[i] == b'h') {
            i += 1;
        }
        if i >= fmt.len() {
            out.push('%');
            break;
        }
        match fmt[i] {
            b'%' => out.push('%'),
            b'd' | b'i' => out.push_str(&args.next().copied().unwrap_or(0).to_string()),
            b'x' => out.push_str(&format!("{:x}", args.next().copied().unwrap_or(0))),
            b'c' => out.push(args.next().copied().unwrap_or(0) as u8 as char),
            b's' => {
                let addr = args.next().copied().unwrap_or(0);
                let bytes = mem.read_cstr(addr)?;
                out.push_str(&String::from_utf8_lossy(&bytes));
            }
            other => {
                out.push('%');
                out.push(other as char);
            }
        }
        i += 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcc_util::Program;

    fn program_returning(value: i64) -> Program {
        let mut p = Program::new();
        let entry = p.here();
        p.emit(Opcode::Ent);
        p.emit_word(0);
        p.emit(Opcode::Imm);
        p.emit_word(value);
        p.emit(Opcode::Lev);
        p.main_entry = Some(entry);
        p
    }

    #[test]
    fn returns_main_return_value_as_exit_code() {
        let program = program_returning(42);
        let vm = Vm::new(&program, &[], false).unwrap();
        assert_eq!(vm.run().unwrap(), 42);
    }

    #[test]
    fn arithmetic_and_memory_round_trip() {
        let mut p = Program::new();
        let global = p.alloc_global();
        let entry = p.here();
        p.emit(Opcode::Ent);
        p.emit_word(0);
        // global = 5
        p.emit(Opcode::Imm);
        p.emit_word(global);
        p.emit(Opcode::Push);
        p.emit(Opcode::Imm);
        p.emit_word(5);
        p.emit(Opcode::Si);
        // return global + 1
        p.emit(Opcode::Imm);
        p.emit_word(global);
        p.emit(Opcode::Li);
        p.emit(Opcode::Push);
        p.emit(Opcode::Imm);
        p.emit_word(1);
        p.emit(Opcode::Add);
        p.emit(Opcode::Lev);
        p.main_entry = Some(entry);

        let vm = Vm::new(&p, &[], false).unwrap();
        assert_eq!(vm.run().unwrap(), 6);
    }

    #[test]
    fn unknown_opcode_is_a_checked_error() {
        let mut p = Program::new();
        let entry = p.here();
        p.emit_word(999);
        p.main_entry = Some(entry);
        let vm = Vm::new(&p, &[], false).unwrap();
        assert!(matches!(vm.run(), Err(McccError::UnknownInstruction(999))));
    }

    #[test]
    fn printf_formats_decimal_and_string() {
        let mem = Memory::new(b"n=%d %s\0hi\0".to_vec(), 8);
        let out = format_printf(b"n=%d %s", &[7, 8], &mem).unwrap();
        assert_eq!(out, "n=7 hi");
    }
}
