//! Tiny assembler for test programs.
//!
//! Words are produced by the crate's own encoder from hand-filled records, so a
//! program reads like assembly. Register numbers follow the ABI: `A0` = x10,
//! `A7` = x17.

use nebula_core::isa::Instruction;
use nebula_core::isa::encode::encode_word;
use nebula_core::isa::opcode::Opcode;
use nebula_core::sim::loader::Program;

/// First argument / return value.
pub const A0: u8 = 10;
/// Second argument.
pub const A1: u8 = 11;
/// Third argument.
pub const A2: u8 = 12;
/// Syscall number.
pub const A7: u8 = 17;

/// Linux `write`.
pub const SYS_WRITE: i64 = 64;
/// Linux `exit`.
pub const SYS_EXIT: i64 = 93;

fn record(cmd: Opcode, rd: Option<u8>, rs1: Option<u8>, rs2: Option<u8>, imm: Option<i64>) -> u32 {
    let mut insn = Instruction::new(cmd, 0, 4, 0);
    insn.rd = rd;
    insn.rs1 = rs1;
    insn.rs2 = rs2;
    insn.imm = imm;
    encode_word(&insn)
}

/// `addi rd, rs1, imm`
pub fn addi(rd: u8, rs1: u8, imm: i64) -> u32 {
    record(Opcode::Addi, Some(rd), Some(rs1), None, Some(imm))
}

/// Any register-register operation: `cmd rd, rs1, rs2`.
pub fn op(cmd: Opcode, rd: u8, rs1: u8, rs2: u8) -> u32 {
    record(cmd, Some(rd), Some(rs1), Some(rs2), None)
}

/// `add rd, rs1, rs2`
pub fn add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    op(Opcode::Add, rd, rs1, rs2)
}

/// `jalr rd, imm(rs1)`
pub fn jalr(rd: u8, rs1: u8, imm: i64) -> u32 {
    record(Opcode::Jalr, Some(rd), Some(rs1), None, Some(imm))
}

/// `lui rd, imm` where `imm` is the final (already shifted) value.
pub fn lui(rd: u8, imm: i64) -> u32 {
    record(Opcode::Lui, Some(rd), None, None, Some(imm))
}

/// `lw rd, imm(rs1)`
pub fn lw(rd: u8, rs1: u8, imm: i64) -> u32 {
    record(Opcode::Lw, Some(rd), Some(rs1), None, Some(imm))
}

/// `ld rd, imm(rs1)`
pub fn ld(rd: u8, rs1: u8, imm: i64) -> u32 {
    record(Opcode::Ld, Some(rd), Some(rs1), None, Some(imm))
}

/// `sw rs2, imm(rs1)`
pub fn sw(rs2: u8, rs1: u8, imm: i64) -> u32 {
    record(Opcode::Sw, None, Some(rs1), Some(rs2), Some(imm))
}

/// `sd rs2, imm(rs1)`
pub fn sd(rs2: u8, rs1: u8, imm: i64) -> u32 {
    record(Opcode::Sd, None, Some(rs1), Some(rs2), Some(imm))
}

/// `bne rs1, rs2, offset`
pub fn bne(rs1: u8, rs2: u8, offset: i64) -> u32 {
    record(Opcode::Bne, None, Some(rs1), Some(rs2), Some(offset))
}

/// `beq rs1, rs2, offset`
pub fn beq(rs1: u8, rs2: u8, offset: i64) -> u32 {
    record(Opcode::Beq, None, Some(rs1), Some(rs2), Some(offset))
}

/// `jal rd, offset`
pub fn jal(rd: u8, offset: i64) -> u32 {
    record(Opcode::Jal, Some(rd), None, None, Some(offset))
}

/// `ecall`
pub const fn ecall() -> u32 {
    0x0000_0073
}

/// `exit(a0)` followed by a self-loop so nothing past the program is fetched.
pub fn exit_with(code: i64) -> Vec<u32> {
    vec![addi(A0, 0, code), addi(A7, 0, SYS_EXIT), ecall(), jal(0, 0)]
}

/// `exit(a0)` with whatever is already in `a0`.
pub fn exit() -> Vec<u32> {
    vec![addi(A7, 0, SYS_EXIT), ecall(), jal(0, 0)]
}

/// Little-endian bytes of `words`.
pub fn bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// A raw image of `words` at `addr`, entered at `addr`.
pub fn program(addr: u64, words: &[u32]) -> Program {
    Program::from_bytes(addr, bytes(words))
}
