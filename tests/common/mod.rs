//! Instruction encoders and core setup shared by the integration tests

#![allow(dead_code)]

use core_lib::config::CoreConfig;
use core_lib::memory::StorageInterface;
use core_lib::pipelined::Core;
use core_lib::single_cycle::SingleCycleCore;

pub const OP: u32 = 0x33;
pub const OP_IMM: u32 = 0x13;
pub const LOAD: u32 = 0x03;
pub const STORE: u32 = 0x23;
pub const BRANCH: u32 = 0x63;
pub const JAL: u32 = 0x6f;
pub const JALR: u32 = 0x67;
pub const LUI: u32 = 0x37;
pub const SYSTEM: u32 = 0x73;

pub const ECALL: u32 = 0x0000_0073;
pub const EBREAK: u32 = 0x0010_0073;
pub const MRET: u32 = 0x3020_0073;
pub const FENCE_I: u32 = 0x0000_100f;
pub const NOP: u32 = 0x0000_0013;

pub fn r_type(funct7: u32, rs2: u8, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    (funct7 << 25) | ((rs2 as u32) << 20) | ((rs1 as u32) << 15) | (funct3 << 12) | ((rd as u32) << 7) | opcode
}

pub fn i_type(imm: i32, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    (((imm as u32) & 0xfff) << 20) | ((rs1 as u32) << 15) | (funct3 << 12) | ((rd as u32) << 7) | opcode
}

pub fn s_type(imm: i32, rs2: u8, rs1: u8, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7f) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (funct3 << 12)
        | ((imm & 0x1f) << 7)
        | STORE
}

pub fn b_type(imm: i32, rs2: u8, rs1: u8, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
        | BRANCH
}

pub fn u_type(upper: u32, rd: u8, opcode: u32) -> u32 {
    (upper << 12) | ((rd as u32) << 7) | opcode
}

pub fn j_type(imm: i32, rd: u8) -> u32 {
    let imm = imm as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
        | ((rd as u32) << 7)
        | JAL
}

pub fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, OP_IMM)
}

pub fn add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(0, rs2, rs1, 0, rd, OP)
}

pub fn sub(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(0x20, rs2, rs1, 0, rd, OP)
}

/// RV32M, `funct3` selects MUL..REMU
pub fn muldiv(funct3: u32, rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(1, rs2, rs1, funct3, rd, OP)
}

pub fn lui(rd: u8, upper: u32) -> u32 {
    u_type(upper, rd, LUI)
}

pub fn lw(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 2, rd, LOAD)
}

pub fn lb(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, LOAD)
}

pub fn lbu(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 4, rd, LOAD)
}

pub fn sw(rs2: u8, rs1: u8, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 2)
}

pub fn sb(rs2: u8, rs1: u8, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 0)
}

pub fn beq(rs1: u8, rs2: u8, imm: i32) -> u32 {
    b_type(imm, rs2, rs1, 0)
}

pub fn bne(rs1: u8, rs2: u8, imm: i32) -> u32 {
    b_type(imm, rs2, rs1, 1)
}

pub fn jal(rd: u8, imm: i32) -> u32 {
    j_type(imm, rd)
}

pub fn jalr(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, JALR)
}

pub fn csrrw(rd: u8, csr: u16, rs1: u8) -> u32 {
    i_type(csr as i32, rs1, 1, rd, SYSTEM)
}

pub fn csrrs(rd: u8, csr: u16, rs1: u8) -> u32 {
    i_type(csr as i32, rs1, 2, rd, SYSTEM)
}

pub fn csrrwi(rd: u8, csr: u16, zimm: u8) -> u32 {
    i_type(csr as i32, zimm, 5, rd, SYSTEM)
}

fn place(mem: &mut impl StorageInterface, base: u32, words: &[u32]) {
    for (i, word) in words.iter().enumerate() {
        mem.set32(base + i as u32 * 4, *word);
    }
}

/// Pipelined core with `words` placed at the reset PC
pub fn pipelined_core(words: &[u32], config: CoreConfig) -> Core {
    let mut core = Core::new(config);
    place(core.mem_mut(), config.reset_pc, words);
    core
}

/// Single cycle core with `words` placed at the reset PC
pub fn single_cycle_core(words: &[u32], config: CoreConfig) -> SingleCycleCore {
    let mut core = SingleCycleCore::new(config);
    place(core.mem_mut(), config.reset_pc, words);
    core
}

/// Pads `words` with NOPs up to `index`
pub fn pad_to(words: &mut Vec<u32>, index: usize) {
    while words.len() < index {
        words.push(NOP);
    }
}
