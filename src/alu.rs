//! ALU implementation

use crate::instruction::{ControlSignals, Opcode};

/// Everything the ALU may read besides the control signals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AluInput {
    pub rs1: i32,
    pub rs2: i32,
    pub pc: i32,
    /// Current value of the addressed CSR
    pub csr: i32,
    pub imm: i32,
    pub zimm: i32,
}

/// Computes the per-opcode result.
/// All arithmetic wraps; a NOP evaluates to 0.
pub fn execute(signals: &ControlSignals, input: &AluInput) -> i32 {
    let Some(opcode) = signals.opcode else {
        return 0;
    };
    let AluInput { rs1, rs2, pc, csr, imm, zimm } = *input;

    use Opcode::*;
    match opcode {
        LUI => imm,
        AUIPC => pc.wrapping_add(imm),
        JAL | JALR => pc.wrapping_add(4),

        BEQ => (rs1 == rs2) as i32,
        BNE => (rs1 != rs2) as i32,
        BLT => (rs1 < rs2) as i32,
        BGE => (rs1 >= rs2) as i32,
        BLTU => ((rs1 as u32) < (rs2 as u32)) as i32,
        BGEU => ((rs1 as u32) >= (rs2 as u32)) as i32,

        LB | LH | LW | LBU | LHU | SB | SH | SW => rs1.wrapping_add(imm),

        ADDI => rs1.wrapping_add(imm),
        SLTI => (rs1 < imm) as i32,
        SLTIU => ((rs1 as u32) < (imm as u32)) as i32,
        XORI => rs1 ^ imm,
        ORI => rs1 | imm,
        ANDI => rs1 & imm,
        SLLI => shift_left(rs1, imm),
        SRLI => shift_right_logical(rs1, imm),
        SRAI => shift_right_arith(rs1, imm),

        ADD => rs1.wrapping_add(rs2),
        SUB => rs1.wrapping_sub(rs2),
        SLL => shift_left(rs1, rs2),
        SLT => (rs1 < rs2) as i32,
        SLTU => ((rs1 as u32) < (rs2 as u32)) as i32,
        XOR => rs1 ^ rs2,
        SRL => shift_right_logical(rs1, rs2),
        SRA => shift_right_arith(rs1, rs2),
        OR => rs1 | rs2,
        AND => rs1 & rs2,

        // New CSR value; the old one goes to rd
        CSRRW => rs1,
        CSRRS => rs1 | csr,
        CSRRC => !rs1 & csr,
        CSRRWI => zimm,
        CSRRSI => zimm | csr,
        CSRRCI => !zimm & csr,

        MUL => rs1.wrapping_mul(rs2),
        MULH => ((rs1 as i64 * rs2 as i64) >> 32) as i32,
        MULHSU => ((rs1 as i64 * (rs2 as u32) as i64) >> 32) as i32,
        MULHU => (((rs1 as u32) as u64 * (rs2 as u32) as u64) >> 32) as i32,
        DIV => match rs2 {
            0 => -1,
            _ => rs1.wrapping_div(rs2),
        },
        DIVU => match rs2 {
            0 => u32::MAX as i32,
            _ => ((rs1 as u32) / (rs2 as u32)) as i32,
        },
        REM => match rs2 {
            0 => rs1,
            _ => rs1.wrapping_rem(rs2),
        },
        REMU => match rs2 {
            0 => rs1,
            _ => ((rs1 as u32) % (rs2 as u32)) as i32,
        },

        FENCE | FENCE_I | ECALL | EBREAK | MRET | EXT | EXTX => 0,
    }
}

/// Whether the instruction redirects the PC given its ALU result
pub fn branch_taken(signals: &ControlSignals, result: i32) -> bool {
    match signals.opcode {
        Some(Opcode::JAL | Opcode::JALR) => true,
        Some(op) if op.is_branch() => result != 0,
        _ => false,
    }
}

fn shift_left(value: i32, amount: i32) -> i32 {
    ((value as u32) << (amount as u32 & 0x1f)) as i32
}

fn shift_right_logical(value: i32, amount: i32) -> i32 {
    ((value as u32) >> (amount as u32 & 0x1f)) as i32
}

fn shift_right_arith(value: i32, amount: i32) -> i32 {
    value >> (amount as u32 & 0x1f)
}
