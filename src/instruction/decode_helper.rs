//! Decoding helper functions.
//! Field positions and immediate layouts follow the RV32 base encoding.

use super::ControlSignals;
use super::Opcode;
use super::Operands;

/// Major opcode (bits [6:0])
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MajorOpcode {
    Lui,
    AuiPc,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    Op,
    OpImm,
    MiscMem,
    System,
    Custom0,
    Custom1,
}

/// Instruction format, as far as operand extraction is concerned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    R,
    I,
    IShift,
    S,
    B,
    U,
    J,
    Csr,
    CsrImm,
    Bare,
}

/// Decodes a raw word into its control-signal vector and operand bundle.
///
/// Total over every `u32`: words that do not name a supported instruction
/// decode to the all-false vector with zero operands.
pub fn decode(raw_inst: u32) -> (ControlSignals, Operands) {
    let Some(major) = raw_to_opcode(raw_inst) else {
        return (ControlSignals::default(), Operands::default());
    };
    let Some(opcode) = get_function(major, raw_inst) else {
        return (ControlSignals::default(), Operands::default());
    };

    let operands = parse(opcode_to_format(opcode), raw_inst);
    let signals = get_controls(opcode, &operands);
    (signals, operands)
}

/// Returns the major opcode of a raw instruction
fn raw_to_opcode(raw_inst: u32) -> Option<MajorOpcode> {
    match get_opcode(raw_inst) {
        0x37 => Some(MajorOpcode::Lui),
        0x17 => Some(MajorOpcode::AuiPc),
        0x6f => Some(MajorOpcode::Jal),
        0x67 => Some(MajorOpcode::Jalr),
        0x63 => Some(MajorOpcode::Branch),
        0x03 => Some(MajorOpcode::Load),
        0x23 => Some(MajorOpcode::Store),
        0x33 => Some(MajorOpcode::Op),
        0x13 => Some(MajorOpcode::OpImm),
        0x0f => Some(MajorOpcode::MiscMem),
        0x73 => Some(MajorOpcode::System),
        0x0b => Some(MajorOpcode::Custom0),
        0x2b => Some(MajorOpcode::Custom1),
        _ => None,
    }
}

/// Determines the instruction's mnemonic from opcode, funct3 and funct7
fn get_function(major: MajorOpcode, raw_inst: u32) -> Option<Opcode> {
    use MajorOpcode::*;
    use Opcode::*;

    let funct3 = get_funct3(raw_inst);
    let funct7 = get_funct7(raw_inst);

    Some(match (major, funct3, funct7) {
        (Lui, _, _) => LUI,
        (AuiPc, _, _) => AUIPC,
        (Jal, _, _) => JAL,
        (Jalr, 0b000, _) => JALR,
        (Branch, 0b000, _) => BEQ,
        (Branch, 0b001, _) => BNE,
        (Branch, 0b100, _) => BLT,
        (Branch, 0b101, _) => BGE,
        (Branch, 0b110, _) => BLTU,
        (Branch, 0b111, _) => BGEU,
        (Load, 0b000, _) => LB,
        (Load, 0b001, _) => LH,
        (Load, 0b010, _) => LW,
        (Load, 0b100, _) => LBU,
        (Load, 0b101, _) => LHU,
        (Store, 0b000, _) => SB,
        (Store, 0b001, _) => SH,
        (Store, 0b010, _) => SW,
        (OpImm, 0b000, _) => ADDI,
        (OpImm, 0b010, _) => SLTI,
        (OpImm, 0b011, _) => SLTIU,
        (OpImm, 0b100, _) => XORI,
        (OpImm, 0b110, _) => ORI,
        (OpImm, 0b111, _) => ANDI,
        (OpImm, 0b001, 0b0000000) => SLLI,
        (OpImm, 0b101, 0b0000000) => SRLI,
        (OpImm, 0b101, 0b0100000) => SRAI,
        (Op, 0b000, 0b0000000) => ADD,
        (Op, 0b000, 0b0100000) => SUB,
        (Op, 0b001, 0b0000000) => SLL,
        (Op, 0b010, 0b0000000) => SLT,
        (Op, 0b011, 0b0000000) => SLTU,
        (Op, 0b100, 0b0000000) => XOR,
        (Op, 0b101, 0b0000000) => SRL,
        (Op, 0b101, 0b0100000) => SRA,
        (Op, 0b110, 0b0000000) => OR,
        (Op, 0b111, 0b0000000) => AND,
        (Op, 0b000, 0b0000001) => MUL,
        (Op, 0b001, 0b0000001) => MULH,
        (Op, 0b010, 0b0000001) => MULHSU,
        (Op, 0b011, 0b0000001) => MULHU,
        (Op, 0b100, 0b0000001) => DIV,
        (Op, 0b101, 0b0000001) => DIVU,
        (Op, 0b110, 0b0000001) => REM,
        (Op, 0b111, 0b0000001) => REMU,
        (MiscMem, 0b000, _) => FENCE,
        (MiscMem, 0b001, _) => FENCE_I,
        (System, 0b000, _) => match raw_inst {
            0x0000_0073 => ECALL,
            0x0010_0073 => EBREAK,
            0x3020_0073 => MRET,
            _ => return None,
        },
        (System, 0b001, _) => CSRRW,
        (System, 0b010, _) => CSRRS,
        (System, 0b011, _) => CSRRC,
        (System, 0b101, _) => CSRRWI,
        (System, 0b110, _) => CSRRSI,
        (System, 0b111, _) => CSRRCI,
        (Custom0, _, _) => EXT,
        (Custom1, _, _) => EXTX,
        _ => return None,
    })
}

/// Returns the operand format of a decoded opcode
fn opcode_to_format(opcode: Opcode) -> Format {
    use Opcode::*;
    match opcode {
        LUI | AUIPC => Format::U,
        JAL => Format::J,
        JALR | LB | LH | LW | LBU | LHU => Format::I,
        ADDI | SLTI | SLTIU | XORI | ORI | ANDI => Format::I,
        SLLI | SRLI | SRAI => Format::IShift,
        BEQ | BNE | BLT | BGE | BLTU | BGEU => Format::B,
        SB | SH | SW => Format::S,
        ADD | SUB | SLL | SLT | SLTU | XOR | SRL | SRA | OR | AND => Format::R,
        MUL | MULH | MULHSU | MULHU | DIV | DIVU | REM | REMU => Format::R,
        EXT | EXTX => Format::R,
        CSRRW | CSRRS | CSRRC => Format::Csr,
        CSRRWI | CSRRSI | CSRRCI => Format::CsrImm,
        FENCE | FENCE_I | ECALL | EBREAK | MRET => Format::Bare,
    }
}

/// Derives the pipeline control flags.
/// A write to x0 is not a register update.
fn get_controls(opcode: Opcode, operands: &Operands) -> ControlSignals {
    use Opcode::*;

    let writes_rd = !matches!(
        opcode,
        BEQ | BNE
            | BLT
            | BGE
            | BLTU
            | BGEU
            | SB
            | SH
            | SW
            | FENCE
            | FENCE_I
            | ECALL
            | EBREAK
            | MRET
            | EXT
            | EXTX
    );

    ControlSignals {
        update_pc: opcode.is_branch() || matches!(opcode, JAL | JALR | ECALL | EBREAK | MRET),
        update_reg: writes_rd && operands.rd_num != 0,
        update_csr: opcode.is_csr(),
        access_mem: opcode.is_load() || opcode.is_store(),
        opcode: Some(opcode),
    }
}

/// Extracts the operand bundle for a format
fn parse(format: Format, raw_inst: u32) -> Operands {
    match format {
        Format::R => Operands {
            rs1_num: get_rs1(raw_inst),
            rs2_num: get_rs2(raw_inst),
            rd_num: get_rd(raw_inst),
            ..Operands::default()
        },
        Format::I => Operands {
            rs1_num: get_rs1(raw_inst),
            rd_num: get_rd(raw_inst),
            imm: imm_i(raw_inst),
            ..Operands::default()
        },
        Format::IShift => Operands {
            rs1_num: get_rs1(raw_inst),
            rd_num: get_rd(raw_inst),
            // The shift amount happens to sit in the rs2 field
            imm: get_rs2(raw_inst) as i32,
            ..Operands::default()
        },
        Format::S => Operands {
            rs1_num: get_rs1(raw_inst),
            rs2_num: get_rs2(raw_inst),
            imm: imm_s(raw_inst),
            ..Operands::default()
        },
        Format::B => Operands {
            rs1_num: get_rs1(raw_inst),
            rs2_num: get_rs2(raw_inst),
            imm: imm_b(raw_inst),
            ..Operands::default()
        },
        Format::U => Operands {
            rd_num: get_rd(raw_inst),
            imm: imm_u(raw_inst),
            ..Operands::default()
        },
        Format::J => Operands {
            rd_num: get_rd(raw_inst),
            imm: imm_j(raw_inst),
            ..Operands::default()
        },
        Format::Csr => Operands {
            rs1_num: get_rs1(raw_inst),
            rd_num: get_rd(raw_inst),
            csr_num: get_csr(raw_inst),
            ..Operands::default()
        },
        Format::CsrImm => Operands {
            rd_num: get_rd(raw_inst),
            csr_num: get_csr(raw_inst),
            // zimm occupies the rs1 field
            csr_zimm: get_rs1(raw_inst),
            ..Operands::default()
        },
        Format::Bare => Operands::default(),
    }
}

/// Sign-extends the low `bits` bits of `value`
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shamt = 32 - bits;
    ((value << shamt) as i32) >> shamt
}

/// I-type immediate: bits [31:20]
fn imm_i(raw_inst: u32) -> i32 {
    (raw_inst as i32) >> 20
}

/// S-type immediate: bits [31:25] and [11:7]
fn imm_s(raw_inst: u32) -> i32 {
    sign_extend(((raw_inst & 0xfe000000) >> 20) | ((raw_inst & 0xf80) >> 7), 12)
}

/// B-type immediate: bits [31], [7], [30:25], [11:8]
fn imm_b(raw_inst: u32) -> i32 {
    sign_extend(
        ((raw_inst & 0x80000000) >> 19)
            | ((raw_inst & 0x80) << 4)
            | ((raw_inst & 0x7e000000) >> 20)
            | ((raw_inst & 0xf00) >> 7),
        13,
    )
}

/// U-type immediate: bits [31:12] in place
fn imm_u(raw_inst: u32) -> i32 {
    (raw_inst & 0xfffff000) as i32
}

/// J-type immediate: bits [31], [19:12], [20], [30:21]
fn imm_j(raw_inst: u32) -> i32 {
    sign_extend(
        ((raw_inst & 0x80000000) >> 11)
            | (raw_inst & 0xff000)
            | ((raw_inst & 0x100000) >> 9)
            | ((raw_inst & 0x7fe00000) >> 20),
        21,
    )
}

/// Extracts opcode from a raw instruction
fn get_opcode(raw_inst: u32) -> u32 {
    raw_inst & 0x7f
}

/// Extracts funct3 from a raw instruction
fn get_funct3(raw_inst: u32) -> u32 {
    (raw_inst >> 12) & 0x7
}

/// Extracts the rs1 field from a raw instruction
fn get_rs1(raw_inst: u32) -> u8 {
    ((raw_inst >> 15) & 0x1f) as u8
}

/// Extracts the rs2 field from a raw instruction
fn get_rs2(raw_inst: u32) -> u8 {
    ((raw_inst >> 20) & 0x1f) as u8
}

/// Extracts the rd field from a raw instruction
fn get_rd(raw_inst: u32) -> u8 {
    ((raw_inst >> 7) & 0x1f) as u8
}

/// Extracts the funct7 field from a raw instruction
fn get_funct7(raw_inst: u32) -> u32 {
    (raw_inst >> 25) & 0x7f
}

/// Extracts the CSR address from a raw instruction
fn get_csr(raw_inst: u32) -> u16 {
    (raw_inst >> 20) as u16
}
