//! Instruction representation

use std::fmt;

pub mod decode_helper;

pub use decode_helper::decode;

/// Canonical NOP: ADDI x0, x0, 0
pub const NOP: u32 = 0x13;

/// Opcode identity flag.
/// At most one is active per decoded word, so it lives in an `Option`
/// on [`ControlSignals`]; `None` is the NOP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    // RV32I
    LUI,
    AUIPC,
    JAL,
    JALR,
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
    LB,
    LH,
    LW,
    LBU,
    LHU,
    SB,
    SH,
    SW,
    ADDI,
    SLTI,
    SLTIU,
    XORI,
    ORI,
    ANDI,
    SLLI,
    SRLI,
    SRAI,
    ADD,
    SUB,
    SLL,
    SLT,
    SLTU,
    XOR,
    SRL,
    SRA,
    OR,
    AND,
    FENCE,
    FENCE_I,
    ECALL,
    EBREAK,
    MRET,
    CSRRW,
    CSRRS,
    CSRRC,
    CSRRWI,
    CSRRSI,
    CSRRCI,
    // RV32M
    MUL,
    MULH,
    MULHSU,
    MULHU,
    DIV,
    DIVU,
    REM,
    REMU,
    // Custom extension slot
    EXT,
    EXTX,
}

impl Opcode {
    /// Every opcode flag, in decode-table order
    pub const ALL: [Opcode; 58] = {
        use Opcode::*;
        [
            LUI, AUIPC, JAL, JALR, BEQ, BNE, BLT, BGE, BLTU, BGEU, LB, LH, LW,
            LBU, LHU, SB, SH, SW, ADDI, SLTI, SLTIU, XORI, ORI, ANDI, SLLI,
            SRLI, SRAI, ADD, SUB, SLL, SLT, SLTU, XOR, SRL, SRA, OR, AND,
            FENCE, FENCE_I, ECALL, EBREAK, MRET, CSRRW, CSRRS, CSRRC, CSRRWI,
            CSRRSI, CSRRCI, MUL, MULH, MULHSU, MULHU, DIV, DIVU, REM, REMU,
            EXT, EXTX,
        ]
    };

    pub fn is_branch(self) -> bool {
        use Opcode::*;
        matches!(self, BEQ | BNE | BLT | BGE | BLTU | BGEU)
    }

    pub fn is_load(self) -> bool {
        use Opcode::*;
        matches!(self, LB | LH | LW | LBU | LHU)
    }

    pub fn is_store(self) -> bool {
        use Opcode::*;
        matches!(self, SB | SH | SW)
    }

    pub fn is_csr(self) -> bool {
        use Opcode::*;
        matches!(self, CSRRW | CSRRS | CSRRC | CSRRWI | CSRRSI | CSRRCI)
    }

    pub fn is_divide(self) -> bool {
        use Opcode::*;
        matches!(self, DIV | DIVU | REM | REMU)
    }

    /// Access width in bytes for loads and stores
    pub fn mem_step(self) -> u32 {
        use Opcode::*;
        match self {
            LB | LBU | SB => 1,
            LH | LHU | SH => 2,
            LW | SW => 4,
            _ => 0,
        }
    }

    /// Mnemonic as the decode table names it
    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            LUI => "LUI",
            AUIPC => "AUIPC",
            JAL => "JAL",
            JALR => "JALR",
            BEQ => "BEQ",
            BNE => "BNE",
            BLT => "BLT",
            BGE => "BGE",
            BLTU => "BLTU",
            BGEU => "BGEU",
            LB => "LB",
            LH => "LH",
            LW => "LW",
            LBU => "LBU",
            LHU => "LHU",
            SB => "SB",
            SH => "SH",
            SW => "SW",
            ADDI => "ADDI",
            SLTI => "SLTI",
            SLTIU => "SLTIU",
            XORI => "XORI",
            ORI => "ORI",
            ANDI => "ANDI",
            SLLI => "SLLI",
            SRLI => "SRLI",
            SRAI => "SRAI",
            ADD => "ADD",
            SUB => "SUB",
            SLL => "SLL",
            SLT => "SLT",
            SLTU => "SLTU",
            XOR => "XOR",
            SRL => "SRL",
            SRA => "SRA",
            OR => "OR",
            AND => "AND",
            FENCE => "FENCE",
            FENCE_I => "FENCE_I",
            ECALL => "ECALL",
            EBREAK => "EBREAK",
            MRET => "MRET",
            CSRRW => "CSRRW",
            CSRRS => "CSRRS",
            CSRRC => "CSRRC",
            CSRRWI => "CSRRWI",
            CSRRSI => "CSRRSI",
            CSRRCI => "CSRRCI",
            MUL => "MUL",
            MULH => "MULH",
            MULHSU => "MULHSU",
            MULHU => "MULHU",
            DIV => "DIV",
            DIVU => "DIVU",
            REM => "REM",
            REMU => "REMU",
            EXT => "EXT",
            EXTX => "EXTX",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Control signals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlSignals {
    pub update_pc: bool,
    pub update_reg: bool,
    pub update_csr: bool,
    pub access_mem: bool,
    pub opcode: Option<Opcode>,
}

impl ControlSignals {
    /// Signal vector with only the given opcode flag set
    pub fn only(opcode: Opcode) -> Self {
        Self { opcode: Some(opcode), ..Self::default() }
    }

    pub fn is(&self, opcode: Opcode) -> bool {
        self.opcode == Some(opcode)
    }

    pub fn is_nop(&self) -> bool {
        self.opcode.is_none()
    }

    /// "NOP" or the mnemonic of the active flag
    pub fn name(&self) -> &'static str {
        self.opcode.map_or("NOP", Opcode::name)
    }
}

/// Operand bundle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Operands {
    pub rs1_num: u8,
    pub rs2_num: u8,
    pub rd_num: u8,
    pub imm: i32,
    pub csr_num: u16,
    pub csr_zimm: u8,
}

/// Decoded instruction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Instruction {
    /// Raw representation
    pub raw_inst: u32,
    /// Control signals
    pub signals: ControlSignals,
    /// Register indices and immediates
    pub operands: Operands,
}

impl Instruction {
    pub fn new(raw_inst: u32) -> Self {
        let (signals, operands) = decode(raw_inst);
        Self { raw_inst, signals, operands }
    }

    /// The all-false result presented while the decoder is not ready
    pub fn nop() -> Self {
        Self::default()
    }

    pub fn opcode(&self) -> Option<Opcode> {
        self.signals.opcode
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops = &self.operands;
        write!(
            f,
            "{:#010x} {} rd=x{} rs1=x{} rs2=x{} imm={}",
            self.raw_inst,
            self.signals.name(),
            ops.rd_num,
            ops.rs1_num,
            ops.rs2_num,
            ops.imm
        )?;
        if self.signals.update_csr {
            write!(f, " csr={:#05x} zimm={}", ops.csr_num, ops.csr_zimm)?;
        }
        Ok(())
    }
}

/// Clocked decoder with the ready handshake.
///
/// On each edge the latch captures `decode(word)` when `ready` is high and
/// the NOP result otherwise, so a stalled stage cannot trigger register or
/// CSR writes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Decoder {
    latched: Instruction,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rising edge
    pub fn clock(&mut self, raw_inst: u32, ready: bool) -> Instruction {
        self.latched = if ready { Instruction::new(raw_inst) } else { Instruction::nop() };
        self.latched
    }

    /// Output of the last edge
    pub fn output(&self) -> &Instruction {
        &self.latched
    }

    pub fn reset(&mut self) {
        self.latched = Instruction::nop();
    }
}
