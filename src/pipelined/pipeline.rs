//! Pipeline state

use crate::instruction::{Instruction, NOP};

/// Pipeline state = 4 pipeline registers
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineState {
    pub if_id: IFIDRegister,
    pub id_ex: IDEXRegister,
    pub ex_mem: EXMEMRegister,
    pub mem_wb: MEMWBRegister,
}

impl PipelineState {
    /// No fetched slot is in flight
    pub fn is_empty(&self) -> bool {
        self.if_id.seq.is_none()
            && self.id_ex.seq.is_none()
            && self.ex_mem.seq.is_none()
            && self.mem_wb.seq.is_none()
    }

    /// Load-use hazard: the load in EX produces its value only after MEM,
    /// so an immediate consumer must wait one cycle in ID
    pub fn load_hazard(&self, decoded: &Instruction) -> bool {
        let producer = &self.id_ex.inst;
        if !(producer.opcode().is_some_and(|op| op.is_load()) && producer.signals.update_reg) {
            return false;
        }
        let rd = producer.operands.rd_num;
        decoded.operands.rs1_num == rd || decoded.operands.rs2_num == rd
    }

    /// Operand 1 can be forwarded from previous execution result.
    /// A load in EX/MEM has no value yet.
    /// See P&H p. 300
    pub fn ex_hazard_op1(&self) -> bool {
        let rs1 = self.id_ex.inst.operands.rs1_num;
        rs1 != 0 && self.ex_mem.forwards_to(rs1)
    }

    /// Operand 2 can be forwarded from previous execution result
    /// See P&H p. 300
    pub fn ex_hazard_op2(&self) -> bool {
        let rs2 = self.id_ex.inst.operands.rs2_num;
        rs2 != 0 && self.ex_mem.forwards_to(rs2)
    }

    /// Operand 1 can be forwarded from previous memory access result
    /// Precondition: ex_hazard_op1 is false
    /// See P&H p. 301
    pub fn mem_hazard_op1(&self) -> bool {
        let rs1 = self.id_ex.inst.operands.rs1_num;
        rs1 != 0 && self.mem_wb.writes(rs1)
    }

    /// Operand 2 can be forwarded from previous memory access result
    /// Precondition: ex_hazard_op2 is false
    /// See P&H p. 301
    pub fn mem_hazard_op2(&self) -> bool {
        let rs2 = self.id_ex.inst.operands.rs2_num;
        rs2 != 0 && self.mem_wb.writes(rs2)
    }

    /// Operand 1 is being written back this cycle
    /// See P&H p. 301
    pub fn wb_hazard_op1(&self, inst: &Instruction) -> bool {
        let rs1 = inst.operands.rs1_num;
        rs1 != 0 && self.mem_wb.writes(rs1)
    }

    /// Operand 2 is being written back this cycle
    /// See P&H p. 301
    pub fn wb_hazard_op2(&self, inst: &Instruction) -> bool {
        let rs2 = inst.operands.rs2_num;
        rs2 != 0 && self.mem_wb.writes(rs2)
    }

    /// EX is occupied by a multi-cycle operation or MEM waits on a data access
    pub fn ex_stall(&self) -> bool {
        self.id_ex.cycles_left > 0 || self.mem_busy()
    }

    /// MEM holds its access for another cycle
    pub fn mem_busy(&self) -> bool {
        self.ex_mem.cycles_left > 0
    }
}

/// IF/ID register
#[derive(Clone, Copy, Debug)]
pub struct IFIDRegister {
    /// Fetch sequence number; `None` is a bubble
    pub seq: Option<u64>,
    /// Squashed by a redirect
    pub killed: bool,

    /// Program counter
    pub pc: u32,

    /// Raw instruction
    pub raw_inst: u32,
}

impl Default for IFIDRegister {
    fn default() -> Self {
        Self { seq: None, killed: false, pc: 0, raw_inst: NOP }
    }
}

impl IFIDRegister {
    pub fn kill(&mut self) {
        self.killed = true;
        self.raw_inst = NOP;
    }
}

/// ID/EX register
#[derive(Clone, Copy, Debug, Default)]
pub struct IDEXRegister {
    pub seq: Option<u64>,
    pub killed: bool,

    /// Program counter
    pub pc: u32,

    /// Wrapped instruction
    pub inst: Instruction,

    /// Operand 1
    pub op1: i32,
    /// Operand 2
    pub op2: i32,

    /// Extra cycles before EX completes
    pub cycles_left: u32,
}

impl IDEXRegister {
    pub fn kill(&mut self) {
        self.killed = true;
        self.inst = Instruction::nop();
        self.cycles_left = 0;
    }
}

/// EX/MEM register
#[derive(Clone, Copy, Debug, Default)]
pub struct EXMEMRegister {
    pub seq: Option<u64>,
    pub killed: bool,

    /// Program counter
    pub pc: u32,

    /// Wrapped instruction
    pub inst: Instruction,

    /// Execution result, the address for memory operations
    pub exec_result: i32,

    /// Value for rd unless MEM replaces it
    pub wb_result: u32,

    /// Operand 2, the store data
    pub op2: i32,

    /// Extra cycles before MEM completes
    pub cycles_left: u32,
}

impl EXMEMRegister {
    pub fn kill(&mut self) {
        self.killed = true;
        self.inst = Instruction::nop();
        self.cycles_left = 0;
    }

    fn forwards_to(&self, reg: u8) -> bool {
        let is_load = self.inst.opcode().is_some_and(|op| op.is_load());
        self.inst.signals.update_reg && !is_load && self.inst.operands.rd_num == reg
    }
}

/// MEM/WB register
#[derive(Clone, Copy, Debug, Default)]
pub struct MEMWBRegister {
    pub seq: Option<u64>,
    pub killed: bool,

    /// Program counter
    pub pc: u32,

    /// Wrapped instruction
    pub inst: Instruction,

    /// Actual write back result,
    /// which is computed during the MEM stage
    pub wb_result: u32,
}

impl MEMWBRegister {
    fn writes(&self, reg: u8) -> bool {
        self.inst.signals.update_reg && self.inst.operands.rd_num == reg
    }
}
