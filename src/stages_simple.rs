//! Primitive implementation of 5 stages.
//! Shared by the single cycle and the pipelined models.

use tracing::{debug, trace, warn};

use crate::alu::{self, AluInput};
use crate::cpu::CPUState;
use crate::csr;
use crate::error::MemoryError;
use crate::instruction::{Instruction, Opcode};
use crate::memory::htif::HostInterface;
use crate::memory::StorageInterface;

/// Where fetch continues after an instruction leaves EX
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlFlow {
    Sequential,
    /// Younger instructions are discarded and fetch restarts at the target
    Redirect(u32),
    /// Younger instructions are discarded and fetch stops
    Halt,
}

/// IF: Fetch the instruction from memory
pub fn instruction_fetch(pc: u32, mem: &impl StorageInterface) -> Result<u32, MemoryError> {
    let raw_inst = mem.fetch(pc)?;
    trace!("fetch {pc:#010x}: {raw_inst:#010x}");
    Ok(raw_inst)
}

/// ID: Instruction decode
pub fn instruction_decode(raw_inst: u32) -> Instruction {
    Instruction::new(raw_inst)
}

/// ID: Register read
pub fn register_read(inst: &Instruction, cpu: &CPUState) -> (i32, i32) {
    let rs1 = cpu.read_reg(inst.operands.rs1_num) as i32;
    let rs2 = cpu.read_reg(inst.operands.rs2_num) as i32;
    (rs1, rs2)
}

/// Result of the EX stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecOutcome {
    /// ALU output: the memory address for loads and stores
    pub exec_result: i32,
    /// Value destined for rd
    pub wb_result: u32,
    pub flow: ControlFlow,
}

/// EX: Compute stuff, including the CSR read-modify-write and trap entry
pub fn execute(cpu: &mut CPUState, pc: u32, inst: &Instruction, op1: i32, op2: i32) -> ExecOutcome {
    let signals = &inst.signals;
    let operands = &inst.operands;

    let csr_value = match signals.update_csr {
        true => cpu.csrs.read(operands.csr_num),
        false => 0,
    };
    let input = AluInput {
        rs1: op1,
        rs2: op2,
        pc: pc as i32,
        csr: csr_value as i32,
        imm: operands.imm,
        zimm: operands.csr_zimm as i32,
    };
    let exec_result = alu::execute(signals, &input);

    let wb_result = if signals.update_csr {
        cpu.csrs.write(operands.csr_num, exec_result as u32);
        trace!("csr {:#05x}: {csr_value:#010x} -> {exec_result:#010x}", operands.csr_num);
        csr_value
    } else {
        exec_result as u32
    };

    let flow = resolve_control_flow(cpu, pc, inst, op1, exec_result);
    trace!("execute {pc:#010x} {inst}; op1: {op1:#010x}; op2: {op2:#010x}; result: {exec_result:#010x}");

    ExecOutcome { exec_result, wb_result, flow }
}

/// EX: Decides whether the PC leaves the sequential path
pub fn resolve_control_flow(
    cpu: &mut CPUState,
    pc: u32,
    inst: &Instruction,
    op1: i32,
    exec_result: i32,
) -> ControlFlow {
    use ControlFlow::*;
    use Opcode::*;

    let signals = &inst.signals;
    let imm = inst.operands.imm;
    let Some(opcode) = signals.opcode else {
        return Sequential;
    };

    let flow = match opcode {
        // Instruction memory may have changed under the younger fetches
        FENCE_I => Redirect(pc.wrapping_add(4)),
        _ if !signals.update_pc => Sequential,
        ECALL => {
            cpu.csrs.write(csr::MEPC, pc);
            cpu.csrs.write(csr::MCAUSE, csr::CAUSE_ECALL_M);
            Redirect(cpu.csrs.read(csr::MTVEC) & !3)
        }
        EBREAK => Halt,
        MRET => Redirect(cpu.csrs.read(csr::MEPC)),
        JALR => Redirect((op1.wrapping_add(imm) as u32) & !1),
        _ if alu::branch_taken(signals, exec_result) => Redirect(pc.wrapping_add(imm as u32)),
        _ => Sequential,
    };

    if flow != Sequential {
        debug!("{opcode} at {pc:#010x}: {flow:?}");
    }
    flow
}

/// MEM: Access memory.
/// Returns the value destined for rd and whether the access ended the run.
pub fn memory_access(
    inst: &Instruction,
    mem: &mut impl StorageInterface,
    host: &mut HostInterface,
    exec_result: i32,
    store_value: i32,
    wb_result: u32,
) -> (u32, bool) {
    let Some(opcode) = inst.opcode() else {
        return (wb_result, false);
    };
    if !inst.signals.access_mem {
        return (wb_result, false);
    }

    let address = exec_result as u32;
    let mem_step = opcode.mem_step();

    if opcode.is_load() {
        let raw = match mem.get(address, mem_step) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{e}; load reads as zero");
                0
            }
        };
        let value = match opcode {
            Opcode::LB => raw as u8 as i8 as i32 as u32,
            Opcode::LH => raw as u16 as i16 as i32 as u32,
            _ => raw,
        };
        trace!("load {address:#010x}: {value:#010x}");
        (value, false)
    } else {
        let value = match mem_step {
            1 => store_value as u32 & 0xff,
            2 => store_value as u32 & 0xffff,
            _ => store_value as u32,
        };
        if let Err(e) = mem.set(address, mem_step, value) {
            warn!("{e}; store dropped");
        }
        trace!("store {address:#010x}: {value:#010x}");
        (wb_result, host.observe_store(address, value))
    }
}

/// WB: Write stuff back to the selected register
pub fn write_back(inst: &Instruction, cpu: &mut CPUState, wb_result: u32) {
    if inst.signals.update_reg {
        cpu.write_reg(inst.operands.rd_num, wb_result);
    }
}
