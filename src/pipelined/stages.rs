//! 5 stages adapted for pipelined execution

use tracing::debug;

use super::pipeline::{EXMEMRegister, IDEXRegister, IFIDRegister, MEMWBRegister, PipelineState};
use crate::cpu::CPUState;
use crate::instruction::Decoder;
use crate::memory::htif::HostInterface;
use crate::memory::StorageInterface;
use crate::stages_simple::{self, ControlFlow};

/// Fetch-side bookkeeping
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchState {
    /// Slots fetched so far
    pub mem_head: u64,
    /// The PC left mapped memory; cleared by the next redirect
    pub exhausted: bool,
    /// EBREAK or a tohost store asked the core to stop
    pub halt_requested: bool,
}

/// IF stage
pub fn instruction_fetch(
    cpu: &mut CPUState,
    mem: &impl StorageInterface,
    fetch: &mut FetchState,
    next_state: &mut PipelineState,
) {
    next_state.if_id = IFIDRegister::default();
    if fetch.exhausted || fetch.halt_requested {
        return;
    }

    let pc = cpu.pc.read();
    match stages_simple::instruction_fetch(pc, mem) {
        Ok(raw_inst) => {
            next_state.if_id = IFIDRegister {
                seq: Some(fetch.mem_head),
                killed: false,
                pc,
                raw_inst,
            };
            fetch.mem_head += 1;
            cpu.pc.write(pc.wrapping_add(4));
        }
        Err(e) => {
            debug!("Fetch stopped at {pc:#010x}: {e}");
            fetch.exhausted = true;
        }
    }
}

/// ID stage. The decoder sees `de_ready`; when it is low the ID/EX
/// register receives a bubble and the IF/ID slot stays where it is.
pub fn instruction_decode(
    cpu: &CPUState,
    decoder: &mut Decoder,
    de_ready: bool,
    div_latency: u32,
    current_state: &PipelineState,
    next_state: &mut PipelineState,
) {
    let slot = current_state.if_id;
    let inst = decoder.clock(slot.raw_inst, de_ready);

    if !de_ready || slot.seq.is_none() {
        next_state.id_ex = IDEXRegister::default();
        return;
    }

    // WB hazard -> Data in the register
    let (rs1, rs2) = stages_simple::register_read(&inst, cpu);
    let op1 = match current_state.wb_hazard_op1(&inst) {
        true => current_state.mem_wb.wb_result as i32,
        false => rs1,
    };
    let op2 = match current_state.wb_hazard_op2(&inst) {
        true => current_state.mem_wb.wb_result as i32,
        false => rs2,
    };

    let is_divide = inst.opcode().is_some_and(|op| op.is_divide());
    next_state.id_ex = IDEXRegister {
        seq: slot.seq,
        killed: slot.killed,
        pc: slot.pc,
        inst,
        op1,
        op2,
        cycles_left: if is_divide && !slot.killed { div_latency } else { 0 },
    };
    if slot.killed {
        next_state.id_ex.kill();
    }
}

/// EX stage.
/// Returns the control flow decided by the instruction leaving EX.
pub fn execute(
    cpu: &mut CPUState,
    mem_latency: u32,
    current_state: &PipelineState,
    next_state: &mut PipelineState,
) -> ControlFlow {
    let slot = current_state.id_ex;
    let inst = slot.inst;

    // EX hazard -> MEM hazard -> Data in the latch
    let op1 = if current_state.ex_hazard_op1() {
        current_state.ex_mem.wb_result as i32
    } else if current_state.mem_hazard_op1() {
        current_state.mem_wb.wb_result as i32
    } else {
        slot.op1
    };
    let op2 = if current_state.ex_hazard_op2() {
        current_state.ex_mem.wb_result as i32
    } else if current_state.mem_hazard_op2() {
        current_state.mem_wb.wb_result as i32
    } else {
        slot.op2
    };

    if slot.cycles_left > 0 || current_state.mem_busy() {
        // Held: the producers may retire before this completes
        next_state.id_ex = IDEXRegister {
            op1,
            op2,
            cycles_left: slot.cycles_left.saturating_sub(1),
            ..slot
        };
        return ControlFlow::Sequential;
    }

    next_state.ex_mem = EXMEMRegister {
        seq: slot.seq,
        killed: slot.killed,
        pc: slot.pc,
        inst,
        op2,
        ..EXMEMRegister::default()
    };
    if slot.seq.is_none() || slot.killed {
        return ControlFlow::Sequential;
    }

    let outcome = stages_simple::execute(cpu, slot.pc, &inst, op1, op2);
    next_state.ex_mem.exec_result = outcome.exec_result;
    next_state.ex_mem.wb_result = outcome.wb_result;
    if inst.signals.access_mem {
        next_state.ex_mem.cycles_left = mem_latency;
    }
    outcome.flow
}

/// MEM stage.
/// Returns true when a store to `tohost` ended the run.
pub fn memory_access(
    mem: &mut impl StorageInterface,
    host: &mut HostInterface,
    current_state: &PipelineState,
    next_state: &mut PipelineState,
) -> bool {
    let slot = current_state.ex_mem;

    if slot.cycles_left > 0 {
        next_state.ex_mem = EXMEMRegister { cycles_left: slot.cycles_left - 1, ..slot };
        next_state.mem_wb = MEMWBRegister::default();
        return false;
    }

    next_state.ex_mem = EXMEMRegister::default();
    let (wb_result, halt) = match slot.seq.is_some() && !slot.killed {
        true => stages_simple::memory_access(
            &slot.inst,
            mem,
            host,
            slot.exec_result,
            slot.op2,
            slot.wb_result,
        ),
        false => (slot.wb_result, false),
    };

    next_state.mem_wb = MEMWBRegister {
        seq: slot.seq,
        killed: slot.killed,
        pc: slot.pc,
        inst: slot.inst,
        wb_result,
    };
    halt
}

/// WB stage.
/// Returns the slot leaving the pipeline, if any, and whether it was squashed.
pub fn write_back(cpu: &mut CPUState, current_state: &PipelineState) -> Option<bool> {
    let slot = current_state.mem_wb;
    slot.seq?;
    if !slot.killed {
        stages_simple::write_back(&slot.inst, cpu, slot.wb_result);
    }
    Some(slot.killed)
}
