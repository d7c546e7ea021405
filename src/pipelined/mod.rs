//! Pipelined implementation.
//!
//! Five stages with one latch between each pair. Every edge computes the
//! next latch contents from the current ones, so a value produced by a
//! stage is visible to the next stage one cycle later.

use std::path::Path;

use tracing::{debug, info, trace};

use crate::config::CoreConfig;
use crate::control::{CoreControl, CoreState, Handshake};
use crate::cpu::{CPUHistory, CPUState};
use crate::error::LoadError;
use crate::instruction::{Decoder, Instruction};
use crate::loader::{self, LoadedImage};
use crate::memory::htif::{ExitStatus, HostInterface};
use crate::memory::{Memory, StorageInterface};
use crate::pipelined::pipeline::PipelineState;
use crate::pipelined::stages::FetchState;
use crate::stages_simple::ControlFlow;

pub mod pipeline;
pub mod stages;

/// Pipelined core: controller, register file, CSRs and memory
#[derive(Debug)]
pub struct Core<M: StorageInterface = Memory> {
    cpu: CPUState,
    mem: M,
    host: HostInterface,
    config: CoreConfig,
    reset_pc: u32,

    handshake: Handshake,
    decoder: Decoder,
    current_state: PipelineState,
    fetch: FetchState,
    ret_head: u64,
    ex_stall: bool,
    de_ready: bool,
}

impl Core<Memory> {
    pub fn new(config: CoreConfig) -> Self {
        Self::with_memory(config, Memory::new())
    }
}

impl<M: StorageInterface> Core<M> {
    pub fn with_memory(config: CoreConfig, mem: M) -> Self {
        let mut core = Self {
            cpu: CPUState::new(),
            mem,
            host: HostInterface::new(config.tohost_addr),
            config,
            reset_pc: config.reset_pc,
            handshake: Handshake::default(),
            decoder: Decoder::new(),
            current_state: PipelineState::default(),
            fetch: FetchState::default(),
            ret_head: 0,
            ex_stall: false,
            de_ready: false,
        };
        core.clear_controller();
        core
    }

    /// Loads a hex or ELF image; an ELF entry point becomes the reset PC
    /// and its `tohost` symbol the self-check address
    pub fn load_image(&mut self, path: &Path) -> Result<LoadedImage, LoadError> {
        let image = loader::load_image(&mut self.mem, path, self.config.load_base)?;
        if let Some(entry) = image.entry {
            self.set_reset_pc(entry);
        }
        if let Some(tohost) = image.tohost {
            self.host.set_tohost_addr(tohost);
        }
        Ok(image)
    }

    /// Takes effect at the next reset; also moves an idle PC
    pub fn set_reset_pc(&mut self, pc: u32) {
        self.reset_pc = pc;
        if self.handshake.state() != CoreState::Running {
            self.cpu.pc.write(pc);
        }
    }

    pub fn set_tohost_addr(&mut self, addr: u32) {
        self.host.set_tohost_addr(addr);
    }

    pub fn tohost_addr(&self) -> u32 {
        self.host.tohost_addr()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn mem(&self) -> &M {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn reg(&self, index: u8) -> u32 {
        self.cpu.read_reg(index)
    }

    pub fn csr(&self, addr: u16) -> u32 {
        self.cpu.csrs.read(addr)
    }

    pub fn history(&self) -> &CPUHistory {
        &self.cpu.history
    }

    /// Slots fetched since reset
    pub fn mem_head(&self) -> u64 {
        self.fetch.mem_head
    }

    /// Slots that have left WB since reset, squashed ones included
    pub fn ret_head(&self) -> u64 {
        self.ret_head
    }

    /// EX could not accept a new instruction on the last edge
    pub fn ex_stall(&self) -> bool {
        self.ex_stall
    }

    /// The decoder accepted its input on the last edge
    pub fn de_ready(&self) -> bool {
        self.de_ready
    }

    /// The decoder output latched on the last edge
    pub fn decoder(&self) -> &Instruction {
        self.decoder.output()
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.current_state
    }

    fn clear_controller(&mut self) {
        self.decoder.reset();
        self.current_state = PipelineState::default();
        self.fetch = FetchState::default();
        self.ret_head = 0;
        self.ex_stall = false;
        self.de_ready = false;
        self.host.reset();
        self.cpu.history = CPUHistory::default();
        self.cpu.pc.write(self.reset_pc);
    }

    /// One cycle of the running pipeline
    fn cycle(&mut self) {
        let mut current_state = self.current_state;
        let mut next_state = PipelineState::default();

        self.cpu.update_cycle_count(1);

        self.ex_stall = current_state.ex_stall();
        let decoded = Instruction::new(current_state.if_id.raw_inst);
        let load_use = current_state.load_hazard(&decoded);
        self.de_ready = !self.ex_stall && !load_use;

        trace!(
            "Cycle {}: pc {:#010x}, ex_stall {}, de_ready {}",
            self.cpu.history.cycle_count,
            self.cpu.pc.read(),
            self.ex_stall,
            self.de_ready
        );

        if self.de_ready {
            stages::instruction_fetch(&mut self.cpu, &self.mem, &mut self.fetch, &mut next_state);
        } else {
            // Hold the IF/ID slot and the PC
            next_state.if_id = current_state.if_id;
            self.cpu.history.stall_count += 1;
            if load_use {
                debug!("Load-use hazard at {:#010x}", current_state.if_id.pc);
            }
        }

        stages::instruction_decode(
            &self.cpu,
            &mut self.decoder,
            self.de_ready,
            self.config.div_latency,
            &current_state,
            &mut next_state,
        );

        // MEM resolves before EX so that a halting store squashes the
        // instruction behind it before that instruction has any effect
        let halted_by_store =
            stages::memory_access(&mut self.mem, &mut self.host, &current_state, &mut next_state);
        if halted_by_store {
            if !current_state.id_ex.killed && current_state.id_ex.seq.is_some() {
                self.cpu.history.squash_count += 1;
            }
            current_state.id_ex.kill();
        }

        let flow = stages::execute(&mut self.cpu, self.config.mem_latency, &current_state, &mut next_state);

        match flow {
            ControlFlow::Sequential => {}
            ControlFlow::Redirect(target) => {
                self.squash_younger(&mut next_state);
                self.cpu.pc.write(target);
                self.fetch.exhausted = false;
            }
            ControlFlow::Halt => {
                self.squash_younger(&mut next_state);
                self.request_halt("ebreak");
            }
        }
        if halted_by_store {
            self.squash_younger(&mut next_state);
            self.request_halt("tohost");
        }

        if let Some(killed) = stages::write_back(&mut self.cpu, &current_state) {
            self.ret_head += 1;
            if !killed {
                self.cpu.update_inst_count(1);
            }
        }

        self.current_state = next_state;

        if self.current_state.is_empty() && (self.fetch.exhausted || self.fetch.halt_requested) {
            info!(
                "Pipeline drained after {} cycles, {} retired",
                self.cpu.history.cycle_count, self.cpu.history.inst_count
            );
            self.handshake.halt();
        }
    }

    /// Kills the slots behind the one leaving EX
    fn squash_younger(&mut self, next_state: &mut PipelineState) {
        if next_state.if_id.seq.is_some() && !next_state.if_id.killed {
            next_state.if_id.kill();
            self.cpu.history.squash_count += 1;
        }
        if next_state.id_ex.seq.is_some() && !next_state.id_ex.killed {
            next_state.id_ex.kill();
            self.cpu.history.squash_count += 1;
        }
    }

    fn request_halt(&mut self, reason: &str) {
        if !self.fetch.halt_requested {
            debug!("Halt requested by {reason}");
        }
        self.fetch.halt_requested = true;
    }
}

impl<M: StorageInterface> CoreControl for Core<M> {
    fn set_reset(&mut self, reset: bool) {
        if self.handshake.set_reset(reset) {
            self.clear_controller();
        }
    }

    fn set_run(&mut self, run: bool) {
        self.handshake.set_run(run);
    }

    fn step(&mut self) {
        if self.handshake.edge() {
            self.cycle();
        }
    }

    fn state(&self) -> CoreState {
        self.handshake.state()
    }

    fn pc(&self) -> u32 {
        self.cpu.pc.read()
    }

    fn cpu(&self) -> &CPUState {
        &self.cpu
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        self.host.status()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Places words at address 0 and brings the core to Running
    fn core_with(words: &[u32], config: CoreConfig) -> Core {
        let mut core = Core::new(config);
        for (i, word) in words.iter().enumerate() {
            core.mem_mut().set32(i as u32 * 4, *word);
        }
        core.start();
        assert!(core.busy());
        core
    }

    fn run(core: &mut Core, budget: u64) -> u64 {
        let mut cycles = 0;
        while core.busy() && cycles < budget {
            core.step();
            cycles += 1;
        }
        cycles
    }

    #[test]
    fn reset_clears_controller_only() {
        // addi x1, x0, 5 ; ebreak
        let mut core = core_with(&[0x00500093, 0x00100073], CoreConfig::zero_latency());
        run(&mut core, 50);
        assert_eq!(core.state(), CoreState::Halted);
        assert_eq!(core.reg(1), 5);
        assert!(core.mem_head() > 0);

        core.set_reset(true);
        assert_eq!(core.state(), CoreState::Reset);
        assert_eq!(core.mem_head(), 0);
        assert_eq!(core.ret_head(), 0);
        assert_eq!(core.pc(), 0);
        assert!(!core.busy());
        // Architectural state is not rolled back
        assert_eq!(core.reg(1), 5);
    }

    #[test]
    fn ebreak_halts_without_passing() {
        let mut core = core_with(&[0x00100073, 0x00500093], CoreConfig::zero_latency());
        run(&mut core, 50);
        assert!(!core.busy());
        assert!(!core.riscv_tests_passed());
        assert_eq!(core.exit_status(), None);
        // The addi behind ebreak was squashed
        assert_eq!(core.reg(1), 0);
        assert_eq!(core.ret_head(), core.mem_head());
    }

    #[test]
    fn running_off_mapped_memory_halts() {
        // addi x1, x0, 1 then unmapped memory from 0x1000 on
        let mut core = Core::new(CoreConfig::zero_latency());
        core.mem_mut().set32(0xffc, 0x00100093);
        core.set_reset_pc(0xffc);
        core.start();
        run(&mut core, 50);
        assert_eq!(core.state(), CoreState::Halted);
        assert_eq!(core.reg(1), 1);
        assert_eq!(core.mem_head(), 1);
        assert_eq!(core.ret_head(), 1);
    }

    #[test]
    fn heads_are_monotone_and_ordered() {
        // addi x1, x1, 1 ; jal x0, -4
        let mut core = core_with(&[0x00108093, 0xFFDFF06F], CoreConfig::default());
        let (mut mem_head, mut ret_head) = (0, 0);
        for _ in 0..200 {
            core.step();
            assert!(core.mem_head() >= mem_head);
            assert!(core.ret_head() >= ret_head);
            assert!(core.ret_head() <= core.mem_head());
            mem_head = core.mem_head();
            ret_head = core.ret_head();
        }
        assert!(core.busy());
        assert!(core.history().squash_count > 0);
    }

    #[test]
    fn load_use_stalls_decoder_for_one_cycle() {
        let words = [
            0x00002083, // lw x1, 0(x0)
            0x00108133, // add x2, x1, x1
            0x00100073, // ebreak
        ];
        let mut core = core_with(&words, CoreConfig::zero_latency());
        // IF lw, IF add / ID lw
        core.step();
        core.step();
        assert!(core.de_ready());
        // lw in EX, add in ID
        core.step();
        assert!(!core.de_ready());
        assert!(!core.ex_stall());
        assert!(core.decoder().signals.is_nop());
        core.step();
        assert!(core.de_ready());
        assert_eq!(core.decoder().signals.name(), "ADD");

        run(&mut core, 50);
        assert_eq!(core.reg(2), 0x00002083 * 2);
    }

    #[test]
    fn divide_latency_raises_ex_stall() {
        let words = [
            0x00700093, // addi x1, x0, 7
            0x00200113, // addi x2, x0, 2
            0x0220C1B3, // div x3, x1, x2
            0x00318233, // add x4, x3, x3
            0x00100073, // ebreak
        ];
        let config = CoreConfig { div_latency: 3, ..CoreConfig::zero_latency() };
        let mut core = core_with(&words, config);
        let mut stalled = 0;
        while core.busy() {
            core.step();
            if core.ex_stall() {
                stalled += 1;
            }
        }
        assert_eq!(stalled, 3);
        assert_eq!(core.reg(3), 3);
        assert_eq!(core.reg(4), 6);
    }

    #[test]
    fn store_to_tohost_passes() {
        let words = [
            0x00100093, // addi x1, x0, 1
            0x00102023, // sw x1, 0(x0) -> tohost at 0
            0x00500113, // addi x2, x0, 5
        ];
        let config = CoreConfig { tohost_addr: 0, ..CoreConfig::default() };
        let mut core = core_with(&words, config);
        run(&mut core, 100);
        assert!(!core.busy());
        assert!(core.riscv_tests_passed());
        // The instruction behind the store never took effect
        assert_eq!(core.reg(2), 0);
    }
}
