//! Single cycle implementation

use std::path::Path;

use tracing::{debug, info};

use crate::config::CoreConfig;
use crate::control::{CoreControl, CoreState, Handshake};
use crate::cpu::CPUState;
use crate::error::LoadError;
use crate::loader::{self, LoadedImage};
use crate::memory::htif::{ExitStatus, HostInterface};
use crate::memory::{Memory, StorageInterface};
use crate::stages_simple::*;

/// One instruction per cycle, every stage in one go
#[derive(Debug)]
pub struct SingleCycleCore<M: StorageInterface = Memory> {
    cpu: CPUState,
    mem: M,
    host: HostInterface,
    config: CoreConfig,
    reset_pc: u32,
    handshake: Handshake,
}

impl SingleCycleCore<Memory> {
    pub fn new(config: CoreConfig) -> Self {
        Self::with_memory(config, Memory::new())
    }
}

impl<M: StorageInterface> SingleCycleCore<M> {
    pub fn with_memory(config: CoreConfig, mem: M) -> Self {
        let mut cpu = CPUState::new();
        cpu.pc.write(config.reset_pc);
        Self {
            cpu,
            mem,
            host: HostInterface::new(config.tohost_addr),
            config,
            reset_pc: config.reset_pc,
            handshake: Handshake::default(),
        }
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

    pub fn set_reset_pc(&mut self, pc: u32) {
        self.reset_pc = pc;
        if self.handshake.state() != CoreState::Running {
            self.cpu.pc.write(pc);
        }
    }

    pub fn set_tohost_addr(&mut self, addr: u32) {
        self.host.set_tohost_addr(addr);
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

    /// Executes one instruction.
    /// Returns false when the run is over.
    fn cycle(&mut self) -> bool {
        // Increment CPU cycle count
        self.cpu.update_cycle_count(1);

        // Read and increment PC
        let pc = self.cpu.pc.read();

        // IF
        let raw_inst = match instruction_fetch(pc, &self.mem) {
            Ok(raw_inst) => raw_inst,
            Err(e) => {
                debug!("Fetch stopped at {pc:#010x}: {e}");
                return false;
            }
        };
        self.cpu.pc.write(pc.wrapping_add(4));

        // ID
        let inst = instruction_decode(raw_inst);
        let (rs1, rs2) = register_read(&inst, &self.cpu);
        // EX
        let outcome = execute(&mut self.cpu, pc, &inst, rs1, rs2);
        // MEM
        let (wb_result, halt) = memory_access(
            &inst,
            &mut self.mem,
            &mut self.host,
            outcome.exec_result,
            rs2,
            outcome.wb_result,
        );
        // WB
        write_back(&inst, &mut self.cpu, wb_result);
        self.cpu.update_inst_count(1);

        match outcome.flow {
            ControlFlow::Sequential => !halt,
            ControlFlow::Redirect(target) => {
                self.cpu.pc.write(target);
                !halt
            }
            ControlFlow::Halt => false,
        }
    }
}

impl<M: StorageInterface> CoreControl for SingleCycleCore<M> {
    fn set_reset(&mut self, reset: bool) {
        if self.handshake.set_reset(reset) {
            self.host.reset();
            self.cpu.history = Default::default();
            self.cpu.pc.write(self.reset_pc);
        }
    }

    fn set_run(&mut self, run: bool) {
        self.handshake.set_run(run);
    }

    fn step(&mut self) {
        if self.handshake.edge() && !self.cycle() {
            info!("Halted after {} instructions", self.cpu.history.inst_count);
            self.handshake.halt();
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
    use super::*;

    #[test]
    fn runs_one_instruction_per_step() {
        let mut core = SingleCycleCore::new(CoreConfig::default());
        // addi x1, x0, 5 ; addi x1, x1, 1 ; ebreak
        for (i, word) in [0x00500093u32, 0x00108093, 0x00100073].iter().enumerate() {
            core.mem_mut().set32(i as u32 * 4, *word);
        }
        core.start();

        core.step();
        assert_eq!(core.reg(1), 5);
        assert_eq!(core.pc(), 4);
        core.step();
        assert_eq!(core.reg(1), 6);
        core.step();
        assert_eq!(core.state(), CoreState::Halted);
        assert_eq!(core.cpu().history.inst_count, 3);
    }
}
