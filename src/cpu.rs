//! rv32im architectural state

use std::fmt;

use crate::csr::CsrFile;

/// ABI register names, x0 to x31
pub const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2",
    "a3", "a4", "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9",
    "s10", "s11", "t3", "t4", "t5", "t6",
];

/// CPU state
#[derive(Clone, Debug)]
pub struct CPUState {
    /// Program counter
    pub pc: Register,
    /// General purpose registers
    pub gpr: [Register; 32],
    /// Control and status registers
    pub csrs: CsrFile,

    /// History of execution
    pub history: CPUHistory,
}

impl Default for CPUState {
    fn default() -> Self {
        Self::new()
    }
}

impl CPUState {
    pub fn new() -> Self {
        Self {
            pc: Register::new(0),
            gpr: [Register::new(0); 32],
            csrs: CsrFile::new(),
            history: CPUHistory::default(),
        }
    }

    /// Reads a general purpose register; x0 is always zero
    pub fn read_reg(&self, index: u8) -> u32 {
        match index {
            0 => 0,
            i => self.gpr[i as usize & 0x1f].read(),
        }
    }

    /// Writes a general purpose register; writes to x0 are dropped
    pub fn write_reg(&mut self, index: u8, value: u32) {
        if index != 0 {
            self.gpr[index as usize & 0x1f].write(value);
        }
    }

    /// Increments history cycle count
    pub fn update_cycle_count(&mut self, value: u64) {
        self.history.cycle_count += value;
    }

    /// Increments history instruction count
    pub fn update_inst_count(&mut self, value: u64) {
        self.history.inst_count += value;
    }

    /// Register file as `(abi name, value)` rows
    pub fn dump_registers(&self) -> Vec<(&'static str, u32)> {
        (0..32u8).map(|i| (ABI_NAMES[i as usize], self.read_reg(i))).collect()
    }
}

/// Register file simulation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Register {
    /// Current data in the register
    data: u32,
}

impl Register {
    pub fn new(data: u32) -> Self {
        Self { data }
    }

    /// Reads the register
    pub fn read(&self) -> u32 {
        self.data
    }

    /// Writes to register
    pub fn write(&mut self, value: u32) {
        self.data = value;
    }
}

/// Implementation enum
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Implementation {
    SingleCycle,
    #[default]
    Pipelined,
}

/// CPU policy
#[derive(Clone, Copy, Debug, Default)]
pub struct CPUPolicy {
    pub implementation: Implementation,
    pub history: bool,
}

/// History module
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CPUHistory {
    pub cycle_count: u64,
    pub inst_count: u64,
    /// Cycles in which decode was held
    pub stall_count: u64,
    /// Fetched slots killed by a redirect
    pub squash_count: u64,
}

impl CPUHistory {
    pub fn cpi(&self) -> f64 {
        match self.inst_count {
            0 => 0.0,
            n => self.cycle_count as f64 / n as f64,
        }
    }
}

impl fmt::Display for CPUHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cycles: {}", self.cycle_count)?;
        writeln!(f, "Instructions: {}", self.inst_count)?;
        writeln!(f, "Stall cycles: {}", self.stall_count)?;
        writeln!(f, "Squashed slots: {}", self.squash_count)?;
        write!(f, "CPI: {:.3}", self.cpi())
    }
}
