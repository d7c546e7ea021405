//! Core configuration.
//!
//! Loaded from JSON; every field is optional and falls back to the
//! values in [`defaults`], which match the `rv32ui-p` test environment.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::SimulatorResult;

mod defaults {
    /// Address fetched after reset
    pub const RESET_PC: u32 = 0x0000_0000;

    /// Self-check mailbox for images that carry no symbol table
    pub const TOHOST_ADDR: u32 = 0x0000_1000;

    /// Cycles before a run is declared a timeout
    pub const CYCLE_BUDGET: u64 = 100_000;

    /// Extra cycles per data access in MEM
    pub const MEM_LATENCY: u32 = 1;

    /// Extra cycles for DIV/DIVU/REM/REMU in EX
    pub const DIV_LATENCY: u32 = 3;

    /// Byte address of word 0 of a hex image
    pub const LOAD_BASE: u32 = 0x0000_0000;

    pub fn reset_pc() -> u32 {
        RESET_PC
    }
    pub fn tohost_addr() -> u32 {
        TOHOST_ADDR
    }
    pub fn cycle_budget() -> u64 {
        CYCLE_BUDGET
    }
    pub fn mem_latency() -> u32 {
        MEM_LATENCY
    }
    pub fn div_latency() -> u32 {
        DIV_LATENCY
    }
    pub fn load_base() -> u32 {
        LOAD_BASE
    }
}

/// Parameters of one core instance and its harness
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    #[serde(default = "defaults::reset_pc")]
    pub reset_pc: u32,
    #[serde(default = "defaults::tohost_addr")]
    pub tohost_addr: u32,
    #[serde(default = "defaults::cycle_budget")]
    pub cycle_budget: u64,
    #[serde(default = "defaults::mem_latency")]
    pub mem_latency: u32,
    #[serde(default = "defaults::div_latency")]
    pub div_latency: u32,
    #[serde(default = "defaults::load_base")]
    pub load_base: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            reset_pc: defaults::RESET_PC,
            tohost_addr: defaults::TOHOST_ADDR,
            cycle_budget: defaults::CYCLE_BUDGET,
            mem_latency: defaults::MEM_LATENCY,
            div_latency: defaults::DIV_LATENCY,
            load_base: defaults::LOAD_BASE,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON configuration
    pub fn from_json(text: &str) -> SimulatorResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON configuration file
    pub fn from_json_file(path: &Path) -> SimulatorResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// A configuration with no extra latencies
    pub fn zero_latency() -> Self {
        Self { mem_latency: 0, div_latency: 0, ..Self::default() }
    }
}
