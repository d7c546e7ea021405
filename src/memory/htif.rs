//! Host-target interface.
//!
//! Self-checking test binaries report their verdict by storing to the
//! `tohost` word:
//!
//! * `1`: passed.
//! * odd and not 1: failed, the failing test number is `value >> 1`.
//! * `0`: ignored.
//!
//! Any non-zero value ends the run.

use std::fmt;

use tracing::{info, warn};

/// Decoded `tohost` value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Pass,
    /// Failing test case number
    Fail(u32),
    /// Non-zero value outside the pass/fail convention
    Unknown(u32),
}

impl ExitStatus {
    pub fn from_tohost(value: u32) -> Option<Self> {
        match value {
            0 => None,
            1 => Some(Self::Pass),
            v if v & 1 == 1 => Some(Self::Fail(v >> 1)),
            v => Some(Self::Unknown(v)),
        }
    }

    /// The raw value that produced this status
    pub fn raw(&self) -> u32 {
        match *self {
            Self::Pass => 1,
            Self::Fail(n) => (n << 1) | 1,
            Self::Unknown(v) => v,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail(n) => write!(f, "fail (test {n})"),
            Self::Unknown(v) => write!(f, "unknown tohost value {v:#x}"),
        }
    }
}

/// Watches data stores for writes to `tohost`
#[derive(Clone, Copy, Debug)]
pub struct HostInterface {
    tohost_addr: u32,
    status: Option<ExitStatus>,
}

impl HostInterface {
    pub fn new(tohost_addr: u32) -> Self {
        Self { tohost_addr, status: None }
    }

    pub fn tohost_addr(&self) -> u32 {
        self.tohost_addr
    }

    pub fn set_tohost_addr(&mut self, tohost_addr: u32) {
        self.tohost_addr = tohost_addr;
    }

    /// Inspects a committed store.
    /// Returns true when it ends the run.
    pub fn observe_store(&mut self, address: u32, value: u32) -> bool {
        if address != self.tohost_addr || self.status.is_some() {
            return false;
        }
        let Some(status) = ExitStatus::from_tohost(value) else {
            return false;
        };
        match status {
            ExitStatus::Pass => info!("tohost: pass"),
            _ => warn!("tohost: {status} ({value:#x})"),
        }
        self.status = Some(status);
        true
    }

    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    pub fn passed(&self) -> bool {
        self.status == Some(ExitStatus::Pass)
    }

    pub fn reset(&mut self) {
        self.status = None;
    }
}
