//! Reset/run handshake shared by the core models

use std::fmt;

use tracing::{debug, info};

use crate::cpu::CPUState;
use crate::memory::htif::ExitStatus;

/// Controller state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoreState {
    #[default]
    Reset,
    Idle,
    Running,
    Halted,
}

impl CoreState {
    pub fn name(self) -> &'static str {
        match self {
            CoreState::Reset => "reset",
            CoreState::Idle => "idle",
            CoreState::Running => "running",
            CoreState::Halted => "halted",
        }
    }
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input latches and state of the handshake.
///
/// `Reset -> Idle` on the first edge with reset released,
/// `Idle -> Running` on an edge with run asserted,
/// `Running -> Halted` once the model reports completion.
/// Run is only sampled in `Idle`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Handshake {
    state: CoreState,
    reset: bool,
    run: bool,
}

impl Handshake {
    pub fn state(&self) -> CoreState {
        self.state
    }

    /// Returns true when the caller must clear its state now
    pub fn set_reset(&mut self, reset: bool) -> bool {
        self.reset = reset;
        if reset {
            self.state = CoreState::Reset;
        }
        reset
    }

    pub fn set_run(&mut self, run: bool) {
        self.run = run;
    }

    /// Clock edge. Returns true when the model executes a cycle on this edge.
    pub fn edge(&mut self) -> bool {
        if self.reset {
            self.state = CoreState::Reset;
            return false;
        }
        match self.state {
            CoreState::Reset => {
                self.state = CoreState::Idle;
                false
            }
            CoreState::Idle => {
                if self.run {
                    debug!("run asserted");
                    self.state = CoreState::Running;
                }
                false
            }
            CoreState::Running => true,
            CoreState::Halted => false,
        }
    }

    pub fn halt(&mut self) {
        if self.state == CoreState::Running {
            self.state = CoreState::Halted;
            info!("core halted");
        }
    }
}

/// The control surface of a core model
pub trait CoreControl {
    /// Asserting reset clears controller state immediately
    fn set_reset(&mut self, reset: bool);
    fn set_run(&mut self, run: bool);
    /// Advances one clock cycle
    fn step(&mut self);

    fn state(&self) -> CoreState;
    fn pc(&self) -> u32;
    fn cpu(&self) -> &CPUState;
    fn exit_status(&self) -> Option<ExitStatus>;

    /// A run is in progress
    fn busy(&self) -> bool {
        self.state() == CoreState::Running
    }

    /// The program stored 1 to `tohost`
    fn riscv_tests_passed(&self) -> bool {
        self.exit_status() == Some(ExitStatus::Pass)
    }

    /// Reset pulse followed by a run pulse; the core is busy afterwards
    fn start(&mut self) {
        self.set_reset(true);
        self.step();
        self.set_reset(false);
        self.step();
        self.set_run(true);
        self.step();
        self.set_run(false);
    }
}
