//! A simulator wrapper

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::control::CoreControl;
use crate::cpu::{CPUHistory, CPUPolicy, CPUState, Implementation};
use crate::error::SimulatorResult;
use crate::memory::htif::ExitStatus;
use crate::pipelined::Core;
use crate::single_cycle::SingleCycleCore;

/// Outcome of one self-checking run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// Halted without a pass; carries the `tohost` value if one was written
    Failed(Option<u32>),
    /// Still busy when the cycle budget ran out
    Timeout,
    /// The image could not be loaded, so nothing ran
    LoadFailed,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        *self == Verdict::Passed
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASS"),
            Verdict::Failed(Some(tohost)) => match ExitStatus::from_tohost(*tohost) {
                Some(ExitStatus::Fail(n)) => write!(f, "FAIL (test {n})"),
                _ => write!(f, "FAIL (tohost {tohost:#x})"),
            },
            Verdict::Failed(None) => write!(f, "FAIL (halted)"),
            Verdict::Timeout => write!(f, "TIMEOUT"),
            Verdict::LoadFailed => write!(f, "FAIL (load error)"),
        }
    }
}

/// Summary of a run
#[derive(Clone, Debug)]
pub struct RunReport {
    pub name: String,
    pub verdict: Verdict,
    /// Clock edges spent running
    pub cycles: u64,
    pub history: CPUHistory,
    pub registers: Vec<(&'static str, u32)>,
}

/// Pulses reset and run, then clocks the core while it is busy.
/// Returns the verdict and the number of running cycles.
pub fn drive(core: &mut impl CoreControl, budget: u64) -> (Verdict, u64) {
    core.start();

    let mut cycles = 0;
    while core.busy() {
        if cycles >= budget {
            warn!("Cycle budget of {budget} exhausted at pc {:#010x}", core.pc());
            return (Verdict::Timeout, cycles);
        }
        core.step();
        cycles += 1;
    }

    let verdict = match core.exit_status() {
        Some(ExitStatus::Pass) => Verdict::Passed,
        status => Verdict::Failed(status.map(|s| s.raw())),
    };
    (verdict, cycles)
}

fn report(name: String, cpu: &CPUState, verdict: Verdict, cycles: u64) -> RunReport {
    RunReport { name, verdict, cycles, history: cpu.history, registers: cpu.dump_registers() }
}

fn image_name(image: &Path) -> String {
    image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| image.display().to_string())
}

/// Run simulation on the given image
pub fn run(image: &Path, config: CoreConfig, policy: CPUPolicy) -> SimulatorResult<RunReport> {
    let name = image_name(image);

    let run_report = match policy.implementation {
        Implementation::Pipelined => {
            let mut core = Core::new(config);
            core.load_image(image)?;
            let (verdict, cycles) = drive(&mut core, config.cycle_budget);
            report(name, core.cpu(), verdict, cycles)
        }
        Implementation::SingleCycle => {
            let mut core = SingleCycleCore::new(config);
            core.load_image(image)?;
            let (verdict, cycles) = drive(&mut core, config.cycle_budget);
            report(name, core.cpu(), verdict, cycles)
        }
    };

    info!("{}: {} in {} cycles", run_report.name, run_report.verdict, run_report.cycles);
    if policy.history {
        eprintln!("[HISTORY] {}", run_report.name);
        for line in run_report.history.to_string().lines() {
            eprintln!("[HISTORY] {line}");
        }
    }

    Ok(run_report)
}

/// Images in `dir` whose file name starts with one of `prefixes`, sorted.
/// Disassembly listings (`.dump`) are skipped.
pub fn find_tests(dir: &Path, prefixes: &[String]) -> SimulatorResult<Vec<PathBuf>> {
    let mut tests = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_some_and(|ext| ext == "dump") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
            tests.push(path);
        }
    }
    tests.sort();
    Ok(tests)
}

/// Runs every matching image. An image that fails to load still gets a
/// report, with a `LoadFailed` verdict and an empty history.
pub fn run_suite(
    dir: &Path,
    prefixes: &[String],
    config: CoreConfig,
    policy: CPUPolicy,
) -> SimulatorResult<Vec<RunReport>> {
    let mut reports = Vec::new();
    for test in find_tests(dir, prefixes)? {
        match run(&test, config, policy) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!("{}: {e}", test.display());
                reports.push(RunReport {
                    name: image_name(&test),
                    verdict: Verdict::LoadFailed,
                    cycles: 0,
                    history: CPUHistory::default(),
                    registers: Vec::new(),
                });
            }
        }
    }
    Ok(reports)
}

/// Writes one CSV row per report
pub fn write_csv<W: io::Write>(reports: &[RunReport], writer: W) -> SimulatorResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["Program", "Verdict", "Cycles", "Instructions", "CPI", "Stalls", "Squashed"])?;
    for r in reports {
        writer.write_record([
            r.name.clone(),
            r.verdict.to_string(),
            r.cycles.to_string(),
            r.history.inst_count.to_string(),
            format!("{:.3}", r.history.cpi()),
            r.history.stall_count.to_string(),
            r.history.squash_count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Register file in the Verilator dump layout: rows of four
/// `xN (abi):= XXXXXXXX, ` entries, each 22 columns wide, then a blank line
pub fn format_register_dump(registers: &[(&'static str, u32)]) -> String {
    let mut dump = String::new();
    for (row, chunk) in registers.chunks(4).enumerate() {
        for (col, (name, value)) in chunk.iter().enumerate() {
            let abi = match name.len() {
                4 => name.to_string(),
                _ => format!(" {name:<3}"),
            };
            dump.push_str(&format!("x{:<2}({abi}):= {value:08x}, ", row * 4 + col));
        }
        dump.push('\n');
    }
    dump.push('\n');
    dump
}
