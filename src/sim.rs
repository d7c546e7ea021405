//! Runs one program image on the core and reports the self-check verdict

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use core_lib::config::CoreConfig;
use core_lib::cpu::{CPUPolicy, Implementation};
use core_lib::error::{ExecutionError, SimulatorError, SimulatorResult};
use core_lib::run_wrapper::{self, Verdict};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    /// Five-stage pipeline
    P,
    /// Single cycle reference
    S,
}

#[derive(Parser, Debug)]
#[command(name = "core-sim", version, about = "Cycle-stepped RV32IM core")]
struct Cli {
    /// Hex word stream or ELF32 executable
    image: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Core model
    #[arg(short = 'i', long = "impl", value_enum, ignore_case = true, default_value = "p")]
    model: Model,

    /// Print cycle and CPI statistics
    #[arg(long)]
    history: bool,

    /// Trace every cycle
    #[arg(short, long)]
    verbose: bool,

    /// Cycle budget before the run counts as a timeout
    #[arg(long)]
    budget: Option<u64>,

    /// Self-check address, hex or decimal
    #[arg(long, value_parser = parse_u32)]
    tohost: Option<u32>,

    /// Print the final register file
    #[arg(long)]
    dump_regs: bool,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> SimulatorResult<()> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::from_json_file(path)?,
        None => CoreConfig::default(),
    };
    if let Some(budget) = cli.budget {
        config.cycle_budget = budget;
    }
    if let Some(tohost) = cli.tohost {
        config.tohost_addr = tohost;
    }

    let policy = CPUPolicy {
        implementation: match cli.model {
            Model::P => Implementation::Pipelined,
            Model::S => Implementation::SingleCycle,
        },
        history: cli.history,
    };

    let report = run_wrapper::run(&cli.image, config, policy)?;

    if cli.dump_regs {
        print!("{}", run_wrapper::format_register_dump(&report.registers));
    }
    println!("{}: {}", report.name, report.verdict);

    match report.verdict {
        Verdict::Passed => Ok(()),
        Verdict::Timeout => Err(ExecutionError::CycleBudgetExceeded(report.cycles).into()),
        Verdict::Failed(_) | Verdict::LoadFailed => Err(SimulatorError::from(ExecutionError::SelfCheckFailed(
            report.verdict.to_string(),
        ))),
    }
}
