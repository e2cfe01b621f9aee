//! Nebula command line.
//!
//! A single entry point for running a program on the simulated system. It performs:
//! 1. **Run:** Load an RV64 ELF, simulate it to completion and report what it printed and how it exited.
//! 2. **Restore:** Resume a run from a snapshot file written by an earlier run.
//! 3. **Config:** Print the default configuration as JSON, ready to be edited and passed back with `--config`.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use nebula_core::Simulation;
use nebula_core::common::SimError;
use nebula_core::config::{self, Config};
use nebula_core::sim::simulator::{RunReport, StopReason};

#[derive(Parser, Debug)]
#[command(
    name = "nebula",
    author,
    version,
    about = "Distributed cycle-accurate RISC-V simulator",
    long_about = "Every pipeline stage, cache and memory unit runs as its own component.\n\nExamples:\n  nebula run hello\n  nebula run --set l1dc.nsets=64 --max-cycles 1000000 qsort -- 1000\n  nebula run --snapshot-period 100000 --snapshot-dir snaps qsort\n  nebula restore snaps/snapshot-000000100000.json\n  nebula config > nebula.json"
)]
struct Cli {
    /// More logging (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an ELF executable.
    Run {
        /// Program to execute.
        program: PathBuf,

        /// Arguments passed to the program (argv[1..]).
        #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Resume a run from a snapshot.
    Restore {
        /// Snapshot file.
        snapshot: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Print the default configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct RunOptions {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override one setting, e.g. `l1ic.nsets=64` or `brpred.predictor_type="Gshare"`.
    #[arg(long = "set", value_name = "SECTION.FIELD=VALUE")]
    set: Vec<String>,

    /// Number of cores, each running its own copy of the program.
    #[arg(long)]
    cores: Option<usize>,

    /// Stop after this many cycles.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Stop after this many retired instructions.
    #[arg(long)]
    max_instructions: Option<u64>,

    /// Stop at the first undefined instruction.
    #[arg(long)]
    break_on_undefined: bool,

    /// Write a snapshot every N retired instructions.
    #[arg(long, value_name = "N")]
    snapshot_period: Option<u64>,

    /// Directory periodic snapshots are written to.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Write a snapshot here when the run stops.
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Print the statistics table after the run.
    #[arg(long)]
    stats: bool,

    /// Print the full run report as JSON instead of the summary.
    #[arg(long)]
    json: bool,
}

impl RunOptions {
    /// Builds the configuration: file, then `--set`, then the dedicated flags.
    fn config(&self) -> Result<Config, SimError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        for assignment in &self.set {
            let (field, val) = parse_assignment(assignment)?;
            config::patch(&mut config, "cli", field, &val)?;
        }
        let sim = &mut config.simulation;
        if let Some(cores) = self.cores {
            sim.cores = cores;
        }
        sim.max_cycles = self.max_cycles.or(sim.max_cycles);
        sim.max_instructions = self.max_instructions.or(sim.max_instructions);
        sim.break_on_undefined |= self.break_on_undefined;
        sim.snapshot_period = self.snapshot_period.or(sim.snapshot_period);
        if self.snapshot_dir.is_some() {
            sim.snapshot_dir.clone_from(&self.snapshot_dir);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Splits `section.field=value`. The value is JSON when it parses as JSON and a
/// bare string otherwise.
fn parse_assignment(text: &str) -> Result<(&str, Value), SimError> {
    let (field, raw) = text.split_once('=').ok_or_else(|| {
        SimError::Config(nebula_core::common::ConfigError::Invalid(format!(
            "expected SECTION.FIELD=VALUE, got `{text}`"
        )))
    })?;
    let val = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((field.trim(), val))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn simulate(simulation: Simulation, options: &RunOptions) -> Result<RunReport, SimError> {
    let simulation = match &options.snapshot {
        Some(path) => simulation.final_snapshot(path),
        None => simulation,
    };
    simulation.run()
}

fn print_report(report: &RunReport, options: &RunOptions) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    if options.json {
        let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
        writeln!(stdout, "{json}")?;
        return Ok(());
    }
    write!(stdout, "{}", report.text(1))?;
    stdout.flush()?;
    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{}", report.text(2))?;
    writeln!(stderr)?;
    writeln!(stderr, "[*] Stopped: {:?}", report.stop)?;
    writeln!(stderr, "    Cycles:       {}", report.cycles)?;
    writeln!(stderr, "    Instructions: {}", report.instructions)?;
    if report.cycles > 0 {
        writeln!(
            stderr,
            "    IPC:          {:.3}",
            report.instructions as f64 / report.cycles as f64
        )?;
    }
    for u in &report.undefined {
        writeln!(stderr, "    Undefined:    core {} pc {:#x} word {:#010x}", u.coreid, u.pc, u.word)?;
    }
    for path in &report.snapshots {
        writeln!(stderr, "    Snapshot:     {}", path.display())?;
    }
    if options.stats {
        write!(stderr, "{}", report.stats.render())?;
    }
    Ok(())
}

/// Process exit status for a finished run.
fn exit_status(report: &RunReport) -> ExitCode {
    match report.stop {
        Some(StopReason::Shutdown) => report
            .exit_code()
            .map_or(ExitCode::SUCCESS, |code| ExitCode::from(code as u8)),
        Some(StopReason::Undefined) => ExitCode::from(3),
        _ => ExitCode::SUCCESS,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (result, options) = match cli.command {
        Commands::Config => {
            return match serde_json::to_string_pretty(&Config::default()) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::from(2)
                }
            };
        }
        Commands::Run { program, args, options } => {
            let mut argv = vec![program.display().to_string()];
            argv.extend(args);
            let result = options
                .config()
                .and_then(|config| Simulation::from_elf(config, &program, &argv))
                .and_then(|simulation| simulate(simulation, &options));
            (result, options)
        }
        Commands::Restore { snapshot, options } => {
            let result = options
                .config()
                .and_then(|config| simulate(Simulation::restore(config, &snapshot), &options));
            (result, options)
        }
    };

    match result {
        Ok(report) => {
            if let Err(e) = print_report(&report, &options) {
                eprintln!("error: {e}");
                return ExitCode::from(2);
            }
            exit_status(&report)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
