//! Simulation builder.
//!
//! [`Simulation`] assembles one complete system: a pipeline (branch predictor,
//! fetch, decode, issue, ALU, LSU, commit, register file and an optional
//! watchdog) per core, plus the shared L2, main memory and statistics collector.
//! [`Simulation::run`] starts every component on its own thread and hands them to
//! the [`Coordinator`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use serde_json::Value;
use tracing::info;

use crate::common::{ConfigError, CoreId, ProtocolError, RegName, SimError};
use crate::config::Config;
use crate::core::pipeline::{
    AluStage, BranchPredictorStage, CommitStage, DecodeStage, FetchStage, IssueStage, LoadStoreUnit, Watchdog,
};
use crate::isa::syscall::{LinuxSyscalls, SyscallProxy};
use crate::soc::{L2Cache, MainMemory, RegisterFile};
use crate::stats::StatsCollector;

use super::component::Component;
use super::coordinator::Coordinator;
pub use super::coordinator::{RunReport, StopReason};
use super::loader::{Program, load_elf};
use super::service;
use super::snapshot::Snapshot;

/// Builds the syscall proxy serving one core.
pub type ProxyFactory = Box<dyn FnMut(CoreId) -> Box<dyn SyscallProxy>>;

/// A configured, not yet started simulation.
///
/// # Examples
///
/// ```no_run
/// use nebula_core::config::Config;
/// use nebula_core::sim::loader::Program;
/// use nebula_core::Simulation;
///
/// // addi x1, x0, 5
/// let program = Program::from_bytes(0x1000, 0x0050_0093u32.to_le_bytes().to_vec());
/// let mut config = Config::default();
/// config.simulation.max_cycles = Some(100);
/// let report = Simulation::new(config, program).run().unwrap();
/// assert_eq!(report.register(0, nebula_core::common::RegName::X(1)), Some(5));
/// ```
pub struct Simulation {
    config: Config,
    program: Option<Program>,
    restore: Option<PathBuf>,
    final_snapshot: Option<PathBuf>,
    components: Vec<Box<dyn Component>>,
    proxy: Option<ProxyFactory>,
    patches: Vec<(String, String, Value)>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("program", &self.program.as_ref().map(|p| p.entry))
            .field("restore", &self.restore)
            .field("final_snapshot", &self.final_snapshot)
            .field("components", &self.components.len())
            .field("patches", &self.patches)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// A simulation of `program` on every core.
    pub fn new(config: Config, program: Program) -> Self {
        Self {
            config,
            program: Some(program),
            restore: None,
            final_snapshot: None,
            components: Vec::new(),
            proxy: None,
            patches: Vec::new(),
        }
    }

    /// Loads `path` as the program, with `argv` on the initial stack.
    ///
    /// # Errors
    ///
    /// [`SimError::Load`] if the ELF cannot be loaded.
    pub fn from_elf(config: Config, path: &Path, argv: &[String]) -> Result<Self, SimError> {
        let program = load_elf(path, &config.loader, argv)?;
        info!(
            path = %path.display(),
            entry = format_args!("{:#x}", program.entry),
            segments = program.segments.len(),
            "loaded ELF"
        );
        Ok(Self::new(config, program))
    }

    /// A simulation that resumes from a snapshot instead of booting a program.
    pub fn restore(config: Config, path: &Path) -> Self {
        Self {
            config,
            program: None,
            restore: Some(path.to_path_buf()),
            final_snapshot: None,
            components: Vec::new(),
            proxy: None,
            patches: Vec::new(),
        }
    }

    /// Resumes from `path` instead of starting at the program entry.
    #[must_use]
    pub fn restore_from(mut self, path: &Path) -> Self {
        self.restore = Some(path.to_path_buf());
        self
    }

    /// Writes a snapshot to `path` once the run stops.
    #[must_use]
    pub fn final_snapshot(mut self, path: &Path) -> Self {
        self.final_snapshot = Some(path.to_path_buf());
        self
    }

    /// Adds a user component alongside the built-in ones.
    #[must_use]
    pub fn with_component(mut self, component: Box<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Replaces the default Linux syscall proxy.
    #[must_use]
    pub fn with_syscall_proxy(mut self, factory: ProxyFactory) -> Self {
        self.proxy = Some(factory);
        self
    }

    /// Queues a `config` message sent to `service` before the run starts.
    #[must_use]
    pub fn configure(mut self, service: &str, field: &str, val: Value) -> Self {
        self.patches.push((service.to_string(), field.to_string(), val));
        self
    }

    fn pipeline(&self, coreid: CoreId, start_pc: u64, proxy: Box<dyn SyscallProxy>) -> Vec<Box<dyn Component>> {
        let c = &self.config;
        let mut stages: Vec<Box<dyn Component>> = vec![
            Box::new(BranchPredictorStage::new(coreid, &c.brpred, start_pc)),
            Box::new(FetchStage::new(coreid, &c.l1ic, &c.mmu, c.decode.buffer_capacity)),
            Box::new(DecodeStage::new(coreid, &c.decode)),
            Box::new(IssueStage::new(coreid, &c.pipeline)),
            Box::new(AluStage::new(coreid, &c.pipeline, proxy)),
            Box::new(LoadStoreUnit::new(coreid, &c.l1dc, &c.mmu)),
            Box::new(CommitStage::new(coreid, &c.pipeline)),
            Box::new(RegisterFile::new(coreid)),
        ];
        if c.watchdog.event_name.is_some() || c.watchdog.result_name.is_some() {
            stages.push(Box::new(Watchdog::new(coreid, &c.watchdog)));
        }
        stages
    }

    /// Runs to completion.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] for an invalid configuration or a missing program,
    /// [`SimError::Protocol`] if a component violates the protocol, and
    /// [`SimError::Io`] if a thread cannot be spawned.
    pub fn run(mut self) -> Result<RunReport, SimError> {
        self.config.validate()?;
        let cores = self.config.simulation.cores;

        let (cycle, start_pcs) = match &self.restore {
            Some(path) => {
                let snapshot = Snapshot::load(path)?;
                let pcs = (0..cores).map(|c| snapshot.register(c, RegName::Pc)).collect();
                (snapshot.cycle(), pcs)
            }
            None => {
                let program = self
                    .program
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("no program to run".into()))?;
                (0, vec![program.entry; cores])
            }
        };
        let brk = self.program.as_ref().map_or(0, |p| p.brk);
        let mut factory = self
            .proxy
            .take()
            .unwrap_or_else(|| Box::new(move |_| Box::new(LinuxSyscalls::new(brk))));

        let mut components = Vec::new();
        for (coreid, &pc) in start_pcs.iter().enumerate() {
            components.extend(self.pipeline(coreid, pc, factory(coreid)));
        }
        let image = if self.restore.is_some() { None } else { self.program.clone() };
        components.push(Box::new(L2Cache::new(&self.config.l2)));
        components.push(Box::new(MainMemory::new(&self.config.mainmem, &self.config.mmu, cores, image)));
        components.push(Box::new(StatsCollector::new(self.config.stats.output_filename.clone())));
        components.append(&mut self.components);

        let strict = self.config.simulation.strict_frames;
        let (up, inbound) = mpsc::channel();
        let links = components
            .into_iter()
            .enumerate()
            .map(|(index, component)| service::spawn(index, component, up.clone(), strict))
            .collect::<std::io::Result<Vec<_>>>()?;
        drop(up);
        info!(cores, components = links.len(), cycle, "simulation starting");

        let registers: Vec<_> = self
            .program
            .iter()
            .flat_map(|p| p.registers.iter())
            .flat_map(|&(name, value)| (0..cores).map(move |c| (c, name, value)))
            .collect();

        let mut coordinator = Coordinator::new(links, inbound, &self.config.simulation, cycle);
        let outcome = self.drive(&mut coordinator, cores, &registers);
        let report = coordinator.finish();
        outcome?;
        report
    }

    fn drive(
        &self,
        coordinator: &mut Coordinator,
        cores: usize,
        registers: &[(CoreId, RegName, u64)],
    ) -> Result<(), ProtocolError> {
        coordinator.start(&self.patches, registers, self.restore.as_deref())?;
        let _ = coordinator.run(cores)?;
        if let Some(path) = &self.final_snapshot {
            coordinator.snapshot(path)?;
        }
        coordinator.drain()
    }
}
