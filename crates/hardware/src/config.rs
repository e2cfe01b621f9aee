//! Configuration system for the simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline constants for cache geometry, latencies, predictor sizing and budgets.
//! 2. **Structures:** One section per component family (pipeline, decode, caches, MMU, predictor,
//!    main memory, watchdog, stats) plus run-level simulation settings.
//! 3. **Enums:** Replacement policy and branch predictor types.
//! 4. **Runtime Patching:** `patch` applies a `config{service, field, val}` message to a section.
//!
//! Configuration is supplied as JSON (`Config::from_json`) or use `Config::default()`.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::constants::INITIAL_SP;
use crate::common::{ConfigError, ProtocolError};

/// Default configuration constants for the simulator.
///
/// These values define the baseline model when not explicitly overridden in a
/// JSON configuration file.
mod defaults {
    /// Number of simulated cores.
    pub const CORES: usize = 1;

    /// Settle rounds between holding commit and capturing a snapshot.
    ///
    /// Long enough for a retired store's write-through to reach main memory.
    pub const SNAPSHOT_SETTLE_ROUNDS: u64 = 8;

    /// Rounds run after termination so in-flight writes and stats reports land.
    pub const DRAIN_ROUNDS: u64 = 4;

    /// Maximum instructions Issue hands to the ALU per cycle.
    pub const ISSUE_WIDTH: usize = 8;

    /// Bytes the decode stage may buffer ahead of the decoder.
    pub const DECODE_BUFFER_CAPACITY: usize = 32;

    /// Bytes the decoder looks at per cycle.
    pub const MAX_BYTES_TO_DECODE: usize = 16;

    /// Instructions the decoder produces per cycle.
    pub const MAX_INSTRUCTIONS_TO_DECODE: usize = 8;

    /// L1 sets (16).
    pub const L1_NSETS: usize = 16;

    /// L1 associativity (2-way).
    pub const L1_NWAYS: usize = 2;

    /// L1 block size in bytes.
    pub const L1_BLOCKSIZE: usize = 16;

    /// L1 hit latency in cycles.
    pub const L1_LATENCY: u64 = 1;

    /// L2 sets (64).
    pub const L2_NSETS: usize = 64;

    /// L2 associativity (4-way).
    pub const L2_NWAYS: usize = 4;

    /// L2 block size in bytes.
    pub const L2_BLOCKSIZE: usize = 32;

    /// L2 hit latency in cycles.
    pub const L2_LATENCY: u64 = 4;

    /// Virtual page size used by the MMU (64 KiB).
    pub const PAGESIZE: u64 = 1 << 16;

    /// Entries in each stage-local TLB.
    pub const TLB_ENTRIES: usize = 32;

    /// Main memory read latency in cycles.
    pub const PEEK_LATENCY: u64 = 10;

    /// Branch-target-address cache entries.
    pub const BTAC_ENTRIES: usize = 32;

    /// Saturating-counter table entries.
    pub const PREDICTOR_ENTRIES: usize = 256;

    /// Width of each saturating counter in bits.
    pub const COUNTER_BITS: u32 = 2;

    /// Symbol execution starts at.
    pub const ENTRY_SYMBOL: &str = "_start";
}

/// Cache replacement policy algorithms.
///
/// Specifies the algorithm used to select which cache line to evict
/// when a new line must be installed in a full cache set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicy {
    /// Least Recently Used replacement policy.
    ///
    /// Evicts the cache line that was accessed least recently.
    #[default]
    #[serde(alias = "LRU")]
    Lru,
    /// Random replacement policy.
    ///
    /// Evicts a randomly selected cache line from the set.
    #[serde(alias = "RANDOM")]
    Random,
}

/// Direction predictor paired with the BTAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictorType {
    /// No direction predictor: every BTAC hit is predicted taken.
    None,
    /// Per-branch saturating counters indexed by PC.
    #[default]
    Bimodal,
    /// Counters indexed by PC XOR global history.
    #[serde(alias = "GShare")]
    Gshare,
}

/// Root configuration structure for the simulator.
///
/// # Examples
///
/// ```
/// use nebula_core::config::{Config, PredictorType};
///
/// let json = r#"{
///     "simulation": { "cores": 2, "max_cycles": 10000 },
///     "brpred": { "predictor_type": "gshare" },
///     "l1dc": { "nsets": 32 }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.simulation.cores, 2);
/// assert_eq!(config.brpred.predictor_type, PredictorType::Gshare);
/// assert_eq!(config.l1dc.nsets, 32);
/// assert_eq!(config.l1dc.nways, 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Run-level settings (cores, budgets, snapshots, framing).
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Program loading.
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Pipeline-wide behavior flags.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Decode stage buffering.
    #[serde(default)]
    pub decode: DecodeConfig,
    /// L1 instruction cache.
    #[serde(default)]
    pub l1ic: CacheConfig,
    /// L1 data cache.
    #[serde(default)]
    pub l1dc: CacheConfig,
    /// Shared L2 cache.
    #[serde(default = "CacheConfig::l2")]
    pub l2: CacheConfig,
    /// Address translation.
    #[serde(default)]
    pub mmu: MmuConfig,
    /// Branch predictor.
    #[serde(default)]
    pub brpred: BranchPredictorConfig,
    /// Main memory.
    #[serde(default)]
    pub mainmem: MainMemConfig,
    /// Liveness watchdog.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Statistics collector.
    #[serde(default)]
    pub stats: StatsConfig,
}

impl Config {
    /// Parses a configuration from JSON text and validates it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Checks the invariants the components rely on.
    ///
    /// Cache geometry and predictor tables must be powers of two, and the
    /// decode buffer must be able to hold at least one I-cache delivery.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.cores == 0 {
            return Err(ConfigError::Invalid("at least one core is required".into()));
        }
        for (name, cache) in [("l1ic", &self.l1ic), ("l1dc", &self.l1dc), ("l2", &self.l2)] {
            cache.validate(name)?;
        }
        if self.l2.blocksize < self.l1ic.blocksize || self.l2.blocksize < self.l1dc.blocksize {
            return Err(ConfigError::Invalid(
                "l2.blocksize must be at least the L1 block size".into(),
            ));
        }
        if self.decode.buffer_capacity < self.l1ic.blocksize {
            return Err(ConfigError::Invalid(format!(
                "decode.buffer_capacity ({}) is smaller than l1ic.blocksize ({})",
                self.decode.buffer_capacity, self.l1ic.blocksize
            )));
        }
        if !self.mmu.pagesize.is_power_of_two() || self.mmu.pagesize < self.l2.blocksize as u64 {
            return Err(ConfigError::Invalid(
                "mmu.pagesize must be a power of two no smaller than a cache block".into(),
            ));
        }
        if !self.brpred.btac_entries.is_power_of_two()
            || !self.brpred.predictor_entries.is_power_of_two()
        {
            return Err(ConfigError::Invalid(
                "brpred table sizes must be powers of two".into(),
            ));
        }
        if self.pipeline.issue_width == 0 || self.decode.max_instructions == 0 {
            return Err(ConfigError::Invalid(
                "issue width and decode width must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Run-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of cores, each with its own pipeline and register file.
    #[serde(default = "SimulationConfig::default_cores")]
    pub cores: usize,

    /// Stop after this many cycles.
    #[serde(default)]
    pub max_cycles: Option<u64>,

    /// Stop once this many instructions have retired (all cores).
    #[serde(default)]
    pub max_instructions: Option<u64>,

    /// Halt the run on the first undefined instruction instead of committing it as a no-op.
    #[serde(default)]
    pub break_on_undefined: bool,

    /// Encode every message into a wire frame to enforce the frame size cap.
    #[serde(default = "SimulationConfig::default_strict_frames")]
    pub strict_frames: bool,

    /// Take a snapshot every this many retired instructions.
    #[serde(default)]
    pub snapshot_period: Option<u64>,

    /// Directory periodic snapshots are written to.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,

    /// Rounds to wait between holding commit and capturing state.
    #[serde(default = "SimulationConfig::default_settle_rounds")]
    pub snapshot_settle_rounds: u64,

    /// Rounds run after termination before saying goodbye.
    #[serde(default = "SimulationConfig::default_drain_rounds")]
    pub drain_rounds: u64,
}

impl SimulationConfig {
    fn default_cores() -> usize {
        defaults::CORES
    }

    fn default_strict_frames() -> bool {
        true
    }

    fn default_settle_rounds() -> u64 {
        defaults::SNAPSHOT_SETTLE_ROUNDS
    }

    fn default_drain_rounds() -> u64 {
        defaults::DRAIN_ROUNDS
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cores: defaults::CORES,
            max_cycles: None,
            max_instructions: None,
            break_on_undefined: false,
            strict_frames: true,
            snapshot_period: None,
            snapshot_dir: None,
            snapshot_settle_rounds: defaults::SNAPSHOT_SETTLE_ROUNDS,
            drain_rounds: defaults::DRAIN_ROUNDS,
        }
    }
}

/// Program loading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Symbol whose address becomes the initial `%pc`.
    #[serde(default = "LoaderConfig::default_entry")]
    pub entry: String,

    /// Initial stack pointer; argc/argv are laid out from here.
    #[serde(default = "LoaderConfig::default_stack_pointer")]
    pub stack_pointer: u64,
}

impl LoaderConfig {
    fn default_entry() -> String {
        defaults::ENTRY_SYMBOL.to_string()
    }

    fn default_stack_pointer() -> u64 {
        INITIAL_SP
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            entry: Self::default_entry(),
            stack_pointer: INITIAL_SP,
        }
    }
}

/// Pipeline-wide behavior flags.
///
/// These replace the family of near-identical pipeline variants with one
/// parameterized engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// ALU broadcasts results so Issue can bypass the register file.
    #[serde(default = "PipelineConfig::default_true")]
    pub result_forwarding: bool,

    /// Resolve branches in the ALU (true) or at commit (false).
    #[serde(default = "PipelineConfig::default_true")]
    pub early_branch_resolution: bool,

    /// Maximum instructions issued per cycle.
    #[serde(default = "PipelineConfig::default_issue_width")]
    pub issue_width: usize,
}

impl PipelineConfig {
    fn default_true() -> bool {
        true
    }

    fn default_issue_width() -> usize {
        defaults::ISSUE_WIDTH
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            result_forwarding: true,
            early_branch_resolution: true,
            issue_width: defaults::ISSUE_WIDTH,
        }
    }
}

/// Decode stage buffering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Bytes the decode buffer can hold; Fetch stalls rather than overflow it.
    #[serde(default = "DecodeConfig::default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Bytes offered to the decoder per cycle.
    #[serde(default = "DecodeConfig::default_max_bytes")]
    pub max_bytes_to_decode: usize,

    /// Instructions produced per cycle.
    #[serde(default = "DecodeConfig::default_max_instructions")]
    pub max_instructions: usize,
}

impl DecodeConfig {
    fn default_buffer_capacity() -> usize {
        defaults::DECODE_BUFFER_CAPACITY
    }

    fn default_max_bytes() -> usize {
        defaults::MAX_BYTES_TO_DECODE
    }

    fn default_max_instructions() -> usize {
        defaults::MAX_INSTRUCTIONS_TO_DECODE
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: defaults::DECODE_BUFFER_CAPACITY,
            max_bytes_to_decode: defaults::MAX_BYTES_TO_DECODE,
            max_instructions: defaults::MAX_INSTRUCTIONS_TO_DECODE,
        }
    }
}

/// Geometry and timing of one cache level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of sets (power of two).
    #[serde(default = "CacheConfig::default_nsets")]
    pub nsets: usize,

    /// Associativity (number of ways).
    #[serde(default = "CacheConfig::default_nways")]
    pub nways: usize,

    /// Block size in bytes (power of two).
    #[serde(default = "CacheConfig::default_blocksize")]
    pub blocksize: usize,

    /// Replacement policy.
    #[serde(default)]
    pub policy: ReplacementPolicy,

    /// Cycles from request to response on a hit.
    #[serde(default = "CacheConfig::default_latency")]
    pub latency: u64,
}

impl CacheConfig {
    fn default_nsets() -> usize {
        defaults::L1_NSETS
    }

    fn default_nways() -> usize {
        defaults::L1_NWAYS
    }

    fn default_blocksize() -> usize {
        defaults::L1_BLOCKSIZE
    }

    fn default_latency() -> u64 {
        defaults::L1_LATENCY
    }

    /// Default shared L2 geometry.
    pub fn l2() -> Self {
        Self {
            nsets: defaults::L2_NSETS,
            nways: defaults::L2_NWAYS,
            blocksize: defaults::L2_BLOCKSIZE,
            policy: ReplacementPolicy::Lru,
            latency: defaults::L2_LATENCY,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !self.nsets.is_power_of_two() || !self.blocksize.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "{name}: nsets and blocksize must be powers of two"
            )));
        }
        if self.nways == 0 || self.latency == 0 {
            return Err(ConfigError::Invalid(format!(
                "{name}: nways and latency must be non-zero"
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    /// Creates the default L1 geometry: 16 sets, 2 ways, 16-byte blocks, LRU.
    fn default() -> Self {
        Self {
            nsets: defaults::L1_NSETS,
            nways: defaults::L1_NWAYS,
            blocksize: defaults::L1_BLOCKSIZE,
            policy: ReplacementPolicy::Lru,
            latency: defaults::L1_LATENCY,
        }
    }
}

/// Address translation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmuConfig {
    /// Page size in bytes (power of two).
    #[serde(default = "MmuConfig::default_pagesize")]
    pub pagesize: u64,

    /// Entries in the TLBs of Fetch and the LSU.
    #[serde(default = "MmuConfig::default_tlb_entries")]
    pub tlb_entries: usize,
}

impl MmuConfig {
    fn default_pagesize() -> u64 {
        defaults::PAGESIZE
    }

    fn default_tlb_entries() -> usize {
        defaults::TLB_ENTRIES
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            pagesize: defaults::PAGESIZE,
            tlb_entries: defaults::TLB_ENTRIES,
        }
    }
}

/// Branch predictor sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPredictorConfig {
    /// BTAC capacity (power of two).
    #[serde(default = "BranchPredictorConfig::default_btac_entries")]
    pub btac_entries: usize,

    /// Direction predictor kind.
    #[serde(default)]
    pub predictor_type: PredictorType,

    /// Counter table entries (power of two).
    #[serde(default = "BranchPredictorConfig::default_predictor_entries")]
    pub predictor_entries: usize,

    /// Width of each counter in bits.
    #[serde(default = "BranchPredictorConfig::default_counter_bits")]
    pub counter_bits: u32,
}

impl BranchPredictorConfig {
    fn default_btac_entries() -> usize {
        defaults::BTAC_ENTRIES
    }

    fn default_predictor_entries() -> usize {
        defaults::PREDICTOR_ENTRIES
    }

    fn default_counter_bits() -> u32 {
        defaults::COUNTER_BITS
    }
}

impl Default for BranchPredictorConfig {
    fn default() -> Self {
        Self {
            btac_entries: defaults::BTAC_ENTRIES,
            predictor_type: PredictorType::default(),
            predictor_entries: defaults::PREDICTOR_ENTRIES,
            counter_bits: defaults::COUNTER_BITS,
        }
    }
}

/// Main memory timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainMemConfig {
    /// Cycles from a peek request to its response.
    #[serde(default = "MainMemConfig::default_peek_latency")]
    pub peek_latency: u64,
}

impl MainMemConfig {
    fn default_peek_latency() -> u64 {
        defaults::PEEK_LATENCY
    }
}

impl Default for MainMemConfig {
    fn default() -> Self {
        Self {
            peek_latency: defaults::PEEK_LATENCY,
        }
    }
}

/// Liveness watchdog thresholds. Unset names disable the corresponding check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Event tag that must keep arriving (e.g. `"decode"`).
    #[serde(default)]
    pub event_name: Option<String>,

    /// Maximum cycles between two `event_name` events.
    #[serde(default)]
    pub event_cycles: Option<u64>,

    /// Result tag that must keep arriving (e.g. `"retire"`).
    #[serde(default)]
    pub result_name: Option<String>,

    /// Maximum cycles between two `result_name` results.
    #[serde(default)]
    pub result_cycles: Option<u64>,
}

/// Statistics collector output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Where the JSON report is written; logged when unset.
    #[serde(default)]
    pub output_filename: Option<PathBuf>,
}

/// Applies one `config{service, field, val}` update to a config section.
///
/// `field` may be a dotted path into nested sections (`"l1ic.nsets"`). The field must
/// already exist in the section; unknown names and ill-typed values are protocol
/// violations.
pub fn patch<T>(section: &mut T, service: &str, field: &str, val: &Value) -> Result<(), ProtocolError>
where
    T: Serialize + DeserializeOwned,
{
    let invalid = |reason: String| ProtocolError::InvalidConfigValue {
        service: service.to_string(),
        field: field.to_string(),
        reason,
    };
    let mut tree = serde_json::to_value(&*section).map_err(|e| invalid(e.to_string()))?;
    let mut slot = &mut tree;
    for key in field.split('.') {
        slot = slot
            .get_mut(key)
            .ok_or_else(|| ProtocolError::UnknownConfigField {
                service: service.to_string(),
                field: field.to_string(),
            })?;
    }
    *slot = val.clone();
    *section = serde_json::from_value(tree).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}
