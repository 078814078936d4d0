//! Tunable thresholds for admission, diffing, scheduling and orchestration
//!
//! Every limit the comparison pipeline enforces lives here so deployments can
//! tune them without code changes. All sections deserialize with per-field
//! defaults, so a TOML file only needs the values it overrides:
//!
//! ```toml
//! [guard]
//! max_combined_length = 2000000
//!
//! [orchestrator]
//! debounce_ms = 300
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ExError, ExErrorKind, Result};

const MIB: u64 = 1024 * 1024;

/// Complete comparison configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparisonConfig {
    pub guard: GuardLimits,
    pub diff: DiffLimits,
    pub scheduler: SchedulerConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Resource guard thresholds (all lengths in characters)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardLimits {
    /// Hard ceiling on `len(original) + len(revised)`
    pub max_combined_length: usize,
    /// Combined length above which a pair may be "too complex"
    pub complex_combined_threshold: usize,
    /// Shorter-side length above which a pair over the complex threshold is rejected
    pub complex_min_side: usize,
    /// Minimum available memory when telemetry knows it
    pub min_available_memory_bytes: u64,
    /// Combined length that makes a run a "large operation"
    pub large_operation_threshold: usize,
    /// Quiet period required between two large operations
    pub large_operation_cooldown_ms: u64,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            max_combined_length: 10_000_000,
            complex_combined_threshold: 4_000_000,
            complex_min_side: 1_500_000,
            min_available_memory_bytes: 256 * MIB,
            large_operation_threshold: 1_000_000,
            large_operation_cooldown_ms: 3_000,
        }
    }
}

impl GuardLimits {
    pub fn large_operation_cooldown(&self) -> Duration {
        Duration::from_millis(self.large_operation_cooldown_ms)
    }
}

/// Bytes per trace cell; positions are stored as `u32`
pub const TRACE_CELL_BYTES: usize = std::mem::size_of::<u32>();

/// Diff engine limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffLimits {
    /// Inputs up to this combined length are tokenized by word, larger ones by line
    pub word_granularity_max_chars: usize,
    /// Trace cells allowed per input token before the search gives up
    pub trace_cells_per_token: usize,
    /// Lower bound on the trace ceiling, so tiny inputs are never starved
    pub min_trace_cells: usize,
    /// Upper bound on the trace ceiling regardless of input size
    ///
    /// Each cell is [`TRACE_CELL_BYTES`] bytes. Keep
    /// `max_trace_cells * TRACE_CELL_BYTES` at or below
    /// `guard.min_available_memory_bytes`, otherwise the guard can admit a
    /// run whose trace outgrows the memory it checked for.
    pub max_trace_cells: usize,
    /// Work units between cancellation checks when diffing without chunking
    pub direct_step_budget: usize,
}

impl Default for DiffLimits {
    fn default() -> Self {
        Self {
            word_granularity_max_chars: 200_000,
            trace_cells_per_token: 256,
            min_trace_cells: 1 << 20,
            max_trace_cells: 1 << 25,
            direct_step_budget: 1 << 20,
        }
    }
}

impl DiffLimits {
    /// Largest trace the engine will hold, in bytes
    pub fn max_trace_bytes(&self) -> u64 {
        let cells = self.max_trace_cells.max(self.min_trace_cells) as u64;
        cells.saturating_mul(TRACE_CELL_BYTES as u64)
    }

    /// Trace-cell ceiling for a search over `token_count` tokens
    pub fn trace_ceiling(&self, token_count: usize) -> usize {
        token_count
            .saturating_mul(self.trace_cells_per_token)
            .clamp(self.min_trace_cells, self.max_trace_cells.max(self.min_trace_cells))
    }
}

/// Chunk scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Pairs with a combined length above this run in chunked mode
    pub chunk_threshold_chars: usize,
    /// Search work units per chunk
    pub unit_budget: usize,
    /// Fail the run if available memory drops below this between units
    pub critical_memory_floor_bytes: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_chars: 50_000,
            unit_budget: 250_000,
            critical_memory_floor_bytes: Some(64 * MIB),
        }
    }
}

/// Orchestrator timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Quiet window that coalesces auto-triggered requests
    pub debounce_ms: u64,
    /// Pause before CPU-bound work so a processing indicator can render
    pub processing_indicator_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            processing_indicator_delay_ms: 50,
        }
    }
}

impl OrchestratorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn processing_indicator_delay(&self) -> Duration {
        Duration::from_millis(self.processing_indicator_delay_ms)
    }
}

impl ComparisonConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// - `Serialization`: the text is not valid TOML or has unknown keys
    /// - `InvalidConfig`: a value fails validation
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ComparisonConfig = toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::Serialization)
                .with_op("load_config")
                .with_message(format!("invalid configuration TOML: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// - `Io`: the file cannot be read
    /// - anything [`ComparisonConfig::from_toml_str`] returns
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, why: &str| {
            Err(ExError::new(ExErrorKind::InvalidConfig)
                .with_op("validate_config")
                .with_message(format!("{}: {}", field, why)))
        };

        if self.guard.max_combined_length == 0 {
            return invalid("guard.max_combined_length", "must be greater than zero");
        }
        if self.guard.complex_min_side > self.guard.complex_combined_threshold {
            return invalid(
                "guard.complex_min_side",
                "must not exceed guard.complex_combined_threshold",
            );
        }
        if self.diff.trace_cells_per_token == 0 {
            return invalid("diff.trace_cells_per_token", "must be greater than zero");
        }
        if self.diff.min_trace_cells > self.diff.max_trace_cells {
            return invalid("diff.min_trace_cells", "must not exceed diff.max_trace_cells");
        }
        if self.diff.direct_step_budget == 0 {
            return invalid("diff.direct_step_budget", "must be greater than zero");
        }
        if self.scheduler.unit_budget == 0 {
            return invalid("scheduler.unit_budget", "must be greater than zero");
        }
        Ok(())
    }
}
