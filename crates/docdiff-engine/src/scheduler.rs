//! Incremental execution of the diff engine
//!
//! Small pairs are diffed in one call. Larger pairs advance a resumable
//! [`EditSearch`](docdiff_core::diff::EditSearch) one bounded unit at a time,
//! yielding to the runtime between units so cancellation requests and other
//! tasks get a chance to run. Both paths drive the same search, so the
//! result does not depend on which one was taken.
//!
//! Progress in chunked mode:
//!
//! | Stage | Percent |
//! |---|---|
//! | Tokenizing done | 5 |
//! | Diffing units | 5..=95, from the search's furthest reach |
//! | Finalizing | 95, then 100 once changes are built |

use std::sync::Arc;

use docdiff_core::config::{DiffLimits, SchedulerConfig};
use docdiff_core::diff::{ComparisonResult, DiffEngine, DocumentPair, SearchStatus};
use docdiff_core::errors::DiffError;
use docdiff_core::guard::TelemetryProvider;
use tokio_util::sync::CancellationToken;

use crate::progress::{ProgressSink, Stage};

const TOKENIZED_PERCENT: u8 = 5;
const DIFFED_PERCENT: u8 = 95;

/// Splits large comparisons into cancellable, progress-reporting units
#[derive(Clone)]
pub struct ChunkScheduler {
    config: SchedulerConfig,
    engine: DiffEngine,
    telemetry: Option<Arc<dyn TelemetryProvider>>,
}

impl ChunkScheduler {
    pub fn new(config: SchedulerConfig, limits: DiffLimits) -> Self {
        Self {
            config,
            engine: DiffEngine::new(limits),
            telemetry: None,
        }
    }

    /// Re-check memory between units against `critical_memory_floor_bytes`
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryProvider>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    /// Whether `pair` takes the incremental path
    pub fn is_chunked(&self, pair: &DocumentPair) -> bool {
        pair.combined_len() > self.config.chunk_threshold_chars
    }

    /// Compare `pair`, reporting progress to `progress`
    ///
    /// All-or-nothing: on any error, including cancellation, no partial
    /// result escapes.
    ///
    /// # Errors
    ///
    /// - `Cancelled` when `cancel` is observed at a unit boundary
    /// - `MemoryExhausted` when telemetry drops under the critical floor
    /// - anything the engine reports
    pub async fn run(
        &self,
        pair: &DocumentPair,
        cancel: &CancellationToken,
        progress: &mut ProgressSink<'_>,
    ) -> Result<ComparisonResult, DiffError> {
        if cancel.is_cancelled() {
            return Err(DiffError::Cancelled);
        }

        if !self.is_chunked(pair) {
            tracing::debug!(
                run_id = progress.run_id().get(),
                combined_len = pair.combined_len(),
                "diffing directly"
            );
            let result = self.engine.diff(pair, cancel)?;
            progress.emit(100, Stage::Diffing);
            return Ok(result);
        }

        let tokens = self.engine.tokenize(pair);
        tracing::debug!(
            run_id = progress.run_id().get(),
            combined_len = pair.combined_len(),
            token_count = tokens.token_count(),
            granularity = ?tokens.granularity,
            "diffing in units"
        );
        progress.emit(TOKENIZED_PERCENT, Stage::Tokenizing);

        let mut search = self.engine.search(tokens)?;
        let mut units = 0usize;
        loop {
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                tracing::debug!(run_id = progress.run_id().get(), units, "cancelled at unit boundary");
                return Err(DiffError::Cancelled);
            }
            self.check_memory()?;

            units += 1;
            match search.step(self.config.unit_budget)? {
                SearchStatus::InProgress { permille } => {
                    tracing::trace!(run_id = progress.run_id().get(), units, permille, "unit done");
                    progress.emit(diffing_percent(permille), Stage::Diffing);
                }
                SearchStatus::Done => {
                    progress.emit(DIFFED_PERCENT, Stage::Diffing);
                    break;
                }
            }
        }

        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(DiffError::Cancelled);
        }
        progress.emit(DIFFED_PERCENT, Stage::Finalizing);
        let result = search.into_result()?;
        progress.emit(100, Stage::Finalizing);

        tracing::debug!(
            run_id = progress.run_id().get(),
            units,
            change_count = result.stats.change_count,
            "chunked diff finished"
        );
        Ok(result)
    }

    fn check_memory(&self) -> Result<(), DiffError> {
        let (Some(telemetry), Some(floor)) =
            (&self.telemetry, self.config.critical_memory_floor_bytes)
        else {
            return Ok(());
        };
        match telemetry.snapshot().available_memory {
            Some(available) if available < floor => {
                Err(DiffError::MemoryExhausted { available, floor })
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for ChunkScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkScheduler")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

fn diffing_percent(permille: u16) -> u8 {
    let span = u32::from(DIFFED_PERCENT - TOKENIZED_PERCENT);
    let scaled = u32::from(permille.min(1000)) * span / 1000;
    TOKENIZED_PERCENT + scaled as u8
}
