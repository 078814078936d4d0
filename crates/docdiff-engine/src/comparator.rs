//! The in-process comparison surface
//!
//! A [`Comparator`] bundles the admission guard, the scheduler and the one
//! piece of state shared across runs: when the last large operation was
//! admitted. The orchestrator uses [`Comparator::admit`] and
//! [`Comparator::execute`] separately; callers without an orchestrator use
//! [`Comparator::compare`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use docdiff_core::config::ComparisonConfig;
use docdiff_core::diff::{ComparisonResult, DocumentPair};
use docdiff_core::errors::{DiffError, ExError, Result};
use docdiff_core::guard::{AdmissionDecision, ResourceGuard, TelemetryProvider};
use docdiff_core::{log_op_end, log_op_error, log_op_start};
use docdiff_core_types::RunId;
use tokio_util::sync::CancellationToken;

use crate::progress::{ProgressSink, Stage};
use crate::scheduler::ChunkScheduler;

/// Current time on the runtime clock, so paused-time tests see cooldowns move
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Admission plus scheduled diffing over a shared configuration
pub struct Comparator {
    config: ComparisonConfig,
    guard: ResourceGuard,
    scheduler: ChunkScheduler,
    telemetry: Arc<dyn TelemetryProvider>,
    last_large_op_at: Mutex<Option<Instant>>,
    next_standalone_run: AtomicU64,
}

impl Comparator {
    pub fn new(config: ComparisonConfig, telemetry: Arc<dyn TelemetryProvider>) -> Self {
        let scheduler = ChunkScheduler::new(config.scheduler.clone(), config.diff.clone())
            .with_telemetry(telemetry.clone());
        Self {
            guard: ResourceGuard::new(config.guard.clone()),
            scheduler,
            telemetry,
            config,
            last_large_op_at: Mutex::new(None),
            next_standalone_run: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &ChunkScheduler {
        &self.scheduler
    }

    /// Evaluate admission without recording anything
    pub fn check(&self, pair: &DocumentPair) -> AdmissionDecision {
        self.guard.admit(
            pair,
            &self.telemetry.snapshot(),
            self.last_large_op(),
            now(),
        )
    }

    /// Evaluate admission and record a large operation if one is admitted
    ///
    /// # Errors
    ///
    /// Returns `AdmissionRejected` carrying the guard's reason.
    pub fn admit(&self, pair: &DocumentPair) -> Result<AdmissionDecision> {
        let mut last = self.lock_last_large_op();
        let at = now();
        let decision = self.guard.admit(pair, &self.telemetry.snapshot(), *last, at);
        if decision.records_large_op {
            *last = Some(at);
        }
        drop(last);

        match decision.clone().into_error() {
            Some(err) => Err(err),
            None => Ok(decision),
        }
    }

    /// Run the scheduler for an already admitted pair
    ///
    /// # Errors
    ///
    /// Returns the categorised scheduler error, tagged with `run_id`.
    /// A cancellation observed after the scheduler finished is still
    /// reported as `Cancelled`.
    pub async fn execute(
        &self,
        run_id: RunId,
        pair: &DocumentPair,
        cancel: &CancellationToken,
        progress: &mut ProgressSink<'_>,
    ) -> Result<ComparisonResult> {
        let start = std::time::Instant::now();
        log_op_start!(
            "compare",
            run_id = run_id.get(),
            original_len = pair.original_len() as u64,
            revised_len = pair.revised_len() as u64,
            chunked = self.scheduler.is_chunked(pair)
        );

        // A cancel that lands after the last unit boundary still wins
        let outcome = self
            .scheduler
            .run(pair, cancel, progress)
            .await
            .and_then(|result| {
                if cancel.is_cancelled() {
                    Err(DiffError::Cancelled)
                } else {
                    Ok(result)
                }
            });

        match outcome {
            Ok(result) => {
                log_op_end!(
                    "compare",
                    duration_ms = start.elapsed().as_millis() as u64,
                    run_id = run_id.get(),
                    change_count = result.stats.change_count as u64
                );
                Ok(result)
            }
            Err(err) => {
                let err = ExError::from(err).with_run_id(run_id);
                log_op_error!(
                    "compare",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    run_id = run_id.get()
                );
                Err(err)
            }
        }
    }

    /// Compare two texts end to end: admission, then scheduled diffing
    ///
    /// `on_progress` receives `(percent, stage)` pairs, non-decreasing in
    /// percent and ending at 100 on success.
    ///
    /// # Errors
    ///
    /// - `AdmissionRejected` before any work starts
    /// - `Cancelled` once `cancel` is observed
    /// - `AlgorithmError` / `SystemError` from the engine or scheduler
    pub async fn compare(
        &self,
        original: &str,
        revised: &str,
        mut on_progress: impl FnMut(u8, Stage) + Send,
        cancel: &CancellationToken,
    ) -> Result<ComparisonResult> {
        let pair = DocumentPair::new(original, revised);
        let run_id = RunId::new(self.next_standalone_run.fetch_add(1, Ordering::Relaxed) + 1);

        if let Err(err) = self.admit(&pair) {
            return Err(err.with_run_id(run_id));
        }
        if cancel.is_cancelled() {
            return Err(ExError::cancelled().with_run_id(run_id));
        }

        let mut sink = ProgressSink::detached(run_id, |event| {
            on_progress(event.percent, event.stage);
        });
        self.execute(run_id, &pair, cancel, &mut sink).await
    }

    fn last_large_op(&self) -> Option<Instant> {
        *self.lock_last_large_op()
    }

    fn lock_last_large_op(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        match self.last_large_op_at.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparator")
            .field("config", &self.config)
            .field("last_large_op_at", &self.last_large_op())
            .finish_non_exhaustive()
    }
}
