//! Comparison orchestration
//!
//! The [`ComparisonOrchestrator`] is the stateful front door for interactive
//! callers. It owns the observable [`OrchestratorState`], debounces automatic
//! requests, keeps at most one run active, and turns every terminal outcome
//! into a state update.
//!
//! Rules, in the order a request meets them:
//! 1. An automatic request while a manual run is in flight is rejected.
//! 2. A pair with a blank side clears the result without running.
//! 3. Automatic requests wait out the debounce window; a newer one replaces
//!    the pending one.
//! 4. Starting a run cancels whichever run was active. The cancelled run's
//!    late progress and terminal state are dropped.
//! 5. Admission failures are reported as `AdmissionRejected` and never start
//!    a run.

pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use docdiff_core::config::{ComparisonConfig, OrchestratorConfig};
use docdiff_core::diff::{ComparisonResult, DocumentPair};
use docdiff_core::errors::{ExError, ExErrorKind, Result};
use docdiff_core::guard::TelemetryProvider;
use docdiff_core_types::RunId;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::comparator::{now, Comparator};
use crate::progress::{ProgressEvent, ProgressSink, ProgressState, RunGate, Stage};
use crate::run::{ComparisonRun, RunPhase, Trigger};
use crate::telemetry::SysinfoTelemetry;

pub use state::{ErrorInfo, OrchestratorState, RequestOptions, RequestOutcome};

const MANUAL_LOCK_REASON: &str =
    "A manual comparison is in progress. Automatic comparison resumes when it finishes.";

/// Stateful, debounced, single-run comparison coordinator
///
/// Must be created inside a tokio runtime; runs and debounce timers are
/// spawned onto it.
pub struct ComparisonOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    comparator: Comparator,
    timing: OrchestratorConfig,
    runtime: Handle,
    state: watch::Sender<OrchestratorState>,
    gate: RunGate,
    control: Mutex<Control>,
}

#[derive(Default)]
struct Control {
    last_run: RunId,
    active: Option<ActiveRun>,
    manual_lock: Option<RunId>,
    debounce_seq: u64,
    pending: Option<JoinHandle<()>>,
}

struct ActiveRun {
    id: RunId,
    trigger: Trigger,
    cancel: CancellationToken,
}

impl ComparisonOrchestrator {
    /// Build an orchestrator on the current tokio runtime
    ///
    /// # Errors
    ///
    /// - `SystemError` when called outside a tokio runtime
    /// - `InvalidConfig` when `config` fails validation
    pub fn new(config: ComparisonConfig, telemetry: Arc<dyn TelemetryProvider>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            ExError::new(ExErrorKind::SystemError)
                .with_op("orchestrator_new")
                .with_message(format!("no tokio runtime available: {}", e))
        })?;
        config.validate()?;

        let (state, _) = watch::channel(OrchestratorState::default());
        Ok(Self {
            inner: Arc::new(Inner {
                timing: config.orchestrator.clone(),
                comparator: Comparator::new(config, telemetry),
                runtime,
                state,
                gate: RunGate::new(),
                control: Mutex::new(Control::default()),
            }),
        })
    }

    /// Build an orchestrator that reads memory from the operating system
    ///
    /// # Errors
    ///
    /// See [`ComparisonOrchestrator::new`].
    pub fn with_system_telemetry(config: ComparisonConfig) -> Result<Self> {
        Self::new(config, Arc::new(SysinfoTelemetry::new()))
    }

    pub fn comparator(&self) -> &Comparator {
        &self.inner.comparator
    }

    /// Current observable state
    pub fn state(&self) -> OrchestratorState {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.inner.state.subscribe()
    }

    /// Ask for a comparison; returns as soon as the request is decided
    pub fn request_comparison(&self, pair: DocumentPair, options: RequestOptions) -> RequestOutcome {
        self.inner
            .request(pair, Trigger::from_auto_flag(options.is_auto_triggered))
    }

    /// Cancel the active run and any pending debounced request
    ///
    /// Idempotent; does nothing when nothing is running.
    pub fn cancel_active(&self) {
        self.inner.cancel_active();
    }

    /// Wait until nothing is running or waiting to run
    pub async fn wait_idle(&self) -> OrchestratorState {
        let mut rx = self.inner.state.subscribe();
        let idle = rx
            .wait_for(OrchestratorState::is_idle)
            .await
            .map(|state| state.clone());
        idle.unwrap_or_else(|_| self.state())
    }
}

impl Drop for ComparisonOrchestrator {
    fn drop(&mut self) {
        let mut control = self.inner.lock_control();
        self.inner.cancel_pending(&mut control);
        if let Some(active) = &control.active {
            active.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for ComparisonOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonOrchestrator")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Re-submits a failed comparison as a manual request
#[derive(Clone)]
pub struct RetryHandle {
    pair: DocumentPair,
    inner: Weak<Inner>,
}

impl RetryHandle {
    pub fn pair(&self) -> &DocumentPair {
        &self.pair
    }

    /// Request the same pair again with manual priority
    pub fn retry(&self) -> RequestOutcome {
        match self.inner.upgrade() {
            Some(inner) => inner.request(self.pair.clone(), Trigger::Manual),
            None => RequestOutcome::Rejected {
                reason: "The comparison engine is no longer running.".to_string(),
            },
        }
    }
}

impl std::fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHandle")
            .field("pair", &self.pair)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply `update` and resync `is_debouncing` in one notification
    fn publish(&self, control: &Control, update: impl FnOnce(&mut OrchestratorState)) {
        let debouncing = control.pending.is_some();
        self.state.send_modify(|state| {
            update(state);
            state.is_debouncing = debouncing;
        });
    }

    fn request(self: &Arc<Self>, pair: DocumentPair, trigger: Trigger) -> RequestOutcome {
        let mut control = self.lock_control();

        if trigger == Trigger::Auto {
            if let Some(manual) = control.manual_lock {
                tracing::debug!(manual_run = manual.get(), "auto request locked out");
                return RequestOutcome::Rejected {
                    reason: MANUAL_LOCK_REASON.to_string(),
                };
            }
        }

        if pair.has_blank_side() {
            tracing::debug!(trigger = ?trigger, "blank input, clearing result");
            self.cancel_pending(&mut control);
            self.supersede_active(&mut control);
            self.publish(&control, |state| {
                state.is_processing = false;
                state.is_cancelling = false;
                state.active_run = None;
                state.result = None;
                state.error = None;
                state.progress = ProgressState::default();
            });
            return RequestOutcome::ShortCircuited;
        }

        match trigger {
            Trigger::Auto => {
                self.schedule_debounced(&mut control, pair);
                RequestOutcome::Debounced
            }
            Trigger::Manual => {
                self.cancel_pending(&mut control);
                self.start_run(&mut control, pair, Trigger::Manual)
            }
        }
    }

    fn cancel_active(&self) {
        let mut control = self.lock_control();
        self.cancel_pending(&mut control);

        let cancelling = match &control.active {
            Some(active) => {
                if !active.cancel.is_cancelled() {
                    tracing::debug!(run_id = active.id.get(), "cancellation requested");
                    active.cancel.cancel();
                }
                true
            }
            None => false,
        };
        self.publish(&control, |state| {
            state.is_cancelling = cancelling;
        });
    }

    fn cancel_pending(&self, control: &mut Control) {
        control.debounce_seq = control.debounce_seq.wrapping_add(1);
        if let Some(pending) = control.pending.take() {
            pending.abort();
        }
    }

    fn schedule_debounced(self: &Arc<Self>, control: &mut Control, pair: DocumentPair) {
        self.cancel_pending(control);
        let seq = control.debounce_seq;
        let delay = self.timing.debounce();
        let inner = Arc::clone(self);

        control.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire_debounced(seq, pair);
        }));
        tracing::trace!(seq, delay_ms = delay.as_millis() as u64, "auto request debounced");
        self.publish(control, |_| {});
    }

    fn fire_debounced(self: &Arc<Self>, seq: u64, pair: DocumentPair) {
        let mut control = self.lock_control();
        if control.debounce_seq != seq {
            return;
        }
        control.pending = None;

        if control.manual_lock.is_some() {
            tracing::debug!(seq, "debounced request dropped behind manual run");
            self.publish(&control, |_| {});
            return;
        }
        let _ = self.start_run(&mut control, pair, Trigger::Auto);
    }

    fn supersede_active(&self, control: &mut Control) {
        if let Some(active) = control.active.take() {
            tracing::debug!(
                run_id = active.id.get(),
                trigger = ?active.trigger,
                "superseding active run"
            );
            active.cancel.cancel();
            self.gate.release(active.id);
            if control.manual_lock == Some(active.id) {
                control.manual_lock = None;
            }
        }
    }

    fn start_run(
        self: &Arc<Self>,
        control: &mut Control,
        pair: DocumentPair,
        trigger: Trigger,
    ) -> RequestOutcome {
        self.supersede_active(control);

        let run_id = control.last_run.next();
        control.last_run = run_id;
        let run = ComparisonRun::new(run_id, pair, trigger, now());

        if let Err(err) = self.comparator.admit(&run.pair) {
            let err = err.with_run_id(run_id);
            let reason = err.reason().unwrap_or(err.message()).to_string();
            tracing::info!(run_id = run_id.get(), trigger = ?trigger, "comparison not admitted");
            self.publish(control, |state| {
                state.is_processing = false;
                state.is_cancelling = false;
                state.active_run = None;
                state.error = Some(ErrorInfo::from_error(&err, None));
                state.progress = ProgressState::default();
            });
            return RequestOutcome::Rejected { reason };
        }

        if trigger == Trigger::Manual {
            control.manual_lock = Some(run_id);
        }
        self.gate.activate(run_id);
        control.active = Some(ActiveRun {
            id: run_id,
            trigger,
            cancel: run.token.clone(),
        });
        self.publish(control, |state| {
            state.is_processing = true;
            state.is_cancelling = false;
            state.active_run = Some(run_id);
            state.error = None;
            state.progress = ProgressState {
                percent: 0,
                stage: Stage::Admission,
                is_active: true,
            };
        });

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let mut run = run;
            let outcome = inner.drive(&mut run).await;
            inner.finish(run, outcome);
        });
        RequestOutcome::Started(run_id)
    }

    async fn drive(self: &Arc<Self>, run: &mut ComparisonRun) -> Result<ComparisonResult> {
        run.transition(RunPhase::Tokenizing)
            .map_err(|e| ExError::from(e).with_run_id(run.id))?;

        let delay = self.timing.processing_indicator_delay();
        if !delay.is_zero() {
            tokio::select! {
                _ = run.token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let inner = Arc::clone(self);
        let (run_id, pair, cancel) = (run.id, run.pair.clone(), run.token.clone());
        let gate = self.gate.clone();
        let mut task = self.runtime.spawn(async move {
            let mut sink = ProgressSink::new(run_id, gate, move |event| {
                let _ = tx.send(event);
            });
            inner
                .comparator
                .execute(run_id, &pair, &cancel, &mut sink)
                .await
        });

        let mut fault = None;
        let joined = loop {
            tokio::select! {
                biased;
                Some(event) = rx.recv() => self.apply_progress(run, event, &mut fault),
                joined = &mut task => break joined,
            }
        };
        while let Ok(event) = rx.try_recv() {
            self.apply_progress(run, event, &mut fault);
        }

        let outcome = joined.unwrap_or_else(|join_err| {
            let what = if join_err.is_panic() {
                "comparison task panicked"
            } else {
                "comparison task was aborted"
            };
            Err(ExError::new(ExErrorKind::UnknownError)
                .with_op("comparison_run")
                .with_message(what)
                .with_run_id(run.id))
        });
        match fault {
            Some(err) => Err(err),
            None => outcome,
        }
    }

    fn apply_progress(
        &self,
        run: &mut ComparisonRun,
        event: ProgressEvent,
        fault: &mut Option<ExError>,
    ) {
        if !self.gate.is_active(run.id) {
            tracing::trace!(run_id = run.id.get(), "dropping progress from superseded run");
            return;
        }
        if let Err(err) = run.advance_to(RunPhase::from(event.stage)) {
            if fault.is_none() {
                *fault = Some(ExError::from(err).with_run_id(run.id));
                run.token.cancel();
            }
            return;
        }
        self.state.send_if_modified(|state| {
            if state.active_run != Some(run.id) {
                return false;
            }
            state.progress = ProgressState {
                percent: event.percent,
                stage: event.stage,
                is_active: true,
            };
            true
        });
    }

    fn finish(self: &Arc<Self>, mut run: ComparisonRun, outcome: Result<ComparisonResult>) {
        let mut control = self.lock_control();

        let is_current = control.active.as_ref().is_some_and(|a| a.id == run.id);
        if !is_current {
            tracing::debug!(run_id = run.id.get(), "discarding outcome of superseded run");
            if !run.phase().is_terminal() {
                let _ = run.transition(RunPhase::Cancelled);
            }
            return;
        }

        control.active = None;
        if control.manual_lock == Some(run.id) {
            tracing::debug!(run_id = run.id.get(), "manual lock released");
            control.manual_lock = None;
        }
        self.gate.release(run.id);

        let outcome = settle(&run, outcome).and_then(|result| {
            run.advance_to(RunPhase::Completed)
                .map(|()| result)
                .map_err(|e| ExError::from(e).with_run_id(run.id))
        });

        match outcome {
            Ok(result) => {
                tracing::info!(
                    run_id = run.id.get(),
                    change_count = result.stats.change_count as u64,
                    "comparison completed"
                );
                self.publish(&control, |state| {
                    state.is_processing = false;
                    state.is_cancelling = false;
                    state.active_run = None;
                    state.result = Some(Arc::new(result));
                    state.error = None;
                    state.progress = ProgressState {
                        percent: 100,
                        stage: state.progress.stage,
                        is_active: false,
                    };
                });
            }
            Err(err) if err.kind().is_user_cancellation() => {
                if let Err(e) = run.transition(RunPhase::Cancelled) {
                    tracing::warn!(run_id = run.id.get(), error = %e, "run already terminal");
                }
                tracing::info!(run_id = run.id.get(), "comparison cancelled");
                self.publish(&control, |state| {
                    state.is_processing = false;
                    state.is_cancelling = false;
                    state.active_run = None;
                    state.error = Some(ErrorInfo::from_error(&err, None));
                    state.progress = ProgressState {
                        percent: state.progress.percent,
                        stage: Stage::Cancelled,
                        is_active: false,
                    };
                });
            }
            Err(err) => {
                if let Err(e) = run.transition(RunPhase::Failed) {
                    tracing::warn!(run_id = run.id.get(), error = %e, "run already terminal");
                }
                let retry = err.is_retryable().then(|| RetryHandle {
                    pair: run.pair.clone(),
                    inner: Arc::downgrade(self),
                });
                tracing::warn!(
                    run_id = run.id.get(),
                    err.code = err.code(),
                    retryable = retry.is_some(),
                    "comparison failed"
                );
                self.publish(&control, |state| {
                    state.is_processing = false;
                    state.is_cancelling = false;
                    state.active_run = None;
                    state.error = Some(ErrorInfo::from_error(&err, retry));
                    state.progress.is_active = false;
                });
            }
        }
    }
}

/// Turn a finished run's outcome into its terminal result
///
/// A run whose token was cancelled never completes, even when the work
/// itself got done before the request was seen.
fn settle(run: &ComparisonRun, outcome: Result<ComparisonResult>) -> Result<ComparisonResult> {
    match outcome {
        Ok(_) if run.token.is_cancelled() => Err(ExError::cancelled().with_run_id(run.id)),
        other => other,
    }
}
