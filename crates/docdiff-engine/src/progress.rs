//! Progress reporting for comparison runs
//!
//! A [`ProgressSink`] is handed to the scheduler for exactly one run. It
//! clamps percentages so observers only ever see a non-decreasing sequence,
//! and it drops every event once its run is no longer the active one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use docdiff_core_types::RunId;
use serde::{Deserialize, Serialize};

/// Coarse phase of a comparison as shown to a progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Admission,
    Tokenizing,
    Diffing,
    Finalizing,
    Cancelled,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Admission => "Admission",
            Stage::Tokenizing => "Tokenizing",
            Stage::Diffing => "Diffing",
            Stage::Finalizing => "Finalizing",
            Stage::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable progress of the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// 0..=100
    pub percent: u8,
    pub stage: Stage,
    pub is_active: bool,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            percent: 0,
            stage: Stage::Admission,
            is_active: false,
        }
    }
}

/// One progress report from a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub run_id: RunId,
    pub percent: u8,
    pub stage: Stage,
}

/// Shared record of which run is currently allowed to report
///
/// Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    active: Arc<AtomicU64>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, run_id: RunId) {
        self.active.store(run_id.get(), Ordering::Release);
    }

    pub fn active(&self) -> RunId {
        RunId::new(self.active.load(Ordering::Acquire))
    }

    pub fn is_active(&self, run_id: RunId) -> bool {
        !run_id.is_none() && self.active() == run_id
    }

    /// Close the gate, but only if `run_id` still holds it
    pub fn release(&self, run_id: RunId) -> bool {
        self.active
            .compare_exchange(
                run_id.get(),
                RunId::NONE.get(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Per-run progress channel with monotonic clamping and stale-run gating
pub struct ProgressSink<'a> {
    run_id: RunId,
    gate: RunGate,
    last_percent: u8,
    emitted: usize,
    callback: Box<dyn FnMut(ProgressEvent) + Send + 'a>,
}

impl<'a> ProgressSink<'a> {
    pub fn new(
        run_id: RunId,
        gate: RunGate,
        callback: impl FnMut(ProgressEvent) + Send + 'a,
    ) -> Self {
        Self {
            run_id,
            gate,
            last_percent: 0,
            emitted: 0,
            callback: Box::new(callback),
        }
    }

    /// A sink for a standalone run that owns its own gate
    pub fn detached(run_id: RunId, callback: impl FnMut(ProgressEvent) + Send + 'a) -> Self {
        let gate = RunGate::new();
        gate.activate(run_id);
        Self::new(run_id, gate, callback)
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Number of events delivered so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Report progress; returns false if the event was dropped as stale
    pub fn emit(&mut self, percent: u8, stage: Stage) -> bool {
        if !self.gate.is_active(self.run_id) {
            tracing::trace!(
                run_id = self.run_id.get(),
                percent,
                stage = stage.as_str(),
                "dropping progress from inactive run"
            );
            return false;
        }

        let percent = percent.min(100).max(self.last_percent);
        self.last_percent = percent;
        self.emitted += 1;
        (self.callback)(ProgressEvent {
            run_id: self.run_id,
            percent,
            stage,
        });
        true
    }
}

impl std::fmt::Debug for ProgressSink<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink")
            .field("run_id", &self.run_id)
            .field("last_percent", &self.last_percent)
            .field("emitted", &self.emitted)
            .finish()
    }
}
