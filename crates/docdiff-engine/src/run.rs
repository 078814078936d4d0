//! Comparison run lifecycle
//!
//! One [`ComparisonRun`] exists per accepted request and is dropped as soon
//! as it reaches a terminal phase. All phase changes go through
//! [`ComparisonRun::transition`], which rejects moves the lifecycle does not
//! allow:
//!
//! ```text
//! Admission -> Tokenizing -> Diffing -> Finalizing -> Completed
//! (any non-terminal)          -> Cancelled
//! Tokenizing | Diffing | Finalizing -> Failed
//! ```

use std::time::Instant;

use docdiff_core::diff::DocumentPair;
use docdiff_core::errors::DiffError;
use docdiff_core_types::RunId;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::progress::Stage;

/// What caused a comparison request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// Explicit user action; takes priority over automatic requests
    Manual,
    /// Live-typing or similar automatic re-trigger; debounced
    Auto,
}

impl Trigger {
    pub fn from_auto_flag(is_auto_triggered: bool) -> Self {
        if is_auto_triggered {
            Trigger::Auto
        } else {
            Trigger::Manual
        }
    }
}

/// Lifecycle phase of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    Admission,
    Tokenizing,
    Diffing,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::Cancelled | RunPhase::Failed
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (*self, next) {
            (Admission, Tokenizing)
            | (Tokenizing, Diffing)
            | (Diffing, Diffing)
            | (Diffing, Finalizing)
            | (Finalizing, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            (Tokenizing | Diffing | Finalizing, Failed) => true,
            _ => false,
        }
    }

    fn forward_rank(&self) -> Option<u8> {
        match self {
            RunPhase::Admission => Some(0),
            RunPhase::Tokenizing => Some(1),
            RunPhase::Diffing => Some(2),
            RunPhase::Finalizing => Some(3),
            RunPhase::Completed => Some(4),
            RunPhase::Cancelled | RunPhase::Failed => None,
        }
    }

    fn successor(&self) -> Option<RunPhase> {
        match self {
            RunPhase::Admission => Some(RunPhase::Tokenizing),
            RunPhase::Tokenizing => Some(RunPhase::Diffing),
            RunPhase::Diffing => Some(RunPhase::Finalizing),
            RunPhase::Finalizing => Some(RunPhase::Completed),
            _ => None,
        }
    }
}

impl From<Stage> for RunPhase {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Admission => RunPhase::Admission,
            Stage::Tokenizing => RunPhase::Tokenizing,
            Stage::Diffing => RunPhase::Diffing,
            Stage::Finalizing => RunPhase::Finalizing,
            Stage::Cancelled => RunPhase::Cancelled,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single accepted comparison request
#[derive(Debug)]
pub struct ComparisonRun {
    pub id: RunId,
    pub pair: DocumentPair,
    pub token: CancellationToken,
    pub trigger: Trigger,
    pub started_at: Instant,
    phase: RunPhase,
}

impl ComparisonRun {
    pub fn new(id: RunId, pair: DocumentPair, trigger: Trigger, started_at: Instant) -> Self {
        Self {
            id,
            pair,
            token: CancellationToken::new(),
            trigger,
            started_at,
            phase: RunPhase::Admission,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// Returns `DiffError::InvalidTransition` if the lifecycle forbids it.
    pub fn transition(&mut self, next: RunPhase) -> Result<(), DiffError> {
        if !self.phase.can_transition_to(next) {
            return Err(DiffError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::trace!(
            run_id = self.id.get(),
            from = %self.phase,
            to = %next,
            "run transition"
        );
        self.phase = next;
        Ok(())
    }

    /// Walk forward through every intermediate phase up to `target`
    ///
    /// Reaching the current phase again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DiffError::InvalidTransition` for backward moves or moves out
    /// of a terminal phase.
    pub fn advance_to(&mut self, target: RunPhase) -> Result<(), DiffError> {
        let invalid = |from: RunPhase| DiffError::InvalidTransition {
            from: from.to_string(),
            to: target.to_string(),
        };
        let (Some(mut rank), Some(goal)) = (self.phase.forward_rank(), target.forward_rank()) else {
            return self.transition(target);
        };
        if goal < rank {
            return Err(invalid(self.phase));
        }
        while rank < goal {
            let next = self.phase.successor().ok_or_else(|| invalid(self.phase))?;
            self.transition(next)?;
            rank += 1;
        }
        Ok(())
    }
}
