//! Observable orchestrator state

use std::sync::Arc;

use docdiff_core::diff::ComparisonResult;
use docdiff_core::errors::{ExError, ExErrorKind};
use docdiff_core_types::RunId;

use super::RetryHandle;
use crate::progress::ProgressState;

/// Options accompanying a comparison request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub is_auto_triggered: bool,
}

impl RequestOptions {
    pub const MANUAL: RequestOptions = RequestOptions {
        is_auto_triggered: false,
    };
    pub const AUTO: RequestOptions = RequestOptions {
        is_auto_triggered: true,
    };
}

/// What the orchestrator did with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A run was admitted and spawned
    Started(RunId),
    /// An automatic request is waiting out the debounce window
    Debounced,
    /// The request was turned away; `reason` is user-facing
    Rejected { reason: String },
    /// One side was blank, so the result was cleared without running
    ShortCircuited,
}

/// A user-visible error with its category and an optional retry
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub kind: ExErrorKind,
    pub code: &'static str,
    pub message: String,
    pub reason: Option<String>,
    pub run_id: Option<RunId>,
    pub retry: Option<RetryHandle>,
}

impl ErrorInfo {
    pub(crate) fn from_error(err: &ExError, retry: Option<RetryHandle>) -> Self {
        Self {
            kind: err.kind(),
            code: err.code(),
            message: err.message().to_string(),
            reason: err.reason().map(str::to_string),
            run_id: err.run_id(),
            retry,
        }
    }

    /// Whether this is the informational "cancelled by user" state
    pub fn is_cancellation(&self) -> bool {
        self.kind.is_user_cancellation()
    }

    /// Text to show the user: the reason when there is one, else the message
    pub fn display_text(&self) -> &str {
        self.reason.as_deref().unwrap_or(&self.message)
    }
}

/// Snapshot of everything an observer can see
#[derive(Debug, Clone, Default)]
pub struct OrchestratorState {
    pub is_processing: bool,
    pub is_cancelling: bool,
    pub is_debouncing: bool,
    pub active_run: Option<RunId>,
    pub result: Option<Arc<ComparisonResult>>,
    pub error: Option<ErrorInfo>,
    pub progress: ProgressState,
}

impl OrchestratorState {
    /// Nothing running and nothing waiting to run
    pub fn is_idle(&self) -> bool {
        !self.is_processing && !self.is_debouncing
    }
}
