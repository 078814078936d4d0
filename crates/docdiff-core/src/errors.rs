use docdiff_core_types::RunId;
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure a caller can observe maps to exactly one kind. Each kind has a
/// stable error code usable for programmatic handling, testing, and for the
/// category shown next to a failed comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Caller input
    InvalidInput,
    InvalidConfig,

    // Comparison outcomes
    /// The resource guard declined the run before any work started
    AdmissionRejected,
    /// The diff search hit its internal safety ceiling
    AlgorithmError,
    /// The environment failed underneath the run (memory, allocation, runtime)
    SystemError,
    /// The user asked for the run to stop
    Cancelled,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    UnknownError,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::AdmissionRejected => "ERR_ADMISSION_REJECTED",
            ExErrorKind::AlgorithmError => "ERR_ALGORITHM",
            ExErrorKind::SystemError => "ERR_SYSTEM",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::UnknownError => "ERR_UNKNOWN",
        }
    }

    /// Whether re-running the same request may succeed
    ///
    /// Admission rejections are never retried automatically, and a user
    /// cancellation is not a failure to begin with.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExErrorKind::AlgorithmError | ExErrorKind::SystemError | ExErrorKind::UnknownError
        )
    }

    /// Whether this kind is the informational "cancelled by user" outcome
    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, ExErrorKind::Cancelled)
    }
}

/// Canonical structured error type
///
/// Carries the classification used for programmatic handling together with
/// the context needed for debugging a failed run.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    run_id: Option<RunId>,
    message: String,
    reason: Option<String>,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            run_id: None,
            message: String::new(),
            reason: None,
            source: None,
        }
    }

    /// The distinguished "cancelled by user" error
    pub fn cancelled() -> Self {
        Self::new(ExErrorKind::Cancelled).with_message("comparison cancelled by user")
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add run context
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add the user-facing reason (admission rejections always carry one)
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the run context, if any
    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the user-facing reason, if any
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Shorthand for `self.kind().is_retryable()`
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}", self.code(), self.kind)?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(reason) = &self.reason {
            write!(f, " ({})", reason)?;
        }
        if let Some(run_id) = self.run_id {
            write!(f, " [{}]", run_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Typed failures raised inside the diff core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// The edit distance needs more trace memory than the ceiling allows
    #[error("Edit distance {edit_distance} needs more than {max_cells} trace cells for {token_count} tokens")]
    EditDistanceLimit {
        edit_distance: usize,
        max_cells: usize,
        token_count: usize,
    },

    /// The allocator refused a trace round
    #[error("Failed to reserve {cells} trace cells")]
    AllocationFailed { cells: usize },

    /// Telemetry reported memory exhaustion between work units
    #[error("Available memory {available} bytes fell below the {floor} byte floor")]
    MemoryExhausted { available: u64, floor: u64 },

    /// The cancellation token was observed at a unit boundary
    #[error("Comparison cancelled")]
    Cancelled,

    /// A run tried to move between phases in an order the state machine forbids
    #[error("Illegal run transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversion from DiffError to ExError
///
/// Only categorisation happens here; the message is carried through unchanged.
impl From<DiffError> for ExError {
    fn from(err: DiffError) -> Self {
        let message = err.to_string();
        match err {
            DiffError::EditDistanceLimit { .. } => ExError::new(ExErrorKind::AlgorithmError)
                .with_op("diff")
                .with_message(message)
                .with_reason("too many differences to compare safely; try again or reduce the documents"),
            DiffError::AllocationFailed { .. } => ExError::new(ExErrorKind::SystemError)
                .with_op("diff")
                .with_message(message)
                .with_reason("out of memory; try smaller documents"),
            DiffError::MemoryExhausted { .. } => ExError::new(ExErrorKind::SystemError)
                .with_op("schedule")
                .with_message(message)
                .with_reason("system memory low; close other applications or compare smaller sections"),
            DiffError::Cancelled => ExError::cancelled(),
            DiffError::InvalidTransition { .. } | DiffError::Internal { .. } => {
                ExError::new(ExErrorKind::UnknownError).with_message(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let kinds = [
            ExErrorKind::InvalidInput,
            ExErrorKind::InvalidConfig,
            ExErrorKind::AdmissionRejected,
            ExErrorKind::AlgorithmError,
            ExErrorKind::SystemError,
            ExErrorKind::Cancelled,
            ExErrorKind::Io,
            ExErrorKind::Serialization,
            ExErrorKind::UnknownError,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_source_chain() {
        let inner = ExError::new(ExErrorKind::Io).with_message("disk gone");
        let outer = ExError::new(ExErrorKind::UnknownError).with_source(inner);

        let source = std::error::Error::source(&outer).expect("source present");
        assert!(source.to_string().contains("disk gone"));
    }
}
