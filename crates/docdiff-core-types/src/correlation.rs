//! Correlation types for run tracking and tracing
//!
//! These types let log events, progress events and errors be tied back to
//! the comparison run (or `compare` call) that produced them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single comparison run within one orchestrator
///
/// Run ids are allocated monotonically, so a larger id always belongs to a
/// later run. The value `0` is reserved to mean "no run".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RunId(u64);

impl RunId {
    /// Sentinel meaning no run is active
    pub const NONE: RunId = RunId(0);

    /// Wrap a raw id value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id allocated after this one
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Whether this is the "no run" sentinel
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Correlation identifier for one `compare` call or CLI invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new random CorrelationId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
