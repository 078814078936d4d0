//! Admission control for document comparisons
//!
//! This module defines the `ResourceGuard`, a pure pre-flight check that
//! decides whether a document pair may be compared at all, and the
//! `TelemetryProvider` trait through which it learns about available memory.
//!
//! The guard never records anything itself. When a decision has
//! `records_large_op` set, the caller stores `now` as the new "last large
//! operation" timestamp.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::GuardLimits;
use crate::diff::model::DocumentPair;
use crate::errors::{ExError, ExErrorKind};

/// Best-effort snapshot of host resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTelemetry {
    /// Available memory in bytes, `None` when the platform cannot tell
    pub available_memory: Option<u64>,
}

impl SystemTelemetry {
    pub const UNKNOWN: SystemTelemetry = SystemTelemetry {
        available_memory: None,
    };

    pub fn with_available_memory(bytes: u64) -> Self {
        Self {
            available_memory: Some(bytes),
        }
    }
}

/// Source of host telemetry
///
/// Implementations must be cheap enough to call between scheduler units.
pub trait TelemetryProvider: Send + Sync {
    fn snapshot(&self) -> SystemTelemetry;
}

/// Telemetry provider that always reports the same snapshot
///
/// # Example
/// ```
/// use docdiff_core::guard::{FixedTelemetry, TelemetryProvider};
///
/// let telemetry = FixedTelemetry::unknown();
/// assert_eq!(telemetry.snapshot().available_memory, None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTelemetry(pub SystemTelemetry);

impl FixedTelemetry {
    pub fn unknown() -> Self {
        Self(SystemTelemetry::UNKNOWN)
    }

    pub fn available(bytes: u64) -> Self {
        Self(SystemTelemetry::with_available_memory(bytes))
    }
}

impl TelemetryProvider for FixedTelemetry {
    fn snapshot(&self) -> SystemTelemetry {
        self.0
    }
}

/// Which admission rule turned a pair away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionRule {
    TooLarge,
    TooComplex,
    MemoryLow,
    Cooldown,
}

impl RejectionRule {
    /// The user-facing reason for this rejection
    pub fn reason(&self) -> &'static str {
        match self {
            RejectionRule::TooLarge => {
                "Documents are too large to compare. Break them into sections and compare each section."
            }
            RejectionRule::TooComplex => {
                "Documents are too complex to compare. Comparisons need fewer differences or smaller documents."
            }
            RejectionRule::MemoryLow => {
                "System memory is low. Close other applications and try again."
            }
            RejectionRule::Cooldown => {
                "Cooldown in effect. Wait a few seconds before the next large comparison."
            }
        }
    }
}

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub can_proceed: bool,
    pub reason: Option<String>,
    pub rejection: Option<RejectionRule>,
    /// The caller must record `now` as the last large operation time
    pub records_large_op: bool,
}

impl AdmissionDecision {
    fn admit(records_large_op: bool) -> Self {
        Self {
            can_proceed: true,
            reason: None,
            rejection: None,
            records_large_op,
        }
    }

    fn reject(rule: RejectionRule) -> Self {
        Self {
            can_proceed: false,
            reason: Some(rule.reason().to_string()),
            rejection: Some(rule),
            records_large_op: false,
        }
    }

    /// Convert a rejection into the `AdmissionRejected` error, `None` if admitted
    pub fn into_error(self) -> Option<ExError> {
        if self.can_proceed {
            return None;
        }
        let rule = self.rejection.map(|r| format!("{:?}", r)).unwrap_or_default();
        let mut err = ExError::new(ExErrorKind::AdmissionRejected)
            .with_op("admit")
            .with_message(format!("comparison rejected by admission rule {}", rule));
        if let Some(reason) = self.reason {
            err = err.with_reason(reason);
        }
        Some(err)
    }
}

/// Stateless admission check
///
/// Rules apply in order and the first match wins:
/// 1. combined length over `max_combined_length`
/// 2. combined length over `complex_combined_threshold` and the shorter side
///    over `complex_min_side`
/// 3. known available memory under `min_available_memory_bytes`
/// 4. a large operation inside the cooldown window of the previous one
#[derive(Debug, Clone, Default)]
pub struct ResourceGuard {
    limits: GuardLimits,
}

impl ResourceGuard {
    pub fn new(limits: GuardLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &GuardLimits {
        &self.limits
    }

    /// Whether a pair of this combined length counts as a large operation
    pub fn is_large_operation(&self, combined_len: usize) -> bool {
        combined_len > self.limits.large_operation_threshold
    }

    pub fn admit(
        &self,
        pair: &DocumentPair,
        telemetry: &SystemTelemetry,
        last_large_op_at: Option<Instant>,
        now: Instant,
    ) -> AdmissionDecision {
        let combined = pair.combined_len();
        let limits = &self.limits;

        let decision = if combined > limits.max_combined_length {
            AdmissionDecision::reject(RejectionRule::TooLarge)
        } else if combined > limits.complex_combined_threshold
            && pair.shorter_len() > limits.complex_min_side
        {
            AdmissionDecision::reject(RejectionRule::TooComplex)
        } else if telemetry
            .available_memory
            .is_some_and(|bytes| bytes < limits.min_available_memory_bytes)
        {
            AdmissionDecision::reject(RejectionRule::MemoryLow)
        } else if self.is_large_operation(combined)
            && last_large_op_at.is_some_and(|last| {
                now.saturating_duration_since(last) < limits.large_operation_cooldown()
            })
        {
            AdmissionDecision::reject(RejectionRule::Cooldown)
        } else {
            AdmissionDecision::admit(self.is_large_operation(combined))
        };

        match decision.rejection {
            Some(rule) => tracing::warn!(
                combined_len = combined,
                rule = ?rule,
                "admission rejected"
            ),
            None => tracing::debug!(
                combined_len = combined,
                large_op = decision.records_large_op,
                "admission granted"
            ),
        }
        decision
    }

    /// Remaining cooldown for a large operation at `now`, zero when clear
    pub fn cooldown_remaining(&self, last_large_op_at: Option<Instant>, now: Instant) -> Duration {
        last_large_op_at.map_or(Duration::ZERO, |last| {
            self.limits
                .large_operation_cooldown()
                .saturating_sub(now.saturating_duration_since(last))
        })
    }
}
