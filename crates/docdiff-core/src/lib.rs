//! docdiff Core - document comparison kernel
//!
//! This crate provides the synchronous building blocks of a comparison,
//! including:
//! - Admission control over document size, complexity and memory (`guard`)
//! - Tokenization and the Myers shortest-edit-script engine (`diff`)
//! - Tunable limits loaded from TOML (`config`)
//! - The structured error and logging facilities shared by every crate
//!
//! Scheduling, progress reporting and orchestration live in `docdiff-engine`.

pub mod config;
pub mod diff;
pub mod errors;
pub mod guard;
pub mod logging_facility;

// Used by the exported logging macros
pub use docdiff_core_types;

// Re-export commonly used types
pub use config::ComparisonConfig;
pub use diff::{Change, ChangeKind, ComparisonResult, ComparisonStats, DiffEngine, DocumentPair};
pub use errors::{DiffError, ExError, ExErrorKind, Result};
pub use guard::{AdmissionDecision, ResourceGuard, SystemTelemetry, TelemetryProvider};
