//! docdiff Engine - Orchestration layer
//!
//! Drives the core diff engine asynchronously: chunked execution with
//! progress and cooperative cancellation, the `compare` surface, and the
//! debounced single-run orchestrator used by interactive callers.

pub mod comparator;
pub mod orchestrator;
pub mod progress;
pub mod run;
pub mod scheduler;
pub mod telemetry;

pub use comparator::Comparator;
pub use orchestrator::{
    ComparisonOrchestrator, ErrorInfo, OrchestratorState, RequestOptions, RequestOutcome,
    RetryHandle,
};
pub use progress::{ProgressEvent, ProgressSink, ProgressState, RunGate, Stage};
pub use run::{ComparisonRun, RunPhase, Trigger};
pub use scheduler::ChunkScheduler;
pub use telemetry::SysinfoTelemetry;
