//! Subcommands and the input handling they share

pub mod check;
pub mod compare;

use std::path::Path;
use std::sync::Arc;

use docdiff_core::config::ComparisonConfig;
use docdiff_core::errors::{ExError, ExErrorKind, Result};
use docdiff_core::guard::{FixedTelemetry, TelemetryProvider};
use docdiff_engine::SysinfoTelemetry;

/// Load settings from `path`, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<ComparisonConfig> {
    match path {
        Some(path) => ComparisonConfig::from_toml_file(path),
        None => Ok(ComparisonConfig::default()),
    }
}

/// Read a document as UTF-8 text
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        let kind = if e.kind() == std::io::ErrorKind::InvalidData {
            ExErrorKind::InvalidInput
        } else {
            ExErrorKind::Io
        };
        ExError::new(kind)
            .with_op("read_document")
            .with_message(format!("{}: {}", path.display(), e))
    })
}

/// Memory readings for admission; `ignore_memory` reports memory as unknown
pub fn telemetry(ignore_memory: bool) -> Arc<dyn TelemetryProvider> {
    if ignore_memory {
        Arc::new(FixedTelemetry::unknown())
    } else {
        Arc::new(SysinfoTelemetry::new())
    }
}
