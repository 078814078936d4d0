//! Check command
//!
//! Usage: docdiff check <ORIGINAL> <REVISED> [--config <FILE>]
//!
//! Runs admission only; nothing is diffed.

use std::path::PathBuf;

use clap::Args;
use docdiff_core::diff::DocumentPair;
use docdiff_core_types::CorrelationId;
use docdiff_engine::Comparator;

use super::{load_config, read_document};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Original document
    pub original: PathBuf,

    /// Revised document
    pub revised: PathBuf,

    /// Comparison settings (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Skip the system memory check
    #[arg(long)]
    pub ignore_memory: bool,
}

/// Execute check command
pub fn execute(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let correlation_id = CorrelationId::new();
    let config = load_config(args.config.as_deref())?;
    let pair = DocumentPair::new(read_document(&args.original)?, read_document(&args.revised)?);

    let comparator = Comparator::new(config, super::telemetry(args.ignore_memory));
    let decision = comparator.check(&pair);
    tracing::info!(
        correlation_id = correlation_id.as_str(),
        combined_len = pair.combined_len(),
        admitted = decision.can_proceed,
        "admission checked"
    );

    match decision.into_error() {
        None => {
            println!(
                "✓ Admitted ({} characters combined, {} + {})",
                pair.combined_len(),
                pair.original_len(),
                pair.revised_len()
            );
            Ok(())
        }
        Some(err) => Err(err.into()),
    }
}
