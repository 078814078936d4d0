//! Compare command
//!
//! Usage: docdiff compare <ORIGINAL> <REVISED> [--config <FILE>] [--json] [--quiet] [--ignore-memory]

use std::path::PathBuf;

use clap::Args;
use docdiff_core::diff::render_human_summary;
use docdiff_core_types::CorrelationId;
use docdiff_engine::Comparator;
use tokio_util::sync::CancellationToken;

use super::{load_config, read_document};

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Original document
    pub original: PathBuf,

    /// Revised document
    pub revised: PathBuf,

    /// Comparison settings (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the full result as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Skip the system memory check
    #[arg(long)]
    pub ignore_memory: bool,

    /// Do not report progress on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute compare command
pub async fn execute(args: CompareArgs) -> Result<(), Box<dyn std::error::Error>> {
    let correlation_id = CorrelationId::new();
    let config = load_config(args.config.as_deref())?;
    let original = read_document(&args.original)?;
    let revised = read_document(&args.revised)?;
    tracing::info!(
        correlation_id = correlation_id.as_str(),
        original = %args.original.display(),
        revised = %args.revised.display(),
        "compare requested"
    );

    let comparator = Comparator::new(config, super::telemetry(args.ignore_memory));

    // Ctrl-C cancels at the next unit boundary
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let quiet = args.quiet;
    let outcome = comparator
        .compare(
            &original,
            &revised,
            |percent, stage| {
                if !quiet {
                    eprintln!("[{:>3}%] {}", percent, stage);
                }
            },
            &cancel,
        )
        .await;
    interrupt.abort();

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            tracing::info!(
                correlation_id = correlation_id.as_str(),
                err.code = err.code(),
                "compare finished without a result"
            );
            return Err(err.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_human_summary(&result));
    }
    Ok(())
}
