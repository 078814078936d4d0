//! docdiff CLI
//!
//! Command-line interface for comparing two documents

use clap::{Parser, Subcommand, ValueEnum};
use docdiff_core::errors::ExError;
use docdiff_core::logging_facility::{self, Profile};

mod commands;

/// Exit status when the user interrupted the comparison
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "docdiff")]
#[command(about = "docdiff - Compare two documents word by word", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogProfile::Prod)]
    log_profile: LogProfile,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogProfile {
    /// Human-readable logs at debug level
    Dev,
    /// JSON logs at info level
    Prod,
}

impl From<LogProfile> for Profile {
    fn from(profile: LogProfile) -> Self {
        match profile {
            LogProfile::Dev => Profile::Development,
            LogProfile::Prod => Profile::Production,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare two documents and print the changes
    Compare(commands::compare::CompareArgs),
    /// Check whether a comparison would be admitted, without running it
    Check(commands::check::CheckArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging_facility::init(cli.log_profile.into());

    let result = match cli.command {
        Commands::Compare(args) => commands::compare::execute(args).await,
        Commands::Check(args) => commands::check::execute(args),
    };

    if let Err(e) = result {
        let code = match e.downcast_ref::<ExError>() {
            Some(err) if err.kind().is_user_cancellation() => {
                eprintln!("Comparison cancelled");
                EXIT_CANCELLED
            }
            Some(err) => {
                eprintln!("Error: {}", err.reason().unwrap_or(err.message()));
                1
            }
            None => {
                eprintln!("Error: {}", e);
                1
            }
        };
        std::process::exit(code);
    }
}
