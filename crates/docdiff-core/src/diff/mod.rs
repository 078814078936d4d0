//! Document diff engine.
//!
//! Computes a minimal, deterministic edit script between two plain-text
//! documents and reports it as ordered [`Change`] spans.
//!
//! ## Entry point
//!
//! ```
//! use docdiff_core::diff::{DiffEngine, DocumentPair};
//! use tokio_util::sync::CancellationToken;
//!
//! let pair = DocumentPair::new("The cat sat.", "The cat sat on the mat.");
//! let result = DiffEngine::default().diff(&pair, &CancellationToken::new()).unwrap();
//! assert_eq!(result.reconstruct_revised(), "The cat sat on the mat.");
//! let summary = docdiff_core::diff::render_human_summary(&result);
//! # let _ = summary;
//! ```
//!
//! ## Guarantees
//!
//! - **Optimality**: the script has the fewest token insertions plus deletions.
//! - **Determinism**: identical inputs produce byte-identical results.
//! - **Reconstruction**: `Equal + Delete` spans rebuild the original and
//!   `Equal + Insert` spans rebuild the revised document.
//! - **Normal form**: between two `Equal` spans there is at most one `Delete`
//!   followed by at most one `Insert`.

pub mod engine;
pub mod human_summary;
pub mod model;
pub mod tokenize;

pub use engine::{DiffEngine, EditSearch, SearchStatus};
pub use human_summary::render_human_summary;
pub use model::{Change, ChangeKind, ComparisonResult, ComparisonStats, DocumentPair, TextRange};
pub use tokenize::{TokenGranularity, TokenSeq, TokenizedPair};
