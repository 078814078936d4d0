//! Comparison input and output types.
//!
//! Output types implement `Debug, Clone, Serialize, Deserialize, PartialEq`
//! so results can be compared byte-for-byte across runs and handed to a
//! renderer as JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The two documents being compared.
///
/// Text is shared behind `Arc<str>` so a pair can be handed to a run, a
/// retry handle and a debounce timer without copying megabytes of input.
/// Character counts are computed once at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentPair {
    original: Arc<str>,
    revised: Arc<str>,
    original_chars: usize,
    revised_chars: usize,
}

impl DocumentPair {
    pub fn new(original: impl Into<Arc<str>>, revised: impl Into<Arc<str>>) -> Self {
        let original = original.into();
        let revised = revised.into();
        let original_chars = original.chars().count();
        let revised_chars = revised.chars().count();
        Self {
            original,
            revised,
            original_chars,
            revised_chars,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn revised(&self) -> &str {
        &self.revised
    }

    /// Shared handle to the original text
    pub fn original_shared(&self) -> Arc<str> {
        Arc::clone(&self.original)
    }

    /// Shared handle to the revised text
    pub fn revised_shared(&self) -> Arc<str> {
        Arc::clone(&self.revised)
    }

    /// Length of the original in characters
    pub fn original_len(&self) -> usize {
        self.original_chars
    }

    /// Length of the revised document in characters
    pub fn revised_len(&self) -> usize {
        self.revised_chars
    }

    pub fn combined_len(&self) -> usize {
        self.original_chars + self.revised_chars
    }

    pub fn shorter_len(&self) -> usize {
        self.original_chars.min(self.revised_chars)
    }

    /// True when either side is empty or whitespace only
    pub fn has_blank_side(&self) -> bool {
        self.original.trim().is_empty() || self.revised.trim().is_empty()
    }
}

impl std::fmt::Debug for DocumentPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPair")
            .field("original_len", &self.original_chars)
            .field("revised_len", &self.revised_chars)
            .finish()
    }
}

/// Role of a span in the edit script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present in both documents
    Equal,
    /// Present only in the revised document
    Insert,
    /// Present only in the original document
    Delete,
}

/// Half-open character range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn empty_at(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One span of the edit script.
///
/// `Insert` spans have an empty `original_range` positioned where the text
/// goes; `Delete` spans have an empty `revised_range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub original_range: TextRange,
    pub revised_range: TextRange,
    pub content: String,
}

/// Character-level totals over an edit script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub inserted_chars: usize,
    pub deleted_chars: usize,
    pub unchanged_chars: usize,
    /// Number of `Insert` plus `Delete` entries (not characters)
    pub change_count: usize,
}

impl ComparisonStats {
    pub fn from_changes(changes: &[Change]) -> Self {
        changes.iter().fold(Self::default(), |mut stats, change| {
            let chars = match change.kind {
                ChangeKind::Equal => change.original_range.len(),
                ChangeKind::Delete => change.original_range.len(),
                ChangeKind::Insert => change.revised_range.len(),
            };
            match change.kind {
                ChangeKind::Equal => stats.unchanged_chars += chars,
                ChangeKind::Insert => {
                    stats.inserted_chars += chars;
                    stats.change_count += 1;
                }
                ChangeKind::Delete => {
                    stats.deleted_chars += chars;
                    stats.change_count += 1;
                }
            }
            stats
        })
    }
}

/// The complete, ordered outcome of one successful comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub changes: Vec<Change>,
    pub stats: ComparisonStats,
}

impl ComparisonResult {
    pub fn from_changes(changes: Vec<Change>) -> Self {
        let stats = ComparisonStats::from_changes(&changes);
        Self { changes, stats }
    }

    /// Concatenate `Equal` and `Delete` spans, which yields the original text
    pub fn reconstruct_original(&self) -> String {
        self.concat_where(|kind| kind != ChangeKind::Insert)
    }

    /// Concatenate `Equal` and `Insert` spans, which yields the revised text
    pub fn reconstruct_revised(&self) -> String {
        self.concat_where(|kind| kind != ChangeKind::Delete)
    }

    pub fn is_identical(&self) -> bool {
        self.stats.change_count == 0
    }

    fn concat_where(&self, keep: impl Fn(ChangeKind) -> bool) -> String {
        self.changes
            .iter()
            .filter(|c| keep(c.kind))
            .map(|c| c.content.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(kind: ChangeKind, o: (usize, usize), r: (usize, usize), content: &str) -> Change {
        Change {
            kind,
            original_range: TextRange::new(o.0, o.1),
            revised_range: TextRange::new(r.0, r.1),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_stats_count_entries_not_chars() {
        let result = ComparisonResult::from_changes(vec![
            change(ChangeKind::Equal, (0, 3), (0, 3), "abc"),
            change(ChangeKind::Delete, (3, 5), (3, 3), "de"),
            change(ChangeKind::Insert, (5, 5), (3, 7), "wxyz"),
        ]);

        assert_eq!(result.stats.change_count, 2);
        assert_eq!(result.stats.deleted_chars, 2);
        assert_eq!(result.stats.inserted_chars, 4);
        assert_eq!(result.stats.unchanged_chars, 3);
        assert_eq!(result.reconstruct_original(), "abcde");
        assert_eq!(result.reconstruct_revised(), "abcwxyz");
    }

    #[test]
    fn test_pair_counts_chars_not_bytes() {
        let pair = DocumentPair::new("héllo", "日本");
        assert_eq!(pair.original_len(), 5);
        assert_eq!(pair.revised_len(), 2);
        assert_eq!(pair.combined_len(), 7);
        assert_eq!(pair.shorter_len(), 2);
    }

    #[test]
    fn test_blank_side_detection() {
        assert!(DocumentPair::new("  \n", "text").has_blank_side());
        assert!(DocumentPair::new("text", "").has_blank_side());
        assert!(!DocumentPair::new("a", "b").has_blank_side());
    }

    #[test]
    fn test_debug_omits_content() {
        let pair = DocumentPair::new("secret text", "other");
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("original_len"));
    }

    #[test]
    fn test_change_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ChangeKind::Insert).unwrap();
        assert_eq!(json, "\"insert\"");
    }
}
