//! Human-readable summary renderer for comparison results.

use crate::diff::model::{ChangeKind, ComparisonResult};

/// Longest excerpt shown per change before it is elided
const EXCERPT_CHARS: usize = 60;

/// Render a plain-text summary of a [`ComparisonResult`].
///
/// Lists the totals followed by one line per insertion or deletion with its
/// original-document position. Equal spans are omitted. Informational only.
pub fn render_human_summary(result: &ComparisonResult) -> String {
    let mut out = String::new();
    let stats = &result.stats;

    out.push_str("## Comparison\n\n");

    if result.is_identical() {
        out.push_str("_Documents are identical._\n");
        return out;
    }

    out.push_str(&format!(
        "**Changes**: {}  \n**Inserted**: {} chars  \n**Deleted**: {} chars  \n**Unchanged**: {} chars\n\n",
        stats.change_count, stats.inserted_chars, stats.deleted_chars, stats.unchanged_chars
    ));

    out.push_str("### Edits\n\n");
    for change in &result.changes {
        let (sign, at) = match change.kind {
            ChangeKind::Equal => continue,
            ChangeKind::Insert => ('+', change.original_range.start),
            ChangeKind::Delete => ('-', change.original_range.start),
        };
        out.push_str(&format!("{} @{}: `{}`\n", sign, at, excerpt(&change.content)));
    }

    out
}

fn excerpt(content: &str) -> String {
    let escaped: String = content.escape_debug().collect();
    if escaped.chars().count() <= EXCERPT_CHARS {
        return escaped;
    }
    let head: String = escaped.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", head)
}
