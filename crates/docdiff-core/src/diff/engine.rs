//! Shortest edit script computation.
//!
//! The entry points are [`DiffEngine::diff`] for a one-shot comparison and
//! [`DiffEngine::search`] for a resumable [`EditSearch`] that a scheduler can
//! advance in bounded steps. Both run the same greedy forward Myers search,
//! so splitting the work into steps never changes the output.
//!
//! The search keeps one trace row per edit distance `d`. Row `d` holds the
//! furthest x reached on diagonals `k = -d, -d + 2, ..., d`, stored densely
//! (index `i` is diagonal `k = 2i - d`), so the whole trace costs
//! `(D + 1)(D + 2) / 2` cells. The row budget is checked before each row is
//! allocated and the search fails instead of growing past it.

use std::ops::Range;

use tokio_util::sync::CancellationToken;

use crate::config::DiffLimits;
use crate::diff::model::{Change, ChangeKind, ComparisonResult, DocumentPair, TextRange};
use crate::diff::tokenize::{TokenGranularity, TokenizedPair};
use crate::errors::DiffError;

/// Largest token count per side; positions are stored as `u32` and may run
/// past the grid by up to `d`
const MAX_SIDE_TOKENS: usize = (u32::MAX / 2) as usize;

/// Outcome of one bounded step of an [`EditSearch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// More work remains; `permille` is how far the furthest path reaches
    /// toward the end of both documents
    InProgress { permille: u16 },
    /// The shortest edit script has been found
    Done,
}

/// Myers diff engine configured with trace limits
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    limits: DiffLimits,
}

impl DiffEngine {
    pub fn new(limits: DiffLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &DiffLimits {
        &self.limits
    }

    /// Segment both documents with the granularity their size calls for
    pub fn tokenize(&self, pair: &DocumentPair) -> TokenizedPair {
        let granularity = TokenGranularity::for_total_chars(pair.combined_len(), &self.limits);
        TokenizedPair::new(pair, granularity)
    }

    /// Start a resumable search over tokenized input
    ///
    /// # Errors
    ///
    /// Returns `DiffError::Internal` if either side has more tokens than the
    /// trace can address.
    pub fn search(&self, tokens: TokenizedPair) -> Result<EditSearch, DiffError> {
        if tokens.original.len() > MAX_SIDE_TOKENS || tokens.revised.len() > MAX_SIDE_TOKENS {
            return Err(DiffError::Internal {
                message: format!(
                    "token count {} exceeds the addressable trace range",
                    tokens.token_count()
                ),
            });
        }
        let max_cells = self.limits.trace_ceiling(tokens.token_count());
        Ok(EditSearch::new(tokens, max_cells))
    }

    /// Compute the edit script for already tokenized input
    ///
    /// The cancellation token is checked every `direct_step_budget` units.
    ///
    /// # Errors
    ///
    /// - `Cancelled` when `cancel` fires between steps
    /// - `EditDistanceLimit` / `AllocationFailed` from the search
    pub fn diff_tokens(
        &self,
        tokens: TokenizedPair,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, DiffError> {
        let mut search = self.search(tokens)?;
        loop {
            if cancel.is_cancelled() {
                return Err(DiffError::Cancelled);
            }
            if search.step(self.limits.direct_step_budget)? == SearchStatus::Done {
                break;
            }
        }
        tracing::debug!(
            edit_distance = search.edit_distance().unwrap_or_default(),
            token_count = search.token_count(),
            "edit script found"
        );
        search.into_changes()
    }

    /// Tokenize and diff a document pair in one call
    ///
    /// # Errors
    ///
    /// See [`DiffEngine::diff_tokens`].
    pub fn diff(
        &self,
        pair: &DocumentPair,
        cancel: &CancellationToken,
    ) -> Result<ComparisonResult, DiffError> {
        let tokens = self.tokenize(pair);
        let changes = self.diff_tokens(tokens, cancel)?;
        Ok(ComparisonResult::from_changes(changes))
    }
}

/// Resumable forward search for the shortest edit script
#[derive(Debug)]
pub struct EditSearch {
    tokens: TokenizedPair,
    max_cells: usize,
    trace: Vec<Vec<u32>>,
    row: Vec<u32>,
    d: usize,
    cells_used: usize,
    furthest: usize,
    distance: Option<usize>,
}

impl EditSearch {
    fn new(tokens: TokenizedPair, max_cells: usize) -> Self {
        Self {
            tokens,
            max_cells,
            trace: Vec::new(),
            row: Vec::new(),
            d: 0,
            cells_used: 0,
            furthest: 0,
            distance: None,
        }
    }

    pub fn granularity(&self) -> TokenGranularity {
        self.tokens.granularity
    }

    pub fn token_count(&self) -> usize {
        self.tokens.token_count()
    }

    /// Edit distance in tokens, once the search is done
    pub fn edit_distance(&self) -> Option<usize> {
        self.distance
    }

    pub fn is_done(&self) -> bool {
        self.distance.is_some()
    }

    /// Trace cells allocated so far
    pub fn cells_used(&self) -> usize {
        self.cells_used
    }

    /// Progress in thousandths, monotonically non-decreasing
    pub fn permille(&self) -> u16 {
        if self.distance.is_some() {
            return 1000;
        }
        let total = self.tokens.token_count();
        if total == 0 {
            return 1000;
        }
        ((self.furthest.min(total) * 1000) / total) as u16
    }

    /// Advance the search by roughly `budget` work units
    ///
    /// A unit is one diagonal probe or one token matched along a snake.
    /// A single long snake may overrun the budget; it is never split.
    ///
    /// # Errors
    ///
    /// - `EditDistanceLimit` when the next trace row would pass the ceiling
    /// - `AllocationFailed` when the row cannot be reserved
    pub fn step(&mut self, budget: usize) -> Result<SearchStatus, DiffError> {
        let budget = budget.max(1);
        let mut spent = 0;
        while self.distance.is_none() {
            if spent >= budget {
                return Ok(SearchStatus::InProgress {
                    permille: self.permille(),
                });
            }
            if self.row.is_empty() {
                self.open_row()?;
            }
            spent += self.probe_diagonal();
        }
        Ok(SearchStatus::Done)
    }

    fn open_row(&mut self) -> Result<(), DiffError> {
        let cells = self.d + 1;
        if self.cells_used.saturating_add(cells) > self.max_cells {
            return Err(DiffError::EditDistanceLimit {
                edit_distance: self.d,
                max_cells: self.max_cells,
                token_count: self.tokens.token_count(),
            });
        }
        self.row
            .try_reserve_exact(cells)
            .map_err(|_| DiffError::AllocationFailed { cells })?;
        self.cells_used += cells;
        Ok(())
    }

    /// Extend the next diagonal of the current row; returns units spent
    fn probe_diagonal(&mut self) -> usize {
        let d = self.d;
        let i = self.row.len();
        let k = 2 * i as isize - d as isize;

        let mut x = match d {
            0 => 0,
            _ => {
                let prev = &self.trace[d - 1];
                if i == 0 || (i != d && prev[i - 1] < prev[i]) {
                    prev[i] as usize
                } else {
                    prev[i - 1] as usize + 1
                }
            }
        };
        // y never goes negative: it only grows along down moves and snakes
        let mut y = (x as isize - k).max(0) as usize;

        let a = self.tokens.original.ids();
        let b = self.tokens.revised.ids();
        let (n, m) = (a.len(), b.len());
        let snake_start = x;
        while x < n && y < m && a[x] == b[y] {
            x += 1;
            y += 1;
        }

        self.row.push(x as u32);
        self.furthest = self.furthest.max(x.min(n) + y.min(m));

        if x >= n && y >= m {
            self.distance = Some(d);
            self.trace.push(std::mem::take(&mut self.row));
        } else if self.row.len() == d + 1 {
            self.trace.push(std::mem::take(&mut self.row));
            self.d += 1;
        }

        1 + (x - snake_start)
    }

    /// Build the normalised change list from a finished search
    ///
    /// # Errors
    ///
    /// Returns `DiffError::Internal` if the search has not finished.
    pub fn into_changes(self) -> Result<Vec<Change>, DiffError> {
        let distance = self.distance.ok_or_else(|| DiffError::Internal {
            message: "edit search consumed before completion".to_string(),
        })?;
        let edits = self.backtrack(distance);
        Ok(self.render(&edits))
    }

    /// Shorthand for `into_changes` wrapped in a [`ComparisonResult`]
    ///
    /// # Errors
    ///
    /// See [`EditSearch::into_changes`].
    pub fn into_result(self) -> Result<ComparisonResult, DiffError> {
        Ok(ComparisonResult::from_changes(self.into_changes()?))
    }

    fn backtrack(&self, distance: usize) -> Vec<Edit> {
        let mut x = self.tokens.original.len();
        let mut y = self.tokens.revised.len();
        let mut edits = Vec::with_capacity(distance * 2 + 1);

        for d in (1..=distance).rev() {
            let prev = &self.trace[d - 1];
            let k = x as isize - y as isize;
            let i = ((k + d as isize) / 2) as usize;
            let down = i == 0 || (i != d && prev[i - 1] < prev[i]);

            let (prev_x, prev_k) = if down {
                (prev[i] as usize, k + 1)
            } else {
                (prev[i - 1] as usize, k - 1)
            };
            let prev_y = (prev_x as isize - prev_k) as usize;
            let (snake_x, snake_y) = if down {
                (prev_x, prev_y + 1)
            } else {
                (prev_x + 1, prev_y)
            };

            if x > snake_x {
                edits.push(Edit::Keep {
                    x: snake_x,
                    y: snake_y,
                    len: x - snake_x,
                });
            }
            edits.push(if down { Edit::Insert } else { Edit::Delete });
            x = prev_x;
            y = prev_y;
        }
        if x > 0 {
            edits.push(Edit::Keep { x: 0, y: 0, len: x });
        }
        debug_assert_eq!(x, y);

        edits.reverse();
        edits
    }

    fn render(&self, edits: &[Edit]) -> Vec<Change> {
        let mut changes = Vec::new();
        let (mut x, mut y) = (0, 0);
        let mut gap_start: Option<(usize, usize)> = None;

        for edit in edits {
            match *edit {
                Edit::Keep {
                    x: keep_x,
                    y: keep_y,
                    len,
                } => {
                    if let Some((gx, gy)) = gap_start.take() {
                        self.push_gap(gx..x, gy..y, &mut changes);
                    }
                    changes.push(self.change(
                        ChangeKind::Equal,
                        keep_x..keep_x + len,
                        keep_y..keep_y + len,
                    ));
                    x = keep_x + len;
                    y = keep_y + len;
                }
                Edit::Delete => {
                    gap_start.get_or_insert((x, y));
                    x += 1;
                }
                Edit::Insert => {
                    gap_start.get_or_insert((x, y));
                    y += 1;
                }
            }
        }
        if let Some((gx, gy)) = gap_start {
            self.push_gap(gx..x, gy..y, &mut changes);
        }
        changes
    }

    fn push_gap(&self, deleted: Range<usize>, inserted: Range<usize>, out: &mut Vec<Change>) {
        if !deleted.is_empty() {
            out.push(self.change(
                ChangeKind::Delete,
                deleted.clone(),
                inserted.start..inserted.start,
            ));
        }
        if !inserted.is_empty() {
            out.push(self.change(ChangeKind::Insert, deleted.end..deleted.end, inserted));
        }
    }

    fn change(&self, kind: ChangeKind, a: Range<usize>, b: Range<usize>) -> Change {
        let original = &self.tokens.original;
        let revised = &self.tokens.revised;

        let content = match kind {
            ChangeKind::Insert => {
                &self.tokens.pair.revised()[revised.byte_offset(b.start)..revised.byte_offset(b.end)]
            }
            ChangeKind::Equal | ChangeKind::Delete => {
                &self.tokens.pair.original()
                    [original.byte_offset(a.start)..original.byte_offset(a.end)]
            }
        };

        Change {
            kind,
            original_range: TextRange::new(original.char_offset(a.start), original.char_offset(a.end)),
            revised_range: TextRange::new(revised.char_offset(b.start), revised.char_offset(b.end)),
            content: content.to_string(),
        }
    }
}

/// One step of the raw edit path, in token coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep { x: usize, y: usize, len: usize },
    Delete,
    Insert,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(original: &str, revised: &str) -> ComparisonResult {
        DiffEngine::default()
            .diff(
                &DocumentPair::new(original, revised),
                &CancellationToken::new(),
            )
            .unwrap()
    }

    fn kinds(result: &ComparisonResult) -> Vec<(ChangeKind, &str)> {
        result
            .changes
            .iter()
            .map(|c| (c.kind, c.content.as_str()))
            .collect()
    }

    #[test]
    fn test_both_empty_yields_no_changes() {
        let result = diff("", "");
        assert!(result.changes.is_empty());
        assert_eq!(result.stats.change_count, 0);
    }

    #[test]
    fn test_replacement_is_delete_then_insert() {
        let result = diff("one two three", "one 2 three");
        assert_eq!(
            kinds(&result),
            vec![
                (ChangeKind::Equal, "one "),
                (ChangeKind::Delete, "two"),
                (ChangeKind::Insert, "2"),
                (ChangeKind::Equal, " three"),
            ]
        );
    }

    #[test]
    fn test_insert_range_is_anchored_in_original() {
        let result = diff("ab cd", "ab xy cd");
        let insert = result
            .changes
            .iter()
            .find(|c| c.kind == ChangeKind::Insert)
            .unwrap();
        assert!(insert.original_range.is_empty());
        assert_eq!(insert.original_range.start, 3);
        assert_eq!(insert.revised_range, TextRange::new(3, 6));
    }

    #[test]
    fn test_step_reports_progress_until_done() {
        let engine = DiffEngine::default();
        let pair = DocumentPair::new("a b c d e f g", "a x c y e z g");
        let mut search = engine.search(engine.tokenize(&pair)).unwrap();

        let mut last = 0;
        loop {
            match search.step(1).unwrap() {
                SearchStatus::InProgress { permille } => {
                    assert!(permille >= last);
                    last = permille;
                }
                SearchStatus::Done => break,
            }
        }
        assert_eq!(search.permille(), 1000);
        assert_eq!(search.edit_distance(), Some(6));
    }

    #[test]
    fn test_ceiling_fails_with_edit_distance_limit() {
        let engine = DiffEngine::new(DiffLimits {
            trace_cells_per_token: 1,
            min_trace_cells: 4,
            max_trace_cells: 4,
            ..DiffLimits::default()
        });
        let pair = DocumentPair::new("a b c d", "w x y z");
        let err = engine.diff(&pair, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, DiffError::EditDistanceLimit { .. }));
    }

    #[test]
    fn test_pre_cancelled_token_stops_before_work() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = DiffEngine::default()
            .diff(&DocumentPair::new("a", "b"), &cancel)
            .unwrap_err();
        assert_eq!(err, DiffError::Cancelled);
    }

    #[test]
    fn test_into_changes_before_done_is_internal_error() {
        let engine = DiffEngine::default();
        let search = engine
            .search(engine.tokenize(&DocumentPair::new("a", "b")))
            .unwrap();
        assert!(matches!(
            search.into_changes(),
            Err(DiffError::Internal { .. })
        ));
    }
}
