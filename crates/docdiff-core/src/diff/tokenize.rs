//! Text segmentation and token interning.
//!
//! Both documents are segmented with the same granularity and interned into
//! one shared table, so equal tokens on either side get the same `u32` id and
//! the search never compares strings.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::DiffLimits;
use crate::diff::model::{DocumentPair, TextRange};

/// How raw text is cut into tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenGranularity {
    /// Unicode word boundaries: words, whitespace runs and punctuation
    Word,
    /// Newline-inclusive lines
    Line,
}

impl TokenGranularity {
    /// Fine-grained tokens for small inputs, coarse ones for huge inputs
    pub fn for_total_chars(total_chars: usize, limits: &DiffLimits) -> Self {
        if total_chars <= limits.word_granularity_max_chars {
            TokenGranularity::Word
        } else {
            TokenGranularity::Line
        }
    }

    fn segments(self, text: &str) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            TokenGranularity::Word => Box::new(text.split_word_bounds()),
            TokenGranularity::Line => Box::new(text.split_inclusive('\n')),
        }
    }
}

/// Location of one token in its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub byte_start: usize,
    pub byte_end: usize,
    pub chars: TextRange,
}

/// Interned tokens of one document
#[derive(Debug, Clone, Default)]
pub struct TokenSeq {
    ids: Vec<u32>,
    spans: Vec<TokenSpan>,
}

impl TokenSeq {
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn span(&self, index: usize) -> Option<&TokenSpan> {
        self.spans.get(index)
    }

    /// Character offset where token `index` begins (or the end of the text)
    pub fn char_offset(&self, index: usize) -> usize {
        match self.spans.get(index) {
            Some(span) => span.chars.start,
            None => self.spans.last().map_or(0, |span| span.chars.end),
        }
    }

    /// Byte offset where token `index` begins (or the end of the text)
    pub fn byte_offset(&self, index: usize) -> usize {
        match self.spans.get(index) {
            Some(span) => span.byte_start,
            None => self.spans.last().map_or(0, |span| span.byte_end),
        }
    }

    fn build<'a>(
        text: &'a str,
        granularity: TokenGranularity,
        interner: &mut FxHashMap<&'a str, u32>,
    ) -> Self {
        let mut seq = TokenSeq::default();
        let mut byte_pos = 0;
        let mut char_pos = 0;

        for segment in granularity.segments(text) {
            let next_id = interner.len() as u32;
            let id = *interner.entry(segment).or_insert(next_id);
            let char_len = segment.chars().count();

            seq.ids.push(id);
            seq.spans.push(TokenSpan {
                byte_start: byte_pos,
                byte_end: byte_pos + segment.len(),
                chars: TextRange::new(char_pos, char_pos + char_len),
            });

            byte_pos += segment.len();
            char_pos += char_len;
        }
        seq
    }
}

/// Both documents, tokenized against a shared intern table
#[derive(Debug, Clone)]
pub struct TokenizedPair {
    pub pair: DocumentPair,
    pub granularity: TokenGranularity,
    pub original: TokenSeq,
    pub revised: TokenSeq,
}

impl TokenizedPair {
    pub fn new(pair: &DocumentPair, granularity: TokenGranularity) -> Self {
        let mut interner: FxHashMap<&str, u32> = FxHashMap::default();
        let original = TokenSeq::build(pair.original(), granularity, &mut interner);
        let revised = TokenSeq::build(pair.revised(), granularity, &mut interner);

        Self {
            pair: pair.clone(),
            granularity,
            original,
            revised,
        }
    }

    pub fn token_count(&self) -> usize {
        self.original.len() + self.revised.len()
    }
}
