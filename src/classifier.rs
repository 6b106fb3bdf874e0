//! Whitespace-collapse detection over adjacent diff segments.
//!
//! A pair of neighbouring segments is suspicious when the first deletes text
//! ending in whitespace and the second does not itself open with a run of
//! whitespace followed by content. That is what a merged line or a
//! swallowed separator looks like at the character level.
//!
//! "Whitespace" here is the ASCII set (space, tab, line feed, vertical tab,
//! form feed, carriage return). A non-breaking space or other Unicode
//! separator counts as content.

use regex::Regex;

use crate::diff::DiffSegment;

const TRAILING_WHITESPACE: &str = r"(?s)\A.*(?-u:\s)\z";
const LEADING_WHITESPACE: &str = r"(?s)\A(?-u:\s)+.+\z";

/// Counts whitespace-collapse signatures in a segment sequence
#[derive(Debug, Clone)]
pub struct CollapseClassifier {
    trailing_whitespace: Regex,
    leading_whitespace: Regex,
}

impl CollapseClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            trailing_whitespace: Regex::new(TRAILING_WHITESPACE)?,
            leading_whitespace: Regex::new(LEADING_WHITESPACE)?,
        })
    }

    /// Number of adjacent pairs matching the signature
    pub fn classify(&self, segments: &[DiffSegment]) -> usize {
        segments
            .windows(2)
            .filter(|pair| self.is_collapse(&pair[0], &pair[1]))
            .count()
    }

    /// Index of the first segment of every matching pair
    pub fn matching_pairs(&self, segments: &[DiffSegment]) -> Vec<usize> {
        segments
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| self.is_collapse(&pair[0], &pair[1]))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn is_collapse(&self, first: &DiffSegment, second: &DiffSegment) -> bool {
        first.is_delete()
            && self.trailing_whitespace.is_match(&first.text)
            && !self.leading_whitespace.is_match(&second.text)
    }
}
