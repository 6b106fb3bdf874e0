use std::time::{Duration, Instant};
use similar::{Algorithm, DiffTag, TextDiff};

use super::cleanup::{self, Edit};
use super::segment::{DiffSegment, Operation};

/// Character-level diff engine with semantic cleanup.
///
/// Snapshots are decoded as strict UTF-8. The raw edit script comes from
/// `similar`, replacements are split into a deletion followed by an
/// insertion, and the result is run through the cleanup passes in
/// [`super::cleanup`] so segment boundaries are deterministic.
///
/// The default engine gives up on finding a minimal script after
/// [`DEFAULT_DIFF_TIMEOUT`]. Past the deadline `similar` falls back to a
/// coarser delete/insert script, which still reproduces both sides but may
/// put segment boundaries elsewhere than a full run would.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    algorithm: Algorithm,
    timeout: Option<Duration>,
}

pub const DEFAULT_DIFF_TIMEOUT: Duration = Duration::from_secs(1);

impl DiffEngine {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            timeout: Some(DEFAULT_DIFF_TIMEOUT),
        }
    }

    /// `None` lets the diff run to completion however long it takes
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Diff two byte snapshots. Undecodable input yields no segments.
    pub fn diff(&self, before: &[u8], after: &[u8]) -> Vec<DiffSegment> {
        let before = match std::str::from_utf8(before) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!("Skipping diff, previous content is not UTF-8: {}", err);
                return Vec::new();
            }
        };
        let after = match std::str::from_utf8(after) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!("Skipping diff, new content is not UTF-8: {}", err);
                return Vec::new();
            }
        };

        self.diff_text(before, after)
    }

    pub fn diff_text(&self, before: &str, after: &str) -> Vec<DiffSegment> {
        let mut config = TextDiff::configure();
        config.algorithm(self.algorithm);
        if let Some(deadline) = self.timeout.and_then(|timeout| Instant::now().checked_add(timeout)) {
            config.deadline(deadline);
        }
        let diff = config.diff_chars(before, after);

        let old = diff.old_slices();
        let new = diff.new_slices();
        let mut edits = Vec::with_capacity(diff.ops().len());

        for op in diff.ops() {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => edits.push(Edit::from_slices(Operation::Equal, &old[old_range])),
                DiffTag::Delete => edits.push(Edit::from_slices(Operation::Delete, &old[old_range])),
                DiffTag::Insert => edits.push(Edit::from_slices(Operation::Insert, &new[new_range])),
                DiffTag::Replace => {
                    edits.push(Edit::from_slices(Operation::Delete, &old[old_range]));
                    edits.push(Edit::from_slices(Operation::Insert, &new[new_range]));
                }
            }
        }

        cleanup::cleanup_merge(&mut edits);
        cleanup::cleanup_semantic(&mut edits);

        cleanup::compact(edits)
            .into_iter()
            .map(Edit::into_segment)
            .collect()
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(Algorithm::Myers)
    }
}
