//! Per-batch snapshot tracking and verdict aggregation.
//!
//! A batch is opened by a `BeforeBatch` event, which captures the current
//! content of every non-excluded path, and closed by the matching
//! `AfterBatch` event, which captures the new content and immediately runs
//! the diff engine and classifier over every complete pair. Closed batches
//! are dropped, so nothing carries over from one cycle to the next.
//!
//! Open batches are keyed by [`BatchId`] and entries inside a batch by
//! path, so a host that interleaves cycles is handled as well as one that
//! delivers them strictly in turn.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::classifier::CollapseClassifier;
use crate::diff::DiffEngine;
use crate::events::{BatchId, ChangeEvent, Detection};
use crate::filter::ExclusionPolicy;
use crate::source::ContentSource;

/// Before/after snapshots of one path within a batch
#[derive(Debug, Clone)]
pub struct TrackedChange {
    path: PathBuf,
    before: Vec<u8>,
    after: Option<Vec<u8>>,
}

impl TrackedChange {
    pub fn new(path: PathBuf, before: Vec<u8>) -> Self {
        Self {
            path,
            before,
            after: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn before(&self) -> &[u8] {
        &self.before
    }

    pub fn after(&self) -> Option<&[u8]> {
        self.after.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.after.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Collecting,
    Ready,
}

/// The tracked changes of one before/after cycle
#[derive(Debug)]
pub struct Batch {
    id: BatchId,
    state: BatchState,
    changes: BTreeMap<PathBuf, TrackedChange>,
    // Paths seen at before-time whose content could not be read
    dropped: BTreeSet<PathBuf>,
}

impl Batch {
    /// Open a batch, capturing the current content of each path
    pub fn collect(
        id: BatchId,
        paths: &[PathBuf],
        source: &dyn ContentSource,
        exclusion: &ExclusionPolicy,
    ) -> Self {
        let mut batch = Self {
            id,
            state: BatchState::Collecting,
            changes: BTreeMap::new(),
            dropped: BTreeSet::new(),
        };

        for path in paths {
            if exclusion.is_excluded(path) {
                tracing::trace!("Batch {}: {} is excluded", id, path.display());
                continue;
            }
            match source.fetch(path) {
                Ok(content) => {
                    batch
                        .changes
                        .insert(path.clone(), TrackedChange::new(path.clone(), content));
                }
                Err(err) => {
                    tracing::debug!("Batch {}: not tracking {}: {}", id, path.display(), err);
                    batch.dropped.insert(path.clone());
                }
            }
        }

        batch
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub(crate) fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, path: &Path) -> Option<&TrackedChange> {
        self.changes.get(path)
    }

    /// Capture the new content of each path and mark the batch ready
    pub fn record_after(
        &mut self,
        paths: &[PathBuf],
        source: &dyn ContentSource,
        exclusion: &ExclusionPolicy,
    ) {
        for path in paths {
            if exclusion.is_excluded(path) || self.dropped.contains(path) {
                continue;
            }

            debug_assert!(
                self.changes.contains_key(path),
                "after event for untracked path {} in batch {}",
                path.display(),
                self.id
            );
            let Some(change) = self.changes.get_mut(path) else {
                tracing::warn!(
                    "Batch {}: ignoring after event for untracked path {}",
                    self.id,
                    path.display()
                );
                continue;
            };

            match source.fetch(path) {
                Ok(content) => change.after = Some(content),
                Err(err) => {
                    tracing::warn!(
                        "Batch {}: dropping {} from evaluation: {}",
                        self.id,
                        path.display(),
                        err
                    );
                    self.changes.remove(path);
                    self.dropped.insert(path.clone());
                }
            }
        }
        self.state = BatchState::Ready;
    }

    /// Diff and classify every complete change, consuming the batch
    pub fn evaluate(self, engine: &DiffEngine, classifier: &CollapseClassifier) -> Verdict {
        let mut verdict = Verdict {
            batch: self.id,
            files_checked: 0,
            matches: 0,
        };

        for change in self.changes.into_values() {
            let Some(after) = change.after.as_deref() else {
                tracing::debug!(
                    "Batch {}: {} never received new content",
                    self.id,
                    change.path.display()
                );
                continue;
            };

            let segments = engine.diff(&change.before, after);
            let pairs = classifier.matching_pairs(&segments);
            verdict.files_checked += 1;
            verdict.matches += pairs.len();

            if pairs.is_empty() {
                tracing::debug!(
                    "Batch {}: {} clean ({} segments)",
                    self.id,
                    change.path.display(),
                    segments.len()
                );
            } else {
                tracing::debug!(
                    "Batch {}: {} collapse(s) in {} at segment pairs {:?}",
                    self.id,
                    pairs.len(),
                    change.path.display(),
                    pairs
                );
            }
        }

        verdict
    }
}

/// Aggregate outcome of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub batch: BatchId,
    pub files_checked: usize,
    pub matches: usize,
}

impl Verdict {
    pub fn detected(&self) -> bool {
        self.matches > 0
    }

    pub fn detection(&self) -> Option<Detection> {
        self.detected()
            .then(|| Detection::new(self.batch, self.matches, self.files_checked))
    }
}

/// Follows open batches from their before event to their after event
pub struct ChangeTracker {
    exclusion: ExclusionPolicy,
    engine: DiffEngine,
    classifier: CollapseClassifier,
    open: HashMap<BatchId, Batch>,
}

impl ChangeTracker {
    pub fn new(exclusion: ExclusionPolicy) -> Result<Self> {
        let classifier =
            CollapseClassifier::new().context("Failed to compile whitespace patterns")?;
        Ok(Self::with_parts(exclusion, DiffEngine::default(), classifier))
    }

    pub fn with_parts(
        exclusion: ExclusionPolicy,
        engine: DiffEngine,
        classifier: CollapseClassifier,
    ) -> Self {
        Self {
            exclusion,
            engine,
            classifier,
            open: HashMap::new(),
        }
    }

    pub fn exclusion(&self) -> &ExclusionPolicy {
        &self.exclusion
    }

    /// Dispatch a host event. Returns a verdict when a batch closes.
    pub fn handle(&mut self, event: &ChangeEvent, source: &dyn ContentSource) -> Option<Verdict> {
        match event {
            ChangeEvent::BeforeBatch { batch, paths } => {
                self.begin_batch(*batch, paths, source);
                None
            }
            ChangeEvent::AfterBatch { batch, paths } => self.complete_batch(*batch, paths, source),
        }
    }

    /// Open `batch` and return how many paths are being tracked
    pub fn begin_batch(
        &mut self,
        batch: BatchId,
        paths: &[PathBuf],
        source: &dyn ContentSource,
    ) -> usize {
        let collected = Batch::collect(batch, paths, source, &self.exclusion);
        let tracked = collected.len();
        tracing::debug!("Batch {}: tracking {} of {} path(s)", batch, tracked, paths.len());

        if self.open.insert(batch, collected).is_some() {
            tracing::warn!("Batch {} was reopened before it completed", batch);
        }
        tracked
    }

    /// Close `batch`, evaluate it and discard its state
    pub fn complete_batch(
        &mut self,
        batch: BatchId,
        paths: &[PathBuf],
        source: &dyn ContentSource,
    ) -> Option<Verdict> {
        let Some(mut collected) = self.open.remove(&batch) else {
            tracing::warn!("After event for unknown batch {}", batch);
            return None;
        };

        collected.record_after(paths, source, &self.exclusion);
        let verdict = collected.evaluate(&self.engine, &self.classifier);
        tracing::debug!(
            "Batch {}: {} match(es) across {} file(s)",
            batch,
            verdict.matches,
            verdict.files_checked
        );
        Some(verdict)
    }

    pub fn open_batches(&self) -> usize {
        self.open.len()
    }

    pub fn is_open(&self, batch: BatchId) -> bool {
        self.open.contains_key(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn tracker() -> ChangeTracker {
        ChangeTracker::new(ExclusionPolicy::new().with_prefix("/project/.idea")).unwrap()
    }

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_batch_lifecycle() {
        let before = MemorySource::new().with("/project/a.rs", "foo.bar ");
        let after = MemorySource::new().with("/project/a.rs", "foo.barbaz");
        let exclusion = ExclusionPolicy::new();
        let paths = paths(&["/project/a.rs"]);

        let mut batch = Batch::collect(BatchId(1), &paths, &before, &exclusion);
        assert_eq!(batch.state(), BatchState::Collecting);
        assert_eq!(batch.len(), 1);
        assert!(!batch.get(Path::new("/project/a.rs")).unwrap().is_complete());

        batch.record_after(&paths, &after, &exclusion);
        assert_eq!(batch.state(), BatchState::Ready);
        let change = batch.get(Path::new("/project/a.rs")).unwrap();
        assert_eq!(change.before(), b"foo.bar ");
        assert_eq!(change.after(), Some(&b"foo.barbaz"[..]));
    }

    #[test]
    fn test_detects_collapsed_whitespace() {
        let mut tracker = tracker();
        let paths = paths(&["/project/a.rs"]);

        tracker.begin_batch(BatchId(1), &paths, &MemorySource::new().with("/project/a.rs", "foo.bar "));
        assert!(tracker.is_open(BatchId(1)));

        let verdict = tracker
            .complete_batch(
                BatchId(1),
                &paths,
                &MemorySource::new().with("/project/a.rs", "foo.barbaz"),
            )
            .unwrap();

        assert!(verdict.detected());
        assert_eq!(verdict.files_checked, 1);
        assert!(verdict.detection().is_some());
        assert_eq!(tracker.open_batches(), 0);
    }

    #[test]
    fn test_excluded_paths_are_never_tracked() {
        let mut tracker = tracker();
        let paths = paths(&["/project/.idea/workspace.xml"]);
        let source = MemorySource::new().with("/project/.idea/workspace.xml", "a ");

        assert_eq!(tracker.begin_batch(BatchId(1), &paths, &source), 0);
        let verdict = tracker.complete_batch(BatchId(1), &paths, &source).unwrap();
        assert_eq!(verdict.files_checked, 0);
        assert!(!verdict.detected());
    }

    #[test]
    fn test_unreadable_before_content_drops_only_that_path() {
        let mut tracker = tracker();
        let paths = paths(&["/project/a.rs", "/project/gone.rs"]);
        let before = MemorySource::new().with("/project/a.rs", "a");
        let after = MemorySource::new()
            .with("/project/a.rs", "b")
            .with("/project/gone.rs", "x");

        assert_eq!(tracker.begin_batch(BatchId(1), &paths, &before), 1);
        let verdict = tracker.complete_batch(BatchId(1), &paths, &after).unwrap();
        assert_eq!(verdict.files_checked, 1);
    }

    #[test]
    fn test_unreadable_after_content_skips_evaluation() {
        let mut tracker = tracker();
        let paths = paths(&["/project/a.rs", "/project/b.rs"]);
        let before = MemorySource::new()
            .with("/project/a.rs", "foo.bar ")
            .with("/project/b.rs", "foo.bar ");
        let after = MemorySource::new().with("/project/b.rs", "foo.bar  baz");

        tracker.begin_batch(BatchId(1), &paths, &before);
        let verdict = tracker.complete_batch(BatchId(1), &paths, &after).unwrap();
        assert_eq!(verdict.files_checked, 1);
        assert_eq!(verdict.matches, 0);
    }

    #[test]
    fn test_reopened_batch_replaces_earlier_state() {
        let mut tracker = tracker();
        let paths = paths(&["/project/a.rs"]);

        tracker.begin_batch(BatchId(4), &paths, &MemorySource::new().with("/project/a.rs", "foo.bar "));
        tracker.begin_batch(BatchId(4), &paths, &MemorySource::new().with("/project/a.rs", "foo.bar"));
        assert_eq!(tracker.open_batches(), 1);

        let verdict = tracker
            .complete_batch(
                BatchId(4),
                &paths,
                &MemorySource::new().with("/project/a.rs", "foo.barbaz"),
            )
            .unwrap();

        // only the second "before" content is compared
        assert_eq!(verdict.files_checked, 1);
        assert!(!verdict.detected());
        assert!(!tracker.is_open(BatchId(4)));
    }

    #[test]
    fn test_unknown_batch_yields_no_verdict() {
        let mut tracker = tracker();
        let source = MemorySource::new();
        assert!(tracker.complete_batch(BatchId(9), &paths(&["/project/a.rs"]), &source).is_none());
    }

    #[test]
    fn test_paths_missing_from_after_event_are_not_evaluated() {
        let mut tracker = tracker();
        let before = MemorySource::new()
            .with("/project/a.rs", "foo.bar ")
            .with("/project/b.rs", "x");
        let after = MemorySource::new().with("/project/b.rs", "y");

        tracker.begin_batch(BatchId(1), &paths(&["/project/a.rs", "/project/b.rs"]), &before);
        let verdict = tracker
            .complete_batch(BatchId(1), &paths(&["/project/b.rs"]), &after)
            .unwrap();
        assert_eq!(verdict.files_checked, 1);
        assert!(!verdict.detected());
    }

    #[test]
    fn test_handle_dispatches_events() {
        let mut tracker = tracker();
        let before = ChangeEvent::BeforeBatch {
            batch: BatchId(4),
            paths: paths(&["/project/a.rs"]),
        };
        let after = ChangeEvent::AfterBatch {
            batch: BatchId(4),
            paths: paths(&["/project/a.rs"]),
        };

        assert!(tracker
            .handle(&before, &MemorySource::new().with("/project/a.rs", "x = 1;\n    "))
            .is_none());
        let verdict = tracker
            .handle(&after, &MemorySource::new().with("/project/a.rs", "x = 1;y = 2;"))
            .unwrap();
        assert_eq!(verdict.batch, BatchId(4));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "untracked path")]
    fn test_untracked_after_path_asserts_in_debug() {
        let mut tracker = tracker();
        let source = MemorySource::new().with("/project/a.rs", "a");

        tracker.begin_batch(BatchId(1), &[], &source);
        tracker.complete_batch(BatchId(1), &paths(&["/project/a.rs"]), &source);
    }
}
