use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use anyhow::{Result, Context};

use crate::config::PatrolConfig;
use crate::events::BatchId;
use crate::filter::{ExclusionPolicy, FileFilter};
use crate::notifier::Notifier;
use crate::source::{ContentSource, FsContentSource, MemorySource, SnapshotStore};
use crate::tracker::ChangeTracker;

/// Filesystem host: turns `notify` events into before/after batches and
/// feeds them through a fresh [`ChangeTracker`].
///
/// The "before" side of every batch comes from a snapshot cache seeded when
/// the watcher starts and refreshed after each batch. Dropping the watcher
/// stops the worker thread and releases all cached state.
pub struct FileWatcher {
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl FileWatcher {
    pub fn start<P: AsRef<Path>>(
        path: P,
        config: &PatrolConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let root = path
            .as_ref()
            .canonicalize()
            .with_context(|| format!("Failed to resolve watch path {}", path.as_ref().display()))?;

        let exclusion = ExclusionPolicy::for_root(&root, &config.detection.excluded_prefix);
        let tracker = ChangeTracker::new(exclusion)?;
        let filter = FileFilter::new(&root);
        let source = FsContentSource::new(config.watcher.max_file_bytes);

        let mut snapshots = SnapshotStore::new(config.watcher.snapshot_capacity());
        for file in filter.get_watchable_files() {
            if tracker.exclusion().is_excluded(&file) {
                continue;
            }
            if let Ok(content) = source.fetch(&file) {
                snapshots.update(file, content);
            }
        }
        tracing::debug!("Seeded {} snapshot(s) under {}", snapshots.len(), root.display());

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();

        // Create the notify watcher
        let mut watcher = notify::recommended_watcher(tx)
            .context("Failed to create file system watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .context("Failed to start watching directory")?;

        let stop = Arc::new(AtomicBool::new(false));
        let host = BatchHost {
            tracker,
            filter,
            source,
            snapshots,
            notifier,
            debounce: config.watcher.event_debounce_duration(),
            max_latency: config.watcher.max_batch_latency(),
            next_batch: BatchId(0),
        };

        let worker_stop = stop.clone();
        let worker = thread::Builder::new()
            .name("indent-patrol-watcher".to_string())
            .spawn(move || host.run(rx, worker_stop))
            .context("Failed to spawn watcher thread")?;

        tracing::info!("Watching {}", root.display());

        Ok(Self {
            watcher: Some(watcher),
            worker: Some(worker),
            stop,
        })
    }

    /// Stop watching and wait for the worker thread to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Dropping the notify watcher also closes the event channel
        drop(self.watcher.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Watcher thread panicked");
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct BatchHost {
    tracker: ChangeTracker,
    filter: FileFilter,
    source: FsContentSource,
    snapshots: SnapshotStore,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    max_latency: Duration,
    next_batch: BatchId,
}

impl BatchHost {
    /// A batch closes after `debounce` without events, or once its first
    /// path has waited `max_latency`, whichever comes first.
    fn run(mut self, rx: Receiver<notify::Result<Event>>, stop: Arc<AtomicBool>) {
        let mut pending = BTreeSet::new();
        let mut opened: Option<Instant> = None;

        while !stop.load(Ordering::SeqCst) {
            let wait = match opened {
                Some(at) => self.debounce.min(self.max_latency.saturating_sub(at.elapsed())),
                None => self.debounce,
            };

            match rx.recv_timeout(wait) {
                Ok(Ok(event)) => {
                    self.collect(event, &mut pending);
                    if opened.is_none() && !pending.is_empty() {
                        opened = Some(Instant::now());
                    }
                }
                Ok(Err(err)) => {
                    tracing::error!("File watcher error: {}", err);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.flush(&mut pending, &mut opened);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if opened.map_or(false, |at| at.elapsed() >= self.max_latency) {
                tracing::debug!("Closing batch after {:?} of continuous events", self.max_latency);
                self.flush(&mut pending, &mut opened);
            }
        }
    }

    fn flush(&mut self, pending: &mut BTreeSet<PathBuf>, opened: &mut Option<Instant>) {
        *opened = None;
        if !pending.is_empty() {
            let paths: Vec<PathBuf> = std::mem::take(pending).into_iter().collect();
            self.process(paths);
        }
    }

    fn collect(&self, event: Event, pending: &mut BTreeSet<PathBuf>) {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }

        for path in event.paths {
            if self.filter.should_watch(&path) && !path.is_dir() {
                pending.insert(path);
            }
        }
    }

    /// Run one before/after cycle over `paths`
    fn process(&mut self, paths: Vec<PathBuf>) {
        let batch = self.next_batch;
        self.next_batch = batch.next();

        let exclusion = self.tracker.exclusion();
        let fresh = MemorySource::capture(
            &self.source,
            paths.iter().filter(|path| !exclusion.is_excluded(path)),
        );

        // Vanished files have no "after" side; leave them out of the after batch
        let readable: Vec<PathBuf> = paths
            .iter()
            .filter(|path| fresh.contains(path))
            .cloned()
            .collect();

        self.tracker.begin_batch(batch, &paths, &self.snapshots);
        if let Some(verdict) = self.tracker.complete_batch(batch, &readable, &fresh) {
            if let Some(detection) = verdict.detection() {
                self.notifier.detected(&detection);
            }
        }

        let mut fresh = fresh.into_inner();
        for path in paths {
            match fresh.remove(&path) {
                Some(content) => self.snapshots.update(path, content),
                None => {
                    self.snapshots.remove(&path);
                }
            }
        }
    }
}
