pub mod cli;
pub mod classifier;
pub mod config;
pub mod diff;
pub mod events;
pub mod filter;
pub mod notifier;
pub mod patrol;
pub mod source;
pub mod tracker;
pub mod watcher;

pub use classifier::CollapseClassifier;
pub use config::PatrolConfig;
pub use diff::{DiffEngine, DiffSegment, Operation};
pub use events::{BatchId, ChangeEvent, Detection};
pub use filter::ExclusionPolicy;
pub use notifier::{ChannelNotifier, LogNotifier, Notice, Notifier, TerminalNotifier};
pub use patrol::{Patrol, PatrolState};
pub use source::{ContentSource, FetchError, FsContentSource, MemorySource, SnapshotStore};
pub use tracker::{ChangeTracker, Verdict};
pub use watcher::FileWatcher;
