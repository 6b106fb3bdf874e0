use std::fmt;
use std::path::PathBuf;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Identifies one before/after cycle from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl BatchId {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Change notifications delivered by a host event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Paths about to change; their current content is the "before" side
    BeforeBatch { batch: BatchId, paths: Vec<PathBuf> },
    /// The same paths after the edits landed
    AfterBatch { batch: BatchId, paths: Vec<PathBuf> },
}

impl ChangeEvent {
    pub fn batch(&self) -> BatchId {
        match self {
            Self::BeforeBatch { batch, .. } | Self::AfterBatch { batch, .. } => *batch,
        }
    }
}

/// Raised once per batch in which at least one collapse was found
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub batch: BatchId,
    pub matches: usize,
    pub files_checked: usize,
    pub timestamp: DateTime<Local>,
}

impl Detection {
    pub fn new(batch: BatchId, matches: usize, files_checked: usize) -> Self {
        Self {
            batch,
            matches,
            files_checked,
            timestamp: Local::now(),
        }
    }
}
