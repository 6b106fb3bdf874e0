//! Configuration management for indent-patrol
//!
//! Defaults can be overridden by a TOML file, then by environment
//! variables, then by command line flags.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    /// File watcher configuration
    pub watcher: WatcherConfig,
    /// Detection configuration
    pub detection: DetectionConfig,
}

/// Configuration for file watching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period that closes a batch of file events, in milliseconds
    pub event_debounce_ms: u64,
    /// A batch is closed this long after its first event even if the tree
    /// never goes quiet, in milliseconds
    pub max_batch_latency_ms: u64,
    /// Maximum number of file snapshots kept as "before" content
    pub snapshot_cache_size: usize,
    /// Files larger than this are not snapshotted
    pub max_file_bytes: u64,
}

/// Configuration for collapse detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Paths under this prefix are never tracked. Relative to the watch root
    /// unless absolute; empty disables exclusion.
    pub excluded_prefix: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            event_debounce_ms: 100,
            max_batch_latency_ms: 1000,
            snapshot_cache_size: 1000,
            max_file_bytes: 1024 * 1024,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            excluded_prefix: ".idea".to_string(),
        }
    }
}

impl WatcherConfig {
    /// Get event debounce duration
    pub fn event_debounce_duration(&self) -> Duration {
        Duration::from_millis(self.event_debounce_ms)
    }

    /// Maximum batch age, never shorter than the debounce period
    pub fn max_batch_latency(&self) -> Duration {
        Duration::from_millis(self.max_batch_latency_ms.max(self.event_debounce_ms))
    }

    /// Snapshot cache capacity, clamped to at least one entry
    pub fn snapshot_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.snapshot_cache_size).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Configuration loading and management
impl PatrolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load from `path` if given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Override values from environment variables if present
    pub fn apply_env(mut self) -> Self {
        if let Ok(val) = std::env::var("INDENT_PATROL_DEBOUNCE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.watcher.event_debounce_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("INDENT_PATROL_MAX_BATCH_LATENCY_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.watcher.max_batch_latency_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("INDENT_PATROL_CACHE_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                self.watcher.snapshot_cache_size = size;
            }
        }

        if let Ok(val) = std::env::var("INDENT_PATROL_EXCLUDED_PREFIX") {
            self.detection.excluded_prefix = val;
        }

        self
    }

    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.watcher.event_debounce_ms == 0 {
            return Err("event_debounce_ms must be greater than 0".to_string());
        }

        if self.watcher.snapshot_cache_size == 0 {
            return Err("snapshot_cache_size must be greater than 0".to_string());
        }

        if self.watcher.max_file_bytes == 0 {
            return Err("max_file_bytes must be greater than 0".to_string());
        }

        Ok(())
    }
}
