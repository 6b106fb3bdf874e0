//! Runtime on/off switch for the whole pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;

use crate::config::PatrolConfig;
use crate::notifier::Notifier;
use crate::watcher::FileWatcher;

/// Either nothing is running, or a watcher owns the live subscription
pub enum PatrolState {
    Disabled,
    Enabled(FileWatcher),
}

/// Owns the patrol state; `enable` and `disable` are its only transitions.
/// Every activation builds a fresh watcher, tracker and snapshot cache.
pub struct Patrol {
    root: PathBuf,
    config: PatrolConfig,
    notifier: Arc<dyn Notifier>,
    state: PatrolState,
}

impl Patrol {
    pub fn new<P: AsRef<Path>>(root: P, config: PatrolConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
            notifier,
            state: PatrolState::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, PatrolState::Enabled(_))
    }

    pub fn state(&self) -> &PatrolState {
        &self.state
    }

    pub fn enable(&mut self) -> Result<()> {
        if self.is_enabled() {
            return Ok(());
        }

        let watcher = FileWatcher::start(&self.root, &self.config, self.notifier.clone())?;
        self.state = PatrolState::Enabled(watcher);
        self.notifier.status_changed(true);
        Ok(())
    }

    pub fn disable(&mut self) {
        if let PatrolState::Enabled(watcher) = std::mem::replace(&mut self.state, PatrolState::Disabled) {
            watcher.stop();
            self.notifier.status_changed(false);
        }
    }

    /// Flip the state, returning whether the patrol is now enabled
    pub fn toggle(&mut self) -> Result<bool> {
        if self.is_enabled() {
            self.disable();
        } else {
            self.enable()?;
        }
        Ok(self.is_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{ChannelNotifier, Notice};
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn test_toggle_transitions() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut patrol = Patrol::new(
            temp_dir.path(),
            PatrolConfig::default(),
            Arc::new(ChannelNotifier::new(tx)),
        );
        assert!(!patrol.is_enabled());

        assert!(patrol.toggle().unwrap());
        assert!(matches!(patrol.state(), PatrolState::Enabled(_)));
        patrol.enable().unwrap();

        assert!(!patrol.toggle().unwrap());
        patrol.disable();
        assert!(matches!(patrol.state(), PatrolState::Disabled));

        // Repeated enable/disable only reports real transitions
        let notices: Vec<Notice> = rx.try_iter().collect();
        assert_eq!(notices.len(), 2);
        assert!(matches!(notices[0], Notice::StatusChanged(true)));
        assert!(matches!(notices[1], Notice::StatusChanged(false)));
    }

    #[test]
    fn test_enable_fails_for_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let mut patrol = Patrol::new(
            temp_dir.path().join("missing"),
            PatrolConfig::default(),
            Arc::new(crate::notifier::LogNotifier),
        );

        assert!(patrol.enable().is_err());
        assert!(!patrol.is_enabled());
    }
}
