use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::config::PatrolConfig;

#[derive(Parser)]
#[command(name = "indent-patrol")]
#[command(version)]
#[command(about = "Watches files and warns when an edit collapses whitespace between tokens")]
#[command(long_about = "indent-patrol snapshots files as they change and diffs every edit against the previous content. When a deletion eats trailing whitespace and the following text butts straight up against what remains, it raises an alert. Type 't' + Enter to toggle the patrol, 'q' + Enter to quit.")]
pub struct Cli {
    /// Directory to watch for changes
    #[arg(value_name = "PATH", help = "Path to watch (defaults to current directory)")]
    pub path: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Excluded path prefix
    #[arg(long, value_name = "PREFIX", help = "Path prefix never checked (relative to PATH unless absolute)")]
    pub exclude: Option<String>,

    /// Batch debounce
    #[arg(long, value_name = "MS", help = "Quiet period in ms that closes a batch of edits")]
    pub debounce_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    /// Start with the patrol switched off
    #[arg(long, help = "Start disabled; toggle on with 't'")]
    pub start_disabled: bool,

    /// Output format
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output (default)
    Text,
    /// JSON output for scripting
    Json,
    /// Compact single-line format
    Compact,
}

impl Cli {
    pub fn get_watch_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Apply command line overrides on top of file and environment config
    pub fn apply_overrides(&self, mut config: PatrolConfig) -> PatrolConfig {
        if let Some(prefix) = &self.exclude {
            config.detection.excluded_prefix = prefix.clone();
        }
        if let Some(ms) = self.debounce_ms {
            config.watcher.event_debounce_ms = ms;
        }
        config
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        let path = self.get_watch_path();

        if !path.exists() {
            return Err(format!("Path does not exist: {}", path.display()));
        }

        if !path.is_dir() {
            return Err(format!("Path is not a directory: {}", path.display()));
        }

        if let Some(config) = &self.config {
            if !config.is_file() {
                return Err(format!("Config file not found: {}", config.display()));
            }
        }

        if self.debounce_ms == Some(0) {
            return Err("Debounce must be greater than 0".to_string());
        }

        Ok(())
    }
}
