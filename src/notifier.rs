//! Delivery of detection signals to the user.

use std::io::Write;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use crossterm::style::Stylize;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::events::Detection;

/// Receives the outcome of the change pipeline
pub trait Notifier: Send + Sync {
    /// At least one collapse was found in a batch
    fn detected(&self, detection: &Detection);

    /// The patrol was switched on or off
    fn status_changed(&self, _enabled: bool) {}
}

/// Reports through `tracing`
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn detected(&self, detection: &Detection) {
        tracing::warn!(
            "Whitespace collapse detected in batch {} ({} match(es) across {} file(s))",
            detection.batch,
            detection.matches,
            detection.files_checked
        );
    }

    fn status_changed(&self, enabled: bool) {
        tracing::info!("Indent patrol {}", if enabled { "enabled" } else { "disabled" });
    }
}

/// Messages forwarded by [`ChannelNotifier`]
#[derive(Debug, Clone)]
pub enum Notice {
    Detected(Detection),
    StatusChanged(bool),
}

/// Forwards notices over a channel, for embedding in another event loop
pub struct ChannelNotifier {
    sender: Mutex<Sender<Notice>>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<Notice>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }

    fn send(&self, notice: Notice) {
        match self.sender.lock() {
            Ok(sender) => {
                if sender.send(notice).is_err() {
                    tracing::debug!("Notice receiver dropped");
                }
            }
            Err(_) => tracing::error!("Notice channel lock poisoned"),
        }
    }
}

impl Notifier for ChannelNotifier {
    fn detected(&self, detection: &Detection) {
        self.send(Notice::Detected(detection.clone()));
    }

    fn status_changed(&self, enabled: bool) {
        self.send(Notice::StatusChanged(enabled));
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonNotice<'a> {
    Detected(&'a Detection),
    Status { enabled: bool },
}

/// Prints notices to stdout in the selected output format
pub struct TerminalNotifier {
    format: OutputFormat,
    no_color: bool,
}

impl TerminalNotifier {
    pub fn new(format: OutputFormat, no_color: bool) -> Self {
        Self { format, no_color }
    }

    pub fn render_detection(&self, detection: &Detection) -> String {
        match self.format {
            OutputFormat::Json => to_json(&JsonNotice::Detected(detection)),
            OutputFormat::Compact => format!("! {} {}", detection.batch, detection.matches),
            OutputFormat::Text => {
                let time_str = detection.timestamp.format("%H:%M:%S");
                let label = "COLLAPSED";
                let label = if self.no_color {
                    label.to_string()
                } else {
                    label.red().bold().to_string()
                };
                format!(
                    "[{}] {} whitespace collapse detected ({} match(es) across {} file(s), batch {})",
                    time_str, label, detection.matches, detection.files_checked, detection.batch
                )
            }
        }
    }

    pub fn render_status(&self, enabled: bool) -> String {
        let state = if enabled { "enabled" } else { "disabled" };
        match self.format {
            OutputFormat::Json => to_json(&JsonNotice::Status { enabled }),
            OutputFormat::Compact => format!("{} {}", if enabled { "+" } else { "-" }, state),
            OutputFormat::Text if self.no_color => format!("Indent patrol {}", state),
            OutputFormat::Text => {
                let state = if enabled { state.green() } else { state.yellow() };
                format!("Indent patrol {}", state)
            }
        }
    }

    fn emit(&self, line: &str, bell: bool) {
        let mut stdout = std::io::stdout().lock();
        let bell = if bell { "\x07" } else { "" };
        if let Err(err) = writeln!(stdout, "{}{}", line, bell).and_then(|_| stdout.flush()) {
            tracing::error!("Failed to write notice: {}", err);
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| {
        tracing::error!("Failed to serialize notice: {}", err);
        String::from("{}")
    })
}

impl Notifier for TerminalNotifier {
    fn detected(&self, detection: &Detection) {
        let bell = matches!(self.format, OutputFormat::Text);
        self.emit(&self.render_detection(detection), bell);
    }

    fn status_changed(&self, enabled: bool) {
        self.emit(&self.render_status(enabled), false);
    }
}
