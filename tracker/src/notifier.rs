//! Notification sink for user-facing messages.
//!
//! The tracker core decides what to tell the user and how severe it is; a
//! [`Notifier`] decides how to show it. The binary prints to stdout via
//! [`ConsoleNotifier`], while embedders can receive notifications over a
//! channel with [`ChannelNotifier`].

use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How prominently a message should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification stamped with the current time.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A sink for user-facing messages.
///
/// Implementations must not block for long: notifications are emitted from
/// the line dispatch task.
pub trait Notifier: Send + Sync {
    /// Shows `notification` to the user.
    fn notify(&self, notification: Notification);

    /// Shows an informational message.
    fn info(&self, message: &str) {
        self.notify(Notification::new(Severity::Info, message));
    }

    /// Shows a warning.
    fn warning(&self, message: &str) {
        self.notify(Notification::new(Severity::Warning, message));
    }

    /// Shows an error.
    fn error(&self, message: &str) {
        self.notify(Notification::new(Severity::Error, message));
    }
}

/// Output format for [`ConsoleNotifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `[severity] message`
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Prints notifications to stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier {
    format: OutputFormat,
}

impl ConsoleNotifier {
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Renders a notification as a single output line.
    fn render(&self, notification: &Notification) -> String {
        match self.format {
            OutputFormat::Text => {
                format!("[{}] {}", notification.severity, notification.message)
            }
            OutputFormat::Json => serde_json::to_string(notification).unwrap_or_else(|e| {
                format!(r#"{{"severity":"error","message":"unserializable notification: {e}"}}"#)
            }),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        debug!(
            severity = %notification.severity,
            message = %notification.message,
            "Notification"
        );

        let line = self.render(&notification);
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
            warn!(error = %e, "Failed to write notification");
        }
    }
}

/// Forwards notifications over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver for its notifications.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}
