//! Action Tracker - editor telemetry log watcher.
//!
//! This crate follows the editor's telemetry log and reports every command
//! the user executes as a short notification, e.g. `Executed
//! workbench.action.files.save`.
//!
//! # Overview
//!
//! The editor writes a fresh log folder per session under a logs root. The
//! tracker picks the most recently created folder, tails its
//! `telemetry.log` from the end, and classifies each new line. Lines that
//! record an action at `trace` level are turned into notifications unless the
//! action id matches the ignore list.
//!
//! # Modules
//!
//! - [`classifier`]: Recognizes action lines and extracts their ids
//! - [`locator`]: Finds the active log file under the logs root
//! - [`tail`]: Follows a log file and emits appended lines
//! - [`controller`]: Tracking lifecycle (start, stop, teardown)
//! - [`notifier`]: User-facing notification sinks
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for tracker operations

pub mod classifier;
pub mod config;
pub mod controller;
pub mod error;
pub mod locator;
pub mod notifier;
pub mod tail;

pub use classifier::{classify, ActionCategory, ActionClassification};
pub use config::{Config, ConfigError};
pub use controller::{TailController, TrackerState};
pub use error::{Result, TrackerError};
pub use locator::{locate, DiscoveryError, LogDirectoryEntry};
pub use notifier::{ChannelNotifier, ConsoleNotifier, Notification, Notifier, OutputFormat, Severity};
pub use tail::{LogTail, TailError, TailEvent};
