//! Configuration module for Action Tracker.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `ACTION_TRACKER_LOG_FOLDER_PATH` | For tracking | - | Editor logs root (e.g., `~/.config/Code/logs`) |
//! | `ACTION_TRACKER_IGNORED_ACTIONS` | No | `vim,wordHighlight` | Comma-separated action id patterns to ignore |
//! | `ACTION_TRACKER_SHOW_INIT_MESSAGE` | No | `true` | Show setup hints on startup |
//! | `ACTION_TRACKER_CHANNEL_CAPACITY` | No | 1000 | Line channel capacity |
//!
//! A missing log folder is not a configuration error: tracking reports it
//! when it starts, so the rest of the tool keeps working without it.
//!
//! # Example
//!
//! ```no_run
//! use action_tracker::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Ignoring: {:?}", config.ignored_actions);
//! ```

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable holding the logs root.
pub const LOG_FOLDER_PATH_VAR: &str = "ACTION_TRACKER_LOG_FOLDER_PATH";

/// Environment variable holding the ignore patterns.
pub const IGNORED_ACTIONS_VAR: &str = "ACTION_TRACKER_IGNORED_ACTIONS";

/// Environment variable toggling the startup hints.
pub const SHOW_INIT_MESSAGE_VAR: &str = "ACTION_TRACKER_SHOW_INIT_MESSAGE";

/// Environment variable holding the line channel capacity.
pub const CHANNEL_CAPACITY_VAR: &str = "ACTION_TRACKER_CHANNEL_CAPACITY";

/// Action id patterns ignored when none are configured.
pub const DEFAULT_IGNORED_ACTIONS: [&str; 2] = ["vim", "wordHighlight"];

/// Default line channel capacity.
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Configuration for Action Tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root directory holding one log subdirectory per editor session.
    ///
    /// `None` when unset; tracking cannot start without it.
    pub log_folder_path: Option<PathBuf>,

    /// Case-insensitive substrings of action ids to suppress.
    pub ignored_actions: Vec<String>,

    /// Whether to show the setup hints on startup.
    pub show_init_message: bool,

    /// Capacity of the channel carrying lines from the tail to the classifier.
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_folder_path: None,
            ignored_actions: DEFAULT_IGNORED_ACTIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            show_init_message: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `ACTION_TRACKER_SHOW_INIT_MESSAGE` is set but is not a boolean
    /// - `ACTION_TRACKER_CHANNEL_CAPACITY` is set but is not a positive integer
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Optional: ACTION_TRACKER_LOG_FOLDER_PATH (empty counts as unset)
        let log_folder_path = env::var(LOG_FOLDER_PATH_VAR)
            .ok()
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .map(PathBuf::from);

        // Optional: ACTION_TRACKER_IGNORED_ACTIONS (default: vim,wordHighlight)
        let ignored_actions = match env::var(IGNORED_ACTIONS_VAR) {
            Ok(val) => parse_list(&val),
            Err(_) => defaults.ignored_actions,
        };

        // Optional: ACTION_TRACKER_SHOW_INIT_MESSAGE (default: true)
        let show_init_message = match env::var(SHOW_INIT_MESSAGE_VAR) {
            Ok(val) => parse_bool(&val).ok_or_else(|| ConfigError::InvalidValue {
                key: SHOW_INIT_MESSAGE_VAR.to_string(),
                message: format!("expected true or false, got '{val}'"),
            })?,
            Err(_) => defaults.show_init_message,
        };

        // Optional: ACTION_TRACKER_CHANNEL_CAPACITY (default: 1000, must be > 0)
        let channel_capacity = match env::var(CHANNEL_CAPACITY_VAR) {
            Ok(val) => {
                let capacity = val
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: CHANNEL_CAPACITY_VAR.to_string(),
                        message: format!("expected positive integer, got '{val}'"),
                    })?;
                if capacity == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: CHANNEL_CAPACITY_VAR.to_string(),
                        message: "channel capacity must be greater than 0".to_string(),
                    });
                }
                capacity
            }
            Err(_) => defaults.channel_capacity,
        };

        Ok(Self {
            log_folder_path,
            ignored_actions,
            show_init_message,
            channel_capacity,
        })
    }

    /// Overrides the log folder, e.g. from a command-line flag.
    #[must_use]
    pub fn with_log_folder_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.log_folder_path = Some(path);
        }
        self
    }

    /// Replaces the ignore list when `patterns` is non-empty.
    #[must_use]
    pub fn with_ignored_actions(mut self, patterns: Vec<String>) -> Self {
        if !patterns.is_empty() {
            self.ignored_actions = patterns;
        }
        self
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
