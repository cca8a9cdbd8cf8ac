//! Error types for Action Tracker.
//!
//! This module defines the crate-wide error type, wrapping the per-module
//! errors and rendering the user-facing diagnostics shown when tracking
//! cannot start.

use thiserror::Error;

use crate::config::ConfigError;
use crate::locator::DiscoveryError;
use crate::tail::TailError;

/// Errors that can occur during tracker operations.
///
/// [`TrackerError::Config`] is reported by the host before a controller
/// exists. Every other variant leaves the controller in the failed state until
/// the user fixes the configuration and starts again.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The log folder setting is not set.
    #[error("log folder path is not configured")]
    ConfigurationMissing,

    /// The log folder could not be searched for a session directory.
    #[error("log discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The active log file could not be opened for tailing.
    #[error("failed to open log stream: {0}")]
    StreamOpen(#[from] TailError),
}

impl TrackerError {
    /// Renders the message shown to the user.
    ///
    /// Names the unmet precondition and how to recover, without internal
    /// error details.
    #[must_use]
    pub fn user_message(&self) -> String {
        let problem = match self {
            Self::Config(ConfigError::InvalidValue { key, .. }) => {
                format!("Setting {key} has an invalid value.")
            }
            Self::ConfigurationMissing => "Log folder path is not set.".to_string(),
            Self::Discovery(DiscoveryError::RootNotFound { .. }) => {
                "Log folder path is not correctly set: the folder cannot be opened.".to_string()
            }
            Self::Discovery(DiscoveryError::NoSubdirectories(_)) => {
                "Log folder path is not correctly set: it contains no log folders.".to_string()
            }
            Self::StreamOpen(_) => "Cannot open telemetry.log in the latest log folder.".to_string(),
        };
        format!("{problem}\nPlease update the configuration and restart tracking.")
    }
}

/// A specialized `Result` type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
