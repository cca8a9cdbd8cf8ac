//! Active log file discovery.
//!
//! The editor writes its logs into a fresh subdirectory of the logs root for
//! every session, e.g. `~/.config/Code/logs/20240101T090000/telemetry.log`.
//! This module finds the most recently created subdirectory and resolves the
//! telemetry log inside it.
//!
//! Discovery reads the filesystem fresh on every call; nothing is cached.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

/// Name of the log file inside each session directory.
pub const LOG_FILE_NAME: &str = "telemetry.log";

/// Errors that can occur while locating the active log file.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The root directory is missing or cannot be listed.
    #[error("cannot read log folder {}: {source}", .path.display())]
    RootNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The root directory exists but holds no subdirectories.
    #[error("log folder {} contains no session directories", .0.display())]
    NoSubdirectories(PathBuf),
}

/// A single child of the logs root, read during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirectoryEntry {
    /// File name of the child, relative to the root.
    pub name: String,

    /// Whether the child is a directory.
    pub is_directory: bool,

    /// Creation time in milliseconds since the Unix epoch.
    pub created_ms: u128,
}

/// Resolves the active log file under `root`.
///
/// # Errors
///
/// Returns [`DiscoveryError::RootNotFound`] if `root` cannot be listed and
/// [`DiscoveryError::NoSubdirectories`] if it has no directory children.
pub fn locate(root: &Path) -> Result<PathBuf, DiscoveryError> {
    let entries = read_entries(root)?;

    let latest = select_latest(&entries)
        .ok_or_else(|| DiscoveryError::NoSubdirectories(root.to_path_buf()))?;

    let path = root.join(&latest.name).join(LOG_FILE_NAME);
    debug!(
        root = %root.display(),
        session_dir = %latest.name,
        path = %path.display(),
        "Located active log file"
    );

    Ok(path)
}

/// Lists the immediate children of `root`.
///
/// Children whose metadata cannot be read are skipped with a warning.
///
/// # Errors
///
/// Returns [`DiscoveryError::RootNotFound`] if `root` cannot be listed.
pub fn read_entries(root: &Path) -> Result<Vec<LogDirectoryEntry>, DiscoveryError> {
    let read_dir = fs::read_dir(root).map_err(|source| DiscoveryError::RootNotFound {
        path: root.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to read log folder entry");
                continue;
            }
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "Failed to read metadata, skipping"
                );
                continue;
            }
        };

        let created = metadata.created().or_else(|_| metadata.modified()).ok();

        entries.push(LogDirectoryEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_directory: metadata.is_dir(),
            created_ms: created.map_or(0, millis_since_epoch),
        });
    }

    Ok(entries)
}

/// Picks the directory entry with the strictly greatest creation time.
///
/// Non-directories are ignored. On ties the earliest entry in `entries` wins.
#[must_use]
pub fn select_latest(entries: &[LogDirectoryEntry]) -> Option<&LogDirectoryEntry> {
    let mut latest: Option<&LogDirectoryEntry> = None;
    for entry in entries.iter().filter(|e| e.is_directory) {
        if latest.is_none_or(|current| entry.created_ms > current.created_ms) {
            latest = Some(entry);
        }
    }
    latest
}

fn millis_since_epoch(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
