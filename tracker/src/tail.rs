//! Follow-mode tail over a single log file.
//!
//! [`LogTail`] opens a file, seeks to its end, and emits every line appended
//! afterwards as a [`TailEvent::Line`]. Historical content is never replayed.
//!
//! # Architecture
//!
//! The tail uses the [`notify`] crate to receive change notifications for the
//! file. The notify callback is kept lightweight: it only forwards a signal
//! through an internal channel to a dedicated async task, which owns the read
//! position and performs all file I/O. Lines are therefore emitted strictly in
//! file order.
//!
//! Pausing ([`LogTail::unwatch`]) drops the notify watcher and aborts the
//! reader task. Resuming ([`LogTail::watch`]) starts a new follower positioned
//! at the current end of file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio::sync::mpsc;
//! use action_tracker::tail::{LogTail, TailEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let _tail = LogTail::open(PathBuf::from("/tmp/telemetry.log"), tx)?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             TailEvent::Line(line) => println!("{line}"),
//!             TailEvent::Error(message) => eprintln!("tail error: {message}"),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use notify::{
    event::{CreateKind, ModifyKind, RemoveKind},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Capacity of the channel between the notify callback and the reader task.
const SIGNAL_CHANNEL_CAPACITY: usize = 1000;

/// Events emitted by a [`LogTail`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// A complete line was appended to the file.
    ///
    /// The trailing `\n` or `\r\n` is stripped.
    Line(String),

    /// A non-fatal error occurred while following the file.
    ///
    /// The tail keeps running after reporting it.
    Error(String),
}

/// Signals from the notify callback, processed by the reader task.
#[derive(Debug)]
enum Signal {
    Changed,
    Removed,
    Failed(String),
}

/// Errors that can occur when opening or resuming a tail.
#[derive(Error, Debug)]
pub enum TailError {
    /// The log file could not be opened.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The filesystem watcher could not be registered.
    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Result type for tail operations.
pub type Result<T> = std::result::Result<T, TailError>;

/// The live half of a tail: the notify watcher plus its reader task.
///
/// Dropping it stops delivery immediately.
#[derive(Debug)]
struct Follower {
    /// Kept alive to maintain the watch subscription.
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for Follower {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A follow-mode stream over one log file.
///
/// Must be created and resumed from within a Tokio runtime.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    events: mpsc::Sender<TailEvent>,
    follower: Option<Follower>,
}

impl LogTail {
    /// Opens `path` and starts following it from the current end of file.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::Open`] if the file cannot be opened and
    /// [`TailError::Watch`] if the watcher cannot be registered.
    pub fn open(path: PathBuf, events: mpsc::Sender<TailEvent>) -> Result<Self> {
        let mut tail = Self {
            path,
            events,
            follower: None,
        };
        tail.watch()?;

        info!(path = %tail.path.display(), "Opened log tail");

        Ok(tail)
    }

    /// Returns the file being followed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` while lines are being delivered.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.follower.is_some()
    }

    /// Resumes delivery from the current end of file.
    ///
    /// Does nothing if the tail is already watching.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can no longer be opened or watched.
    pub fn watch(&mut self) -> Result<()> {
        if self.follower.is_some() {
            return Ok(());
        }

        let position = end_of_file(&self.path).map_err(|source| TailError::Open {
            path: self.path.clone(),
            source,
        })?;

        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let watcher = create_watcher(signal_tx, &self.path)?;

        let task = tokio::spawn(follow(
            signal_rx,
            self.path.clone(),
            position,
            self.events.clone(),
        ));

        debug!(path = %self.path.display(), position, "Watching log file");

        self.follower = Some(Follower {
            _watcher: watcher,
            task,
        });
        Ok(())
    }

    /// Suspends delivery without closing the tail.
    pub fn unwatch(&mut self) {
        if self.follower.take().is_some() {
            debug!(path = %self.path.display(), "Stopped watching log file");
        }
    }
}

/// Opens the file and returns its current length.
fn end_of_file(path: &Path) -> io::Result<u64> {
    let file = File::open(path)?;
    Ok(file.metadata()?.len())
}

/// Creates the notify watcher with a lightweight callback.
fn create_watcher(signal_tx: mpsc::Sender<Signal>, path: &Path) -> Result<RecommendedWatcher> {
    let to_error = |source: notify::Error| TailError::Watch {
        path: path.to_path_buf(),
        source,
    };

    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            handle_notify_event(res, &signal_tx);
        },
        Config::default(),
    )
    .map_err(to_error)?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(to_error)?;

    Ok(watcher)
}

/// Handles events from the notify crate.
///
/// Only maps and forwards; never blocks the notify thread.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    signal_tx: &mpsc::Sender<Signal>,
) {
    let signal = match res {
        Ok(event) => {
            trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");
            match event.kind {
                EventKind::Modify(ModifyKind::Data(_))
                | EventKind::Modify(ModifyKind::Any)
                | EventKind::Create(CreateKind::File)
                | EventKind::Create(CreateKind::Any) => Signal::Changed,
                EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
                    Signal::Removed
                }
                _ => return,
            }
        }
        Err(e) => Signal::Failed(e.to_string()),
    };

    if let Err(e) = signal_tx.try_send(signal) {
        warn!(error = %e, "Failed to queue tail signal, channel may be full");
    }
}

/// Reader task: turns change signals into line events.
async fn follow(
    mut signals: mpsc::Receiver<Signal>,
    path: PathBuf,
    mut position: u64,
    events: mpsc::Sender<TailEvent>,
) {
    while let Some(signal) = signals.recv().await {
        let batch = match signal {
            Signal::Changed => match read_new_lines(&path, &mut position) {
                Ok(lines) => lines.into_iter().map(TailEvent::Line).collect(),
                Err(e) => vec![TailEvent::Error(format!(
                    "failed to read {}: {e}",
                    path.display()
                ))],
            },
            Signal::Removed => vec![TailEvent::Error(format!(
                "{} was removed",
                path.display()
            ))],
            Signal::Failed(message) => vec![TailEvent::Error(message)],
        };

        for event in batch {
            if events.send(event).await.is_err() {
                debug!("Tail event receiver dropped, stopping follower");
                return;
            }
        }
    }
}

/// Reads complete lines appended after `position` and advances it.
///
/// A trailing partial line is left unread until its newline arrives. If the
/// file shrank below `position` it was truncated, and reading restarts at 0.
/// Empty lines are dropped.
fn read_new_lines(path: &Path, position: &mut u64) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();

    if file_size < *position {
        info!(
            path = %path.display(),
            old_pos = *position,
            new_size = file_size,
            "File truncated, resetting position to 0"
        );
        *position = 0;
    }

    if *position >= file_size {
        return Ok(Vec::new());
    }

    file.seek(SeekFrom::Start(*position))?;
    let mut buffer = Vec::with_capacity((file_size - *position) as usize);
    file.take(file_size - *position).read_to_end(&mut buffer)?;

    let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
        return Ok(Vec::new());
    };
    let complete = &buffer[..=last_newline];
    *position += complete.len() as u64;

    let lines = String::from_utf8_lossy(complete)
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_log_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("telemetry.log");
        fs::write(&path, content).expect("Failed to write log file");
        path
    }

    fn append(path: &Path, content: &str) {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(path)
            .expect("Failed to open for append");
        file.write_all(content.as_bytes())
            .expect("Failed to append");
    }

    async fn next_line(rx: &mut mpsc::Receiver<TailEvent>) -> Option<TailEvent> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten()
    }

    // =========================================================================
    // read_new_lines
    // =========================================================================

    #[test]
    fn test_no_new_content() {
        let temp_dir = TempDir::new().unwrap();
        let content = "line one\nline two\n";
        let path = create_log_file(temp_dir.path(), content);

        let mut position = content.len() as u64;
        let lines = read_new_lines(&path, &mut position).unwrap();
        assert!(lines.is_empty(), "Should not replay existing content");
        assert_eq!(position, content.len() as u64);
    }

    #[test]
    fn test_reads_only_appended_lines() {
        let temp_dir = TempDir::new().unwrap();
        let initial = "old\n";
        let path = create_log_file(temp_dir.path(), initial);
        let mut position = initial.len() as u64;

        append(&path, "new one\nnew two\n");

        let lines = read_new_lines(&path, &mut position).unwrap();
        assert_eq!(lines, vec!["new one", "new two"]);
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "");
        let mut position = 0;

        append(&path, "complete\npart");
        let lines = read_new_lines(&path, &mut position).unwrap();
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(position, "complete\n".len() as u64);

        append(&path, "ial\n");
        let lines = read_new_lines(&path, &mut position).unwrap();
        assert_eq!(lines, vec!["partial"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "");
        let mut position = 0;

        append(&path, "first\r\nsecond\r\n");
        let lines = read_new_lines(&path, &mut position).unwrap();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_lines_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "");
        let mut position = 0;

        append(&path, "a\n\n\r\nb\n");
        let lines = read_new_lines(&path, &mut position).unwrap();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn test_truncation_resets_position() {
        let temp_dir = TempDir::new().unwrap();
        let initial = "line one\nline two\nline three\n";
        let path = create_log_file(temp_dir.path(), initial);
        let mut position = initial.len() as u64;

        fs::write(&path, "fresh\n").unwrap();

        let lines = read_new_lines(&path, &mut position).unwrap();
        assert_eq!(lines, vec!["fresh"]);
        assert_eq!(position, "fresh\n".len() as u64);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("telemetry.log");
        fs::write(&path, b"ok \xff\n").unwrap();
        let mut position = 0;

        let lines = read_new_lines(&path, &mut position).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
    }

    #[test]
    fn test_missing_file_is_error() {
        let mut position = 0;
        assert!(read_new_lines(Path::new("/nonexistent/telemetry.log"), &mut position).is_err());
    }

    // =========================================================================
    // LogTail
    // =========================================================================

    #[tokio::test]
    async fn test_open_missing_file() {
        let (tx, _rx) = mpsc::channel(10);
        let result = LogTail::open(PathBuf::from("/nonexistent/telemetry.log"), tx);

        assert!(matches!(result, Err(TailError::Open { .. })));
    }

    #[tokio::test]
    async fn test_open_starts_watching() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "history\n");
        let (tx, _rx) = mpsc::channel(10);

        let tail = LogTail::open(path.clone(), tx).expect("Should open tail");
        assert!(tail.is_watching());
        assert_eq!(tail.path(), path);
    }

    #[tokio::test]
    async fn test_delivers_appended_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "history\n");
        let (tx, mut rx) = mpsc::channel(10);

        let _tail = LogTail::open(path.clone(), tx).expect("Should open tail");
        append(&path, "fresh line\n");

        assert_eq!(
            next_line(&mut rx).await,
            Some(TailEvent::Line("fresh line".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unwatch_and_watch() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "");
        let (tx, mut rx) = mpsc::channel(10);

        let mut tail = LogTail::open(path.clone(), tx).expect("Should open tail");
        tail.unwatch();
        assert!(!tail.is_watching());

        append(&path, "while paused\n");

        tail.watch().expect("Should resume");
        assert!(tail.is_watching());
        append(&path, "after resume\n");

        assert_eq!(
            next_line(&mut rx).await,
            Some(TailEvent::Line("after resume".to_string()))
        );
    }

    #[tokio::test]
    async fn test_watch_fails_when_file_removed() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "");
        let (tx, _rx) = mpsc::channel(10);

        let mut tail = LogTail::open(path.clone(), tx).expect("Should open tail");
        tail.unwatch();
        fs::remove_file(&path).unwrap();

        assert!(!path.exists());
        assert!(matches!(tail.watch(), Err(TailError::Open { .. })));
        assert!(!tail.is_watching());
    }

    // =========================================================================
    // notify event mapping
    // =========================================================================

    fn map_event(res: std::result::Result<Event, notify::Error>) -> Option<Signal> {
        let (tx, mut rx) = mpsc::channel(10);
        handle_notify_event(res, &tx);
        rx.try_recv().ok()
    }

    #[test]
    fn test_notify_event_mapping() {
        use notify::event::{AccessKind, DataChange, MetadataKind};

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)));
        assert!(matches!(map_event(Ok(modified)), Some(Signal::Changed)));

        let created = Event::new(EventKind::Create(CreateKind::File));
        assert!(matches!(map_event(Ok(created)), Some(Signal::Changed)));

        let removed = Event::new(EventKind::Remove(RemoveKind::File));
        assert!(matches!(map_event(Ok(removed)), Some(Signal::Removed)));

        let accessed = Event::new(EventKind::Access(AccessKind::Any));
        assert!(map_event(Ok(accessed)).is_none());

        let metadata = Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)));
        assert!(map_event(Ok(metadata)).is_none());

        match map_event(Err(notify::Error::generic("inotify limit reached"))) {
            Some(Signal::Failed(message)) => assert!(message.contains("inotify limit reached")),
            other => panic!("expected Failed signal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_follow_reports_removal_and_watch_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_log_file(temp_dir.path(), "");
        let (signal_tx, signal_rx) = mpsc::channel(10);
        let (tx, mut rx) = mpsc::channel(10);

        let task = tokio::spawn(follow(signal_rx, path.clone(), 0, tx));

        signal_tx.send(Signal::Removed).await.unwrap();
        signal_tx
            .send(Signal::Failed("watch lost".to_string()))
            .await
            .unwrap();
        append(&path, "still here\n");
        signal_tx.send(Signal::Changed).await.unwrap();

        match next_line(&mut rx).await {
            Some(TailEvent::Error(message)) => assert!(message.ends_with("was removed")),
            other => panic!("expected removal error, got {other:?}"),
        }
        assert_eq!(
            next_line(&mut rx).await,
            Some(TailEvent::Error("watch lost".to_string()))
        );
        assert_eq!(
            next_line(&mut rx).await,
            Some(TailEvent::Line("still here".to_string()))
        );

        drop(signal_tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("follower should exit when signals close")
            .unwrap();
    }

    #[test]
    fn test_tail_error_display() {
        let err = TailError::Open {
            path: PathBuf::from("/logs/telemetry.log"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "cannot open /logs/telemetry.log: not found");
    }
}
