//! Tracking lifecycle: discovery, tailing and dispatch.
//!
//! [`TailController`] owns the single tail session of a tracker. It finds the
//! active log file with [`locator::locate`], follows it with a [`LogTail`],
//! and hands every new line to [`classify`]. Recognized actions are reported
//! to the [`Notifier`] as `Executed <action id>`.
//!
//! # States
//!
//! ```text
//!                 start() ok
//! Uninitialized ─────────────▶ Active ◀──── start() ────┐
//!       │                        │                       │
//!       │ start() fails          └──── stop() ──▶ Paused ┘
//!       ▼
//!    Failed ── start() retries discovery
//! ```
//!
//! `teardown()` releases the session from any state and returns to
//! `Uninitialized`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use action_tracker::config::Config;
//! use action_tracker::controller::TailController;
//! use action_tracker::notifier::{ConsoleNotifier, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("valid configuration");
//!     let notifier = Arc::new(ConsoleNotifier::new(OutputFormat::Text));
//!     let mut controller = TailController::new(config, notifier);
//!
//!     controller.start();
//!     tokio::signal::ctrl_c().await.ok();
//!     controller.teardown();
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::locator;
use crate::notifier::Notifier;
use crate::tail::{LogTail, TailEvent};

/// Shown when tracking starts or resumes.
pub const STARTED_MESSAGE: &str =
    "Started tracking editor actions.\nIgnored actions can be configured with ACTION_TRACKER_IGNORED_ACTIONS.";

/// Shown whenever tracking is stopped.
pub const STOPPED_MESSAGE: &str = "Stopped tracking editor actions.";

/// Setup hints shown once on startup when enabled.
pub const INIT_HINTS: [&str; 2] = [
    "Action Tracker reads the editor's telemetry log.\nMake sure the telemetry log level is set to trace.",
    "The editor starts a new log folder for every session.\nIf notifications stop appearing, restart tracking.",
];

/// Lifecycle state of a [`TailController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    /// No session has been created yet, or it was torn down.
    Uninitialized,
    /// The log file is open and lines are being delivered.
    Active,
    /// The log file is open but delivery is suspended.
    Paused,
    /// The last initialization attempt was rejected.
    Failed,
}

impl std::fmt::Display for TrackerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// An open tail plus the task classifying its lines.
#[derive(Debug)]
struct TailSession {
    tail: LogTail,
    dispatcher: JoinHandle<()>,
}

impl Drop for TailSession {
    fn drop(&mut self) {
        self.tail.unwatch();
        self.dispatcher.abort();
    }
}

/// Owns the tail session and drives its lifecycle.
///
/// All methods must be called from within a Tokio runtime.
pub struct TailController {
    config: watch::Sender<Config>,
    notifier: Arc<dyn Notifier>,
    session: Option<TailSession>,
    state: TrackerState,
}

impl TailController {
    /// Creates a controller. No filesystem access happens until [`start`](Self::start).
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let (config, _) = watch::channel(config);
        Self {
            config,
            notifier,
            session: None,
            state: TrackerState::Uninitialized,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Returns the log file being followed, if a session exists.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|session| session.tail.path())
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.config.borrow().clone()
    }

    /// Replaces the configuration.
    ///
    /// The ignore list takes effect for the next line without restarting the
    /// tail. Other settings apply the next time a session is created.
    pub fn update_config(&self, config: Config) {
        debug!(ignored_actions = ?config.ignored_actions, "Configuration updated");
        self.config.send_replace(config);
    }

    /// Shows the setup hints if `show_init_message` is enabled.
    pub fn announce(&self) {
        if self.config.borrow().show_init_message {
            for hint in INIT_HINTS {
                self.notifier.warning(hint);
            }
        }
    }

    /// Creates the tail session if none exists.
    ///
    /// On failure the controller moves to [`TrackerState::Failed`] and the user
    /// is told which precondition was not met.
    ///
    /// # Errors
    ///
    /// Returns the reason the session could not be created.
    pub fn initialize(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        match self.open_session() {
            Ok(session) => {
                info!(path = %session.tail.path().display(), "Tracking initialized");
                self.session = Some(session);
                self.state = TrackerState::Active;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to initialize tracking");
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Starts or resumes tracking.
    ///
    /// Initializes first if needed. Confirms to the user only if delivery is
    /// running afterwards.
    pub fn start(&mut self) {
        if self.session.is_none() && self.initialize().is_err() {
            return;
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Err(e) = session.tail.watch() {
            let e = TrackerError::from(e);
            warn!(error = %e, "Failed to resume tracking");
            self.session = None;
            self.fail(&e);
            return;
        }

        self.state = TrackerState::Active;
        info!("Tracking started");
        self.notifier.info(STARTED_MESSAGE);
    }

    /// Suspends delivery. Always confirms to the user.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.tail.unwatch();
            self.state = TrackerState::Paused;
            info!("Tracking paused");
        }
        self.notifier.info(STOPPED_MESSAGE);
    }

    /// Releases the session. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            info!(path = %session.tail.path().display(), "Tracking torn down");
            drop(session);
            self.state = TrackerState::Uninitialized;
        }
    }

    fn open_session(&self) -> Result<TailSession> {
        let (root, capacity) = {
            let config = self.config.borrow();
            (config.log_folder_path.clone(), config.channel_capacity)
        };

        let root = root
            .filter(|root| !root.as_os_str().is_empty())
            .ok_or(TrackerError::ConfigurationMissing)?;

        let path = locator::locate(&root)?;

        let (line_tx, line_rx) = mpsc::channel(capacity.max(1));
        let tail = LogTail::open(path, line_tx)?;

        let dispatcher = tokio::spawn(dispatch(
            line_rx,
            self.config.subscribe(),
            Arc::clone(&self.notifier),
        ));

        Ok(TailSession { tail, dispatcher })
    }

    fn fail(&mut self, error: &TrackerError) {
        self.state = TrackerState::Failed;
        self.notifier.error(&error.user_message());
    }
}

impl Drop for TailController {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for TailController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailController")
            .field("state", &self.state)
            .field("log_path", &self.log_path())
            .finish_non_exhaustive()
    }
}

/// Classifies each tailed line against the latest ignore list.
async fn dispatch(
    mut lines: mpsc::Receiver<TailEvent>,
    config: watch::Receiver<Config>,
    notifier: Arc<dyn Notifier>,
) {
    while let Some(event) = lines.recv().await {
        match event {
            TailEvent::Line(line) => {
                let action = classify(&line, &config.borrow().ignored_actions);
                if let Some(action) = action {
                    debug!(
                        category = %action.category,
                        action_id = %action.action_id,
                        "Action detected"
                    );
                    notifier.info(&action.notification_text());
                }
            }
            TailEvent::Error(message) => {
                warn!(error = %message, "Log tail error");
            }
        }
    }

    debug!("Line dispatcher shutting down");
}
