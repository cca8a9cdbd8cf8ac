//! Action Tracker - editor telemetry log watcher.
//!
//! This binary follows the editor's telemetry log and prints a notification
//! for every executed action.
//!
//! # Commands
//!
//! - `action-tracker run`: Track actions until `quit` is entered or a signal arrives
//! - `action-tracker locate`: Print the active telemetry log path
//! - `action-tracker classify`: Classify the lines of a saved log offline
//!
//! # Environment Variables
//!
//! See the `action_tracker::config` module for available configuration options.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader as AsyncBufReader};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use action_tracker::classifier::classify;
use action_tracker::config::Config;
use action_tracker::controller::TailController;
use action_tracker::locator;
use action_tracker::error::TrackerError;
use action_tracker::notifier::{ConsoleNotifier, Notifier, OutputFormat};

/// Action Tracker - editor telemetry log watcher.
///
/// Follows the editor's telemetry log and reports every executed action
/// as a notification.
#[derive(Parser, Debug)]
#[command(name = "action-tracker")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    ACTION_TRACKER_LOG_FOLDER_PATH    Editor logs root (required for 'run' and 'locate')
    ACTION_TRACKER_IGNORED_ACTIONS    Comma-separated patterns to ignore (default: vim,wordHighlight)
    ACTION_TRACKER_SHOW_INIT_MESSAGE  Show setup hints on startup (default: true)
    ACTION_TRACKER_CHANNEL_CAPACITY   Line channel capacity (default: 1000)

COMMANDS ON STDIN (run):
    start    Start or resume tracking
    stop     Pause tracking
    status   Print the tracking state
    quit     Stop tracking and exit

EXAMPLES:
    # Track actions of the current editor session
    export ACTION_TRACKER_LOG_FOLDER_PATH=~/.config/Code/logs
    action-tracker run

    # Show which log file would be followed
    action-tracker locate --log-folder ~/.config/Code/logs

    # Classify a saved log, ignoring nothing but cursor moves
    action-tracker classify telemetry.log --ignore cursor
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Track executed actions.
    ///
    /// Reads start, stop, status and quit commands from stdin. Runs until
    /// `quit` is entered or Ctrl+C is pressed, even after stdin closes.
    Run {
        /// Editor logs root (overrides ACTION_TRACKER_LOG_FOLDER_PATH).
        #[arg(short, long, value_name = "PATH")]
        log_folder: Option<PathBuf>,

        /// Action id pattern to ignore; repeat to add more.
        #[arg(short, long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,

        /// Print notifications as JSON lines.
        #[arg(long)]
        json: bool,

        /// Enable debug logging.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the telemetry log of the most recent editor session.
    Locate {
        /// Editor logs root (overrides ACTION_TRACKER_LOG_FOLDER_PATH).
        #[arg(short, long, value_name = "PATH")]
        log_folder: Option<PathBuf>,
    },

    /// Classify log lines offline and print each recognized action.
    Classify {
        /// Log file to read (default: stdin).
        file: Option<PathBuf>,

        /// Action id pattern to ignore; repeat to add more.
        #[arg(short, long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,
    },
}

/// Outcome of a stdin read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
    /// No more commands will arrive; keep tracking until a signal.
    InputClosed,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            log_folder,
            ignore,
            json,
            verbose,
        } => {
            init_logging(verbose, json);

            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_tracker(log_folder, ignore, format))
        }
        Command::Locate { log_folder } => {
            init_logging(false, false);
            run_locate(log_folder)
        }
        Command::Classify { file, ignore } => {
            init_logging(false, false);
            run_classify(file, ignore)
        }
    }
}

/// Runs the tracker until `quit` is entered or a signal arrives.
async fn run_tracker(
    log_folder: Option<PathBuf>,
    ignore: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    info!("Starting Action Tracker");

    let notifier = Arc::new(ConsoleNotifier::new(format));
    let config = load_config(log_folder, ignore, notifier.as_ref())
        .context("Failed to load configuration")?;

    info!(
        log_folder = ?config.log_folder_path,
        ignored_actions = ?config.ignored_actions,
        "Configuration loaded"
    );

    let mut controller = TailController::new(config, notifier);

    controller.announce();
    controller.start();

    let mut commands = AsyncBufReader::new(tokio::io::stdin()).lines();
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }

            line = commands.next_line(), if stdin_open => {
                match handle_input(&mut controller, line, format) {
                    Flow::Continue => {}
                    Flow::Quit => break,
                    Flow::InputClosed => stdin_open = false,
                }
            }
        }
    }

    info!("Shutting down...");
    controller.teardown();
    info!("Tracker stopped");
    Ok(())
}

/// Loads the configuration, showing the user why it was rejected.
fn load_config(
    log_folder: Option<PathBuf>,
    ignore: Vec<String>,
    notifier: &dyn Notifier,
) -> action_tracker::Result<Config> {
    match Config::from_env() {
        Ok(config) => Ok(config
            .with_log_folder_path(log_folder)
            .with_ignored_actions(ignore)),
        Err(e) => {
            let e = TrackerError::from(e);
            warn!(error = %e, "Invalid configuration");
            notifier.error(&e.user_message());
            Err(e)
        }
    }
}

/// Handles the result of reading one line from stdin.
fn handle_input(
    controller: &mut TailController,
    line: io::Result<Option<String>>,
    format: OutputFormat,
) -> Flow {
    match line {
        Ok(Some(line)) => handle_command(controller, line.trim(), format),
        Ok(None) => {
            debug!("stdin closed, tracking until a shutdown signal");
            Flow::InputClosed
        }
        Err(e) => {
            warn!(error = %e, "Failed to read command, ignoring stdin");
            Flow::InputClosed
        }
    }
}

/// Applies a single stdin command to the controller.
fn handle_command(controller: &mut TailController, command: &str, format: OutputFormat) -> Flow {
    match command {
        "" => {}
        "start" => controller.start(),
        "stop" => controller.stop(),
        "status" => print_status(controller, format),
        "quit" | "exit" => return Flow::Quit,
        other => {
            warn!(command = other, "Unknown command");
            eprintln!("Unknown command '{other}'. Expected start, stop, status or quit.");
        }
    }
    Flow::Continue
}

fn print_status(controller: &TailController, format: OutputFormat) {
    let state = controller.state();
    let log_path = controller.log_path().map(|p| p.display().to_string());

    match format {
        OutputFormat::Text => match log_path {
            Some(path) => println!("state: {state}, log: {path}"),
            None => println!("state: {state}"),
        },
        OutputFormat::Json => {
            let status = serde_json::json!({ "state": state, "log_path": log_path });
            println!("{status}");
        }
    }
}

/// Runs the locate command.
fn run_locate(log_folder: Option<PathBuf>) -> Result<()> {
    let config = Config::from_env()
        .context("Failed to load configuration")?
        .with_log_folder_path(log_folder);

    let root = config.log_folder_path.context(
        "Log folder path is not set. Pass --log-folder or set ACTION_TRACKER_LOG_FOLDER_PATH.",
    )?;

    let path = locator::locate(&root)
        .with_context(|| format!("Failed to locate telemetry log under {}", root.display()))?;

    println!("{}", path.display());
    Ok(())
}

/// Runs the classify command over a file or stdin.
fn run_classify(file: Option<PathBuf>, ignore: Vec<String>) -> Result<()> {
    let config = Config::from_env()
        .context("Failed to load configuration")?
        .with_ignored_actions(ignore);

    let reader: Box<dyn BufRead> = match &file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin().lock())),
    };

    let mut hits = 0usize;
    for line in reader.split(b'\n') {
        let line = line.context("Failed to read input")?;
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches('\r');

        if let Some(action) = classify(line, &config.ignored_actions) {
            println!("{} {}", action.category, action.action_id);
            hits += 1;
        }
    }

    debug!(hits, "Classification finished");
    Ok(())
}

/// Initializes the logging subsystem. Logs go to stderr.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "action-tracker",
            "run",
            "--log-folder",
            "/logs",
            "--ignore",
            "vim",
            "-i",
            "cursor",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Command::Run {
                log_folder,
                ignore,
                json,
                verbose,
            } => {
                assert_eq!(log_folder, Some(PathBuf::from("/logs")));
                assert_eq!(ignore, vec!["vim", "cursor"]);
                assert!(json);
                assert!(!verbose);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_classify_file_is_optional() {
        let cli = Cli::try_parse_from(["action-tracker", "classify"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Classify { file: None, ref ignore } if ignore.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_handle_command_quit_and_unknown() {
        let notifier = Arc::new(action_tracker::notifier::ChannelNotifier::channel().0);
        let mut controller = TailController::new(Config::default(), notifier);

        assert_eq!(
            handle_command(&mut controller, "quit", OutputFormat::Text),
            Flow::Quit
        );
        assert_eq!(
            handle_command(&mut controller, "dance", OutputFormat::Text),
            Flow::Continue
        );
        assert_eq!(
            handle_command(&mut controller, "stop", OutputFormat::Text),
            Flow::Continue
        );
    }

    #[tokio::test]
    async fn test_closed_stdin_keeps_tracking() {
        let notifier = Arc::new(action_tracker::notifier::ChannelNotifier::channel().0);
        let mut controller = TailController::new(Config::default(), notifier);

        assert_eq!(
            handle_input(&mut controller, Ok(None), OutputFormat::Text),
            Flow::InputClosed
        );
        assert_eq!(
            handle_input(
                &mut controller,
                Err(io::Error::new(io::ErrorKind::InvalidData, "not utf-8")),
                OutputFormat::Text
            ),
            Flow::InputClosed
        );
        assert_eq!(
            handle_input(&mut controller, Ok(Some(" quit ".to_string())), OutputFormat::Text),
            Flow::Quit
        );
    }

    #[test]
    #[serial]
    fn test_invalid_config_is_reported_to_user() {
        use action_tracker::config::CHANNEL_CAPACITY_VAR;
        use action_tracker::notifier::{ChannelNotifier, Severity};

        let saved = std::env::var(CHANNEL_CAPACITY_VAR).ok();
        std::env::set_var(CHANNEL_CAPACITY_VAR, "0");

        let (notifier, mut rx) = ChannelNotifier::channel();
        let result = load_config(None, Vec::new(), &notifier);

        match saved {
            Some(value) => std::env::set_var(CHANNEL_CAPACITY_VAR, value),
            None => std::env::remove_var(CHANNEL_CAPACITY_VAR),
        }

        assert!(matches!(result, Err(TrackerError::Config(_))));
        let notice = rx.try_recv().expect("an error notice for invalid config");
        assert_eq!(notice.severity, Severity::Error);
        assert!(notice.message.contains(CHANNEL_CAPACITY_VAR));
        assert!(notice.message.ends_with("restart tracking."));
    }

    #[test]
    #[serial]
    fn test_load_config_applies_overrides() {
        use action_tracker::notifier::ChannelNotifier;

        let (notifier, mut rx) = ChannelNotifier::channel();
        let config = load_config(
            Some(PathBuf::from("/logs")),
            vec!["scroll".to_string()],
            &notifier,
        )
        .unwrap();

        assert_eq!(config.log_folder_path, Some(PathBuf::from("/logs")));
        assert_eq!(config.ignored_actions, vec!["scroll"]);
        assert!(rx.try_recv().is_err());
    }
}
