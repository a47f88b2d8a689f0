//! Logging pipeline initialization.
//!
//! [`init_logging`] installs the service pipeline: the same line layout on
//! stdout and in the log file, one threshold for both, and noisy dependency
//! targets clamped to `WARNING`. [`init_cli_logging`] configures the
//! `veolog` binary's own diagnostics, which go to stderr so they never mix
//! with log lines printed on stdout.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing::level_filters::LevelFilter;
use tracing::{info, Event, Level, Metadata};
use tracing_subscriber::layer::{Context, Filter};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, LogDestination, LoggingConfig};
use crate::error::{Error, Result};
use crate::files;
use crate::format::{is_critical, LineFormat};
use crate::level::{LogLevel, CRITICAL_FIELD};
use crate::request::APP_TARGET;

/// What [`init_logging`] set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingHandle {
    destination: LogDestination,
    started_at: NaiveDateTime,
    installed: bool,
}

impl LoggingHandle {
    /// The file receiving log lines, if file logging is enabled.
    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.destination.path()
    }

    /// Where log lines go.
    #[must_use]
    pub fn destination(&self) -> &LogDestination {
        &self.destination
    }

    /// When the pipeline was initialized.
    #[must_use]
    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }

    /// False when another global subscriber was already installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

/// Initialize the service logging pipeline.
///
/// This should be called once at process start. The threshold comes from
/// `LOG_LEVEL`; `RUST_LOG`, when set, replaces the generated filter.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created, or the
/// filter directives are invalid.
///
/// # Examples
///
/// ```no_run
/// use veolog::{init_logging, Config};
///
/// let config = Config::load()?;
/// let handle = init_logging(&config)?;
/// if let Some(path) = handle.log_file() {
///     println!("Logging to: {}", path.display());
/// }
/// # Ok::<(), veolog::Error>(())
/// ```
pub fn init_logging(config: &Config) -> Result<LoggingHandle> {
    let started_at = Local::now().naive_local();
    let (destination, file) = match config.destination(started_at) {
        LogDestination::Timestamped(path) => {
            let (path, file) = create_run_log_file(&path)?;
            (LogDestination::Timestamped(path), Some(file))
        }
        LogDestination::Fixed(path) => {
            let file = open_log_file(&path)?;
            (LogDestination::Fixed(path), Some(file))
        }
        LogDestination::Disabled => (LogDestination::Disabled, None),
    };

    let filter = build_filter(&config.logging)?;
    let critical = CriticalFilter::new(config.logging.log_level == LogLevel::Critical);

    let console_layer = config.logging.console.then(|| {
        fmt::layer()
            .event_format(LineFormat)
            .with_writer(std::io::stdout)
            .with_filter(critical)
    });
    let file_layer = file.map(|file| {
        fmt::layer()
            .event_format(LineFormat)
            .with_writer(Mutex::new(file))
            .with_filter(critical)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    match destination.path() {
        Some(path) => info!(target: APP_TARGET, "Logging to: {}", path.display()),
        None => info!(target: APP_TARGET, "File logging disabled"),
    }

    Ok(LoggingHandle {
        destination,
        started_at,
        installed,
    })
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Create parent directories and open the log file, truncating it.
fn open_log_file(path: &Path) -> Result<File> {
    create_parent_dir(path)?;
    File::create(path).map_err(|source| Error::LogFileOpen {
        path: PathBuf::from(path),
        source,
    })
}

/// Create a file no other process has claimed: `path`, else the first free
/// `-N` sibling. Existing files are never opened.
fn create_run_log_file(path: &Path) -> Result<(PathBuf, File)> {
    create_parent_dir(path)?;

    let mut sequence = 1;
    loop {
        let candidate = files::numbered_path(path, sequence);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && sequence < u32::MAX => {
                sequence += 1;
            }
            Err(source) => {
                return Err(Error::LogFileOpen {
                    path: candidate,
                    source,
                })
            }
        }
    }
}

/// Per-layer filter that, at the `CRITICAL` threshold, passes only events
/// recorded with `critical = true`.
#[derive(Debug, Clone, Copy)]
struct CriticalFilter {
    critical_only: bool,
}

impl CriticalFilter {
    fn new(critical_only: bool) -> Self {
        Self { critical_only }
    }
}

impl<S> Filter<S> for CriticalFilter {
    fn enabled(&self, metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        !self.critical_only || metadata.fields().field(CRITICAL_FIELD).is_some()
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        !self.critical_only || is_critical(event)
    }
}

/// Filter directives for a logging configuration, e.g. `info,hyper=warn`.
///
/// Quiet targets are clamped to `WARNING`, or to the threshold when that is
/// already stricter.
#[must_use]
pub fn default_directives(config: &LoggingConfig) -> String {
    let threshold = config.log_level.to_level_filter();
    let quiet = threshold.min(LevelFilter::WARN);

    std::iter::once(threshold.to_string())
        .chain(
            config
                .quiet_targets
                .iter()
                .map(|target| format!("{target}={quiet}")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = default_directives(config);
    EnvFilter::try_new(&directives).map_err(|e| Error::log_filter(directives, e.to_string()))
}

/// Verbosity level for the CLI's own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (warnings and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Initialize logging for the `veolog` binary itself.
///
/// Diagnostics go to stderr. `RUST_LOG` takes precedence over `verbosity`.
pub fn init_cli_logging(verbosity: Verbosity) {
    let default_filter = format!("veolog={}", verbosity.to_level_filter());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Ignore the error if a subscriber is already set.
    let _ = subscriber.try_init();
}
