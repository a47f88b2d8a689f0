//! Configuration management for veolog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.
//!
//! The service has always been configured through three plain environment
//! variables, `LOG_LEVEL`, `LOG_FILE` and `USE_TIMESTAMPED_LOGS`. They keep
//! working unprefixed and take precedence over everything else.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::files;
use crate::level::LogLevel;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "veolog";

/// Prefix for structured environment overrides (`VEOLOG_FILES__LOG_DIR`).
const ENV_PREFIX: &str = "VEOLOG_";

/// The unprefixed variables the service reads.
const SERVICE_ENV_VARS: [&str; 3] = ["LOG_LEVEL", "LOG_FILE", "USE_TIMESTAMPED_LOGS"];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. `LOG_LEVEL`, `LOG_FILE`, `USE_TIMESTAMPED_LOGS`
/// 2. Environment variables prefixed with `VEOLOG_` (`__` separates sections)
/// 3. TOML config file at `~/.config/veolog/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging pipeline configuration.
    pub logging: LoggingConfig,
    /// Log file layout and retention.
    pub files: FilesConfig,
}

/// Logging pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level written to the console and the file.
    pub log_level: LogLevel,
    /// Explicit log file. `Some("")` disables file logging.
    /// Ignored while timestamped logs are enabled.
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub log_file: Option<String>,
    /// Start a fresh `<base>_<YYYYMMDD>_<HHMMSS>.log` file per process.
    #[serde(deserialize_with = "deserialize_flag")]
    pub use_timestamped_logs: bool,
    /// Also write log lines to stdout.
    pub console: bool,
    /// Targets clamped to `WARNING` so their chatter stays out of the log.
    pub quiet_targets: Vec<String>,
}

/// Log file layout and retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory holding log files.
    pub log_dir: PathBuf,
    /// File name stem, `app` gives `app_20260116_133925.log` and `app.log`.
    pub base_name: String,
    /// Files older than this many days are pruned by `clean`.
    /// Set to 0 for unlimited.
    pub retention_days: u32,
    /// Number of newest files `clean` always keeps.
    /// Set to 0 for unlimited.
    pub keep_latest: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_file: None,
            use_timestamped_logs: true,
            console: true,
            quiet_targets: default_quiet_targets(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            base_name: "app".to_string(),
            retention_days: 7,
            keep_latest: 0,
        }
    }
}

/// HTTP and SDK internals that log far more than anyone reads.
fn default_quiet_targets() -> Vec<String> {
    ["hyper", "h2", "reqwest", "rustls", "tower_http"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Accept real booleans from TOML and the service's `true`/anything-else
/// convention from the environment.
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
        Other(IgnoredAny),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        Flag::Other(_) => false,
    })
}

/// A scalar config value read back as text.
///
/// Environment providers type `2026` as a number and `true` as a bool, but
/// level names and file paths are text whatever they look like.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ScalarText {
    Text(String),
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl ScalarText {
    pub(crate) fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Bool(value) => value.to_string(),
            Self::Unsigned(value) => value.to_string(),
            Self::Signed(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
        }
    }
}

fn deserialize_optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<ScalarText>::deserialize(deserializer)?.map(ScalarText::into_string))
}

/// Where the logging pipeline writes its file output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// A fresh per-process file named after the start time.
    Timestamped(PathBuf),
    /// A fixed file, truncated at start.
    Fixed(PathBuf),
    /// Console only.
    Disabled,
}

impl LogDestination {
    /// The file path, if file logging is enabled.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Timestamped(path) | Self::Fixed(path) => Some(path),
            Self::Disabled => None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        // Taken verbatim so `LOG_FILE=007` stays `007`.
        for var in SERVICE_ENV_VARS {
            if let Ok(value) = std::env::var(var) {
                let key = format!("logging.{}", var.to_ascii_lowercase());
                figment = figment.merge(Serialized::default(&key, value));
            }
        }

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let base = &self.files.base_name;
        if base.trim().is_empty() {
            return Err(Error::config_validation("base_name must not be empty"));
        }
        if base.contains(['/', '\\']) {
            return Err(Error::config_validation(format!(
                "base_name must be a file name, not a path: {base}"
            )));
        }

        if self.files.log_dir.as_os_str().is_empty() {
            return Err(Error::config_validation("log_dir must not be empty"));
        }

        if let Some(target) = self
            .logging
            .quiet_targets
            .iter()
            .find(|t| t.trim().is_empty() || t.contains([',', '=']))
        {
            return Err(Error::config_validation(format!(
                "invalid quiet target: '{target}'"
            )));
        }

        Ok(())
    }

    /// Resolve where the logging pipeline writes for a process started at `now`.
    ///
    /// Timestamped logs win over `LOG_FILE`; an empty `LOG_FILE` turns file
    /// output off; with neither, output goes to `<log_dir>/<base>.log`.
    #[must_use]
    pub fn destination(&self, now: NaiveDateTime) -> LogDestination {
        if self.logging.use_timestamped_logs {
            return LogDestination::Timestamped(files::timestamped_path(
                &self.files.log_dir,
                &self.files.base_name,
                now,
            ));
        }

        match self.logging.log_file.as_deref() {
            Some("") => LogDestination::Disabled,
            Some(path) => LogDestination::Fixed(PathBuf::from(path)),
            None => LogDestination::Fixed(files::fixed_path(
                &self.files.log_dir,
                &self.files.base_name,
            )),
        }
    }

    /// Get the retention age as a chrono duration.
    #[must_use]
    pub fn max_age(&self) -> Option<chrono::Duration> {
        if self.files.retention_days == 0 {
            None
        } else {
            Some(chrono::Duration::days(i64::from(self.files.retention_days)))
        }
    }
}
