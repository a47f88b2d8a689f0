//! Severity levels as they appear in log lines.
//!
//! The log format uses five level names (`DEBUG`, `INFO`, `WARNING`, `ERROR`,
//! `CRITICAL`). `tracing` has no critical level, so critical events are
//! emitted at `ERROR` with a `critical = true` field; see [`critical!`](crate::critical).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::level_filters::LevelFilter;
use tracing::Level;

use crate::config::ScalarText;
use crate::error::Error;

/// Name of the event field that marks an `ERROR` event as `CRITICAL`.
pub const CRITICAL_FIELD: &str = "critical";

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    /// Diagnostic detail (`[QUERY]`, `[POST DATA]`, polling chatter).
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Something unexpected that the service recovered from.
    Warning,
    /// A failed operation.
    Error,
    /// A failure that stops the service.
    Critical,
}

impl LogLevel {
    /// All levels, least severe first.
    pub const ALL: [LogLevel; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// The upper-case name written in log lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parse an environment value the way the service always has:
    /// case-insensitive, unknown names fall back to `INFO`.
    #[must_use]
    pub fn from_env_value(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// The `tracing` filter that lets this level and everything above through.
    #[must_use]
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warning => LevelFilter::WARN,
            Self::Error | Self::Critical => LevelFilter::ERROR,
        }
    }

    /// Map a `tracing` event level to the name written in the log line.
    #[must_use]
    pub fn from_event(level: &Level, critical: bool) -> Self {
        match *level {
            Level::ERROR if critical => Self::Critical,
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warning,
            Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" | "FATAL" => Ok(Self::Critical),
            _ => Err(Error::UnknownLevel(s.to_string())),
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = ScalarText::deserialize(deserializer)?.into_string();
        Ok(Self::from_env_value(&value))
    }
}
