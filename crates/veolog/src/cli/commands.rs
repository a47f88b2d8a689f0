//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Args, Subcommand, ValueEnum};

use crate::error::Result;
use crate::filter::{parse_time_bound, LogFilter};
use crate::level::LogLevel;
use crate::tag::LogTag;

/// Record filters shared by `search` and `tail`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only records with this tag (repeatable), e.g. `api` or `post-data`
    #[arg(short, long = "tag", value_name = "TAG", value_parser = parse_tag)]
    pub tags: Vec<LogTag>,

    /// Minimum level
    #[arg(short, long, value_parser = parse_level)]
    pub level: Option<LogLevel>,

    /// Logger name prefix
    #[arg(long, value_name = "PREFIX")]
    pub logger: Option<String>,

    /// Records at or after this time ("2026-01-16", "2026-01-16 13:00:00", "2h")
    #[arg(long)]
    pub since: Option<String>,

    /// Records at or before this time
    #[arg(long)]
    pub until: Option<String>,

    /// Only records carrying an error trace
    #[arg(long)]
    pub traces: bool,
}

impl FilterArgs {
    /// Build the record filter, resolving relative times against `now`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid pattern or time bound.
    pub fn to_filter(&self, pattern: Option<&str>, now: NaiveDateTime) -> Result<LogFilter> {
        let mut filter = LogFilter::new();
        for tag in &self.tags {
            filter = filter.tag(*tag);
        }
        if let Some(level) = self.level {
            filter = filter.min_level(level);
        }
        if let Some(logger) = &self.logger {
            filter = filter.logger(logger.as_str());
        }
        if let Some(pattern) = pattern {
            filter = filter.pattern(pattern)?;
        }

        let since = self
            .since
            .as_deref()
            .map(|text| parse_time_bound(text, now))
            .transpose()?;
        let until = self
            .until
            .as_deref()
            .map(|text| parse_time_bound(text, now))
            .transpose()?;
        filter = filter.between(since, until);

        if self.traces {
            filter = filter.traces_only();
        }
        Ok(filter)
    }
}

/// Which log files a command reads.
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Read this file instead of the newest log file
    #[arg(long, value_name = "FILE", conflicts_with = "all")]
    pub file: Option<PathBuf>,

    /// Read every log file, oldest first
    #[arg(long)]
    pub all: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Regex searched in messages and their traces
    pub pattern: Option<String>,

    /// Record filters
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Files to read
    #[command(flatten)]
    pub source: SourceArgs,

    /// Show at most this many records (the most recent ones)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Tail command arguments.
#[derive(Debug, Args)]
pub struct TailCommand {
    /// Number of records to show
    #[arg(short = 'n', long, default_value = "20")]
    pub lines: usize,

    /// Keep printing records as they are written
    #[arg(short, long)]
    pub follow: bool,

    /// Record filters
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Read this file instead of the newest log file
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Poll interval while following
    #[arg(long, default_value = "500", value_name = "MS")]
    pub interval_ms: u64,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Files to read
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Clean command arguments.
#[derive(Debug, Args)]
pub struct CleanCommand {
    /// Keep this many newest files (overrides `keep_latest`)
    #[arg(long, value_name = "N")]
    pub keep: Option<usize>,

    /// Remove files older than this many days (overrides `retention_days`)
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<u32>,

    /// Show what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Emit command arguments.
#[derive(Debug, Args)]
pub struct EmitCommand {
    /// Message to log
    pub message: String,

    /// Level to log at
    #[arg(short, long, default_value = "info", value_parser = parse_level)]
    pub level: LogLevel,

    /// Tag to prefix the message with
    #[arg(short, long, value_parser = parse_tag)]
    pub tag: Option<LogTag>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Log lines as written
    #[default]
    Plain,
    /// One JSON object per record
    Json,
}

fn parse_tag(value: &str) -> std::result::Result<LogTag, String> {
    value.parse().map_err(|e: crate::Error| e.to_string())
}

fn parse_level(value: &str) -> std::result::Result<LogLevel, String> {
    value.parse().map_err(|e: crate::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 16)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_parse_tag_and_level() {
        assert_eq!(parse_tag("post-data"), Ok(LogTag::PostData));
        assert_eq!(parse_tag("[API]"), Ok(LogTag::Api));
        assert!(parse_tag("bogus").is_err());

        assert_eq!(parse_level("warning"), Ok(LogLevel::Warning));
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_empty_filter_args() {
        let filter = FilterArgs::default().to_filter(None, now()).unwrap();
        assert!(filter.tags.is_empty());
        assert!(filter.min_level.is_none());
        assert!(filter.pattern.is_none());
        assert!(filter.since.is_none());
        assert!(!filter.traces_only);
    }

    #[test]
    fn test_filter_args_to_filter() {
        let args = FilterArgs {
            tags: vec![LogTag::Api, LogTag::Status],
            level: Some(LogLevel::Warning),
            logger: Some("services".into()),
            since: Some("2h".into()),
            until: Some("2026-01-16".into()),
            traces: true,
        };

        let filter = args.to_filter(Some("deck"), now()).unwrap();
        assert_eq!(filter.tags, vec![LogTag::Api, LogTag::Status]);
        assert_eq!(filter.min_level, Some(LogLevel::Warning));
        assert_eq!(filter.logger.as_deref(), Some("services"));
        assert_eq!(filter.since.unwrap().to_string(), "2026-01-16 10:00:00");
        assert_eq!(filter.until.unwrap().to_string(), "2026-01-16 00:00:00");
        assert!(filter.traces_only);
        assert!(filter.pattern.is_some());
    }

    #[test]
    fn test_filter_args_invalid_time() {
        let args = FilterArgs {
            since: Some("last tuesday".into()),
            ..FilterArgs::default()
        };
        assert!(matches!(
            args.to_filter(None, now()),
            Err(crate::Error::InvalidTime(_))
        ));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
