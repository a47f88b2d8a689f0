//! Parsing log lines back into records.
//!
//! A record starts with a header line
//! `YYYY-MM-DD HH:MM:SS - <logger> - <LEVEL> - <message>`. Any following
//! line that is not a header (an error trace, a multi-line message) belongs
//! to the record above it.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::level::LogLevel;
use crate::tag::LogTag;

/// `strftime` layout of the timestamp at the start of each line.
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) - (.+?) - (DEBUG|INFO|WARNING|ERROR|CRITICAL) - (.*)$",
        )
        .unwrap_or_else(|_| unreachable!("static header pattern"))
    })
}

/// One log record: a header line plus its continuation lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// When the record was written (local time).
    pub timestamp: NaiveDateTime,
    /// Logger name (the tracing target).
    pub logger: String,
    /// Severity.
    pub level: LogLevel,
    /// First line of the message.
    pub message: String,
    /// Tag the message starts with, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<LogTag>,
    /// Lines following the header, such as an error trace.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub continuation: Vec<String>,
}

impl LogRecord {
    /// Whether the record carries continuation lines (usually an error trace).
    #[must_use]
    pub fn has_trace(&self) -> bool {
        !self.continuation.is_empty()
    }

    /// The message with its continuation lines.
    #[must_use]
    pub fn full_message(&self) -> String {
        let mut text = self.message.clone();
        for line in &self.continuation {
            text.push('\n');
            text.push_str(line);
        }
        text
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {} - {}",
            self.timestamp.format(LINE_TIMESTAMP_FORMAT),
            self.logger,
            self.level,
            self.message
        )?;
        for line in &self.continuation {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

/// Parse a header line. Returns `None` for continuation lines.
#[must_use]
pub fn parse_header(line: &str) -> Option<LogRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    let caps = header_pattern().captures(line)?;

    let timestamp = NaiveDateTime::parse_from_str(&caps[1], LINE_TIMESTAMP_FORMAT).ok()?;
    let level = caps[3].parse().ok()?;
    let message = caps[4].to_string();

    Some(LogRecord {
        timestamp,
        logger: caps[2].to_string(),
        level,
        tag: LogTag::detect(&message),
        message,
        continuation: Vec::new(),
    })
}

/// Incremental parser grouping continuation lines under their header.
#[derive(Debug, Default)]
pub struct RecordParser {
    pending: Option<LogRecord>,
    orphans: usize,
}

impl RecordParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after `pending`, a record that may still get
    /// continuation lines.
    #[must_use]
    pub fn resuming(pending: Option<LogRecord>) -> Self {
        Self {
            pending,
            orphans: 0,
        }
    }

    /// Feed one line. Returns the previous record once a new header
    /// shows it is complete.
    pub fn push_line(&mut self, line: &str) -> Option<LogRecord> {
        if let Some(record) = parse_header(line) {
            return self.pending.replace(record);
        }

        let line = line.trim_end_matches(['\r', '\n']);
        match self.pending.as_mut() {
            Some(record) => record.continuation.push(line.to_string()),
            None if line.trim().is_empty() => {}
            None => self.orphans += 1,
        }
        None
    }

    /// Take the record still being assembled.
    pub fn finish(&mut self) -> Option<LogRecord> {
        self.pending.take()
    }

    /// Whether a record is waiting for more lines.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Non-blank lines seen before the first header.
    #[must_use]
    pub fn orphan_lines(&self) -> usize {
        self.orphans
    }
}

/// Parse every record from a reader.
///
/// # Errors
///
/// Returns an error if reading fails.
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<LogRecord>> {
    let mut parser = RecordParser::new();
    let mut records = Vec::new();

    for line in reader.lines() {
        if let Some(record) = parser.push_line(&line?) {
            records.push(record);
        }
    }
    records.extend(parser.finish());
    Ok(records)
}

/// Parse every record in a log file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    let file = File::open(path).map_err(|source| Error::LogFileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = "\
2026-01-16 13:39:25 - app - INFO - Logging to: logs/app_20260116_133925.log
2026-01-16 13:39:30 - app - INFO - [REQUEST] POST /api/generate-video | IP: 127.0.0.1 | User-Agent: curl/8.5.0
2026-01-16 13:39:30 - app - DEBUG - [POST DATA] {\"model\":\"veo3_fast\"}
2026-01-16 13:39:31 - app - ERROR - [ERROR] POST /api/generate-video | Error: upstream timed out
Traceback (most recent call last):
  File \"app.py\", line 240, in generate_video
TimeoutError: upstream timed out
2026-01-16 13:39:31 - app - INFO - [RESPONSE] POST /api/generate-video | Status: 500 | Duration: 1.204s
";

    #[test]
    fn test_parse_header() {
        let record =
            parse_header("2026-01-16 13:39:25 - services.video_service - WARNING - No video URLs for task 42")
                .unwrap();

        assert_eq!(
            record.timestamp,
            NaiveDate::from_ymd_opt(2026, 1, 16)
                .unwrap()
                .and_hms_opt(13, 39, 25)
                .unwrap()
        );
        assert_eq!(record.logger, "services.video_service");
        assert_eq!(record.level, LogLevel::Warning);
        assert_eq!(record.message, "No video URLs for task 42");
        assert!(record.tag.is_none());
    }

    #[test]
    fn test_parse_header_detects_tag() {
        let record = parse_header("2026-01-16 13:39:25 - app - INFO - [PAGE] Rendering index.html").unwrap();
        assert_eq!(record.tag, Some(LogTag::Page));
    }

    #[test]
    fn test_parse_header_message_may_contain_separator() {
        let record = parse_header(
            "2026-01-16 13:39:25 - services.deck_service - INFO - Created deck: 1234 - Holiday - v2",
        )
        .unwrap();
        assert_eq!(record.logger, "services.deck_service");
        assert_eq!(record.message, "Created deck: 1234 - Holiday - v2");
    }

    #[test]
    fn test_parse_header_rejects_non_headers() {
        assert!(parse_header("Traceback (most recent call last):").is_none());
        assert!(parse_header("2026-01-16 13:39:25 - app - LOUD - nope").is_none());
        assert!(parse_header("2026-13-45 13:39:25 - app - INFO - bad date").is_none());
        assert!(parse_header("").is_none());
    }

    #[test]
    fn test_parse_records_groups_traces() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 5);

        let error = &records[3];
        assert_eq!(error.level, LogLevel::Error);
        assert_eq!(error.tag, Some(LogTag::Error));
        assert!(error.has_trace());
        assert_eq!(error.continuation.len(), 3);
        assert_eq!(error.continuation[2], "TimeoutError: upstream timed out");

        assert!(!records[4].has_trace());
        assert_eq!(records[4].tag, Some(LogTag::Response));
    }

    #[test]
    fn test_display_round_trips_lines() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();
        let rendered: Vec<String> = records.iter().map(ToString::to_string).collect();
        assert_eq!(rendered.join("\n") + "\n", SAMPLE);
    }

    #[test]
    fn test_full_message() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();
        let full = records[3].full_message();
        assert!(full.starts_with("[ERROR] POST"));
        assert!(full.ends_with("TimeoutError: upstream timed out"));
    }

    #[test]
    fn test_parser_resuming_attaches_traces() {
        let last = parse_header("2026-01-16 13:39:31 - app - ERROR - [ERROR] GET /x | Error: boom");
        let mut parser = RecordParser::resuming(last);
        assert!(parser.push_line("Caused by: disk full").is_none());
        assert_eq!(parser.orphan_lines(), 0);

        let record = parser.finish().unwrap();
        assert_eq!(record.continuation, vec!["Caused by: disk full"]);
    }

    #[test]
    fn test_parser_counts_orphans() {
        let mut parser = RecordParser::new();
        assert!(parser.push_line("  stray trace line").is_none());
        assert!(parser.push_line("").is_none());
        assert_eq!(parser.orphan_lines(), 1);
        assert!(!parser.has_pending());

        assert!(parser
            .push_line("2026-01-16 13:39:25 - app - INFO - first")
            .is_none());
        assert!(parser.has_pending());

        let done = parser
            .push_line("2026-01-16 13:39:26 - app - INFO - second")
            .unwrap();
        assert_eq!(done.message, "first");
        assert_eq!(parser.finish().unwrap().message, "second");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_parser_strips_carriage_returns() {
        let mut parser = RecordParser::new();
        parser.push_line("2026-01-16 13:39:25 - app - INFO - windows line\r");
        let record = parser.finish().unwrap();
        assert_eq!(record.message, "windows line");
    }

    #[test]
    fn test_read_records_missing_file() {
        let result = read_records(Path::new("/nonexistent/app.log"));
        assert!(matches!(result, Err(Error::LogFileOpen { .. })));
    }

    #[test]
    fn test_record_serializes_without_empty_fields() {
        let record = parse_header("2026-01-16 13:39:25 - app - INFO - plain").unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"level\":\"INFO\""));
        assert!(!json.contains("continuation"));
        assert!(!json.contains("tag"));
    }
}
