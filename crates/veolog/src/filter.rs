//! Selecting log records.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::{Error, Result};
use crate::level::LogLevel;
use crate::record::LogRecord;
use crate::tag::LogTag;

/// Criteria a record must meet. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Accept only these tags (any of them). Empty accepts all.
    pub tags: Vec<LogTag>,
    /// Minimum severity.
    pub min_level: Option<LogLevel>,
    /// Logger name prefix, e.g. `services` matches `services.video_service`.
    pub logger: Option<String>,
    /// Regex searched in the message and its continuation lines.
    pub pattern: Option<Regex>,
    /// Inclusive lower time bound.
    pub since: Option<NaiveDateTime>,
    /// Inclusive upper time bound.
    pub until: Option<NaiveDateTime>,
    /// Accept only records carrying an error trace.
    pub traces_only: bool,
}

impl LogFilter {
    /// Create a filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an accepted tag.
    #[must_use]
    pub fn tag(mut self, tag: LogTag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Set the minimum level.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    /// Set the logger prefix.
    #[must_use]
    pub fn logger(mut self, prefix: impl Into<String>) -> Self {
        self.logger = Some(prefix.into());
        self
    }

    /// Set the search pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Set the time window.
    #[must_use]
    pub fn between(mut self, since: Option<NaiveDateTime>, until: Option<NaiveDateTime>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    /// Only accept records with continuation lines.
    #[must_use]
    pub fn traces_only(mut self) -> Self {
        self.traces_only = true;
        self
    }

    /// Check a record against every criterion.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        if !self.tags.is_empty() && !record.tag.is_some_and(|tag| self.tags.contains(&tag)) {
            return false;
        }
        if self.min_level.is_some_and(|min| record.level < min) {
            return false;
        }
        if let Some(prefix) = &self.logger {
            if !logger_matches(&record.logger, prefix) {
                return false;
            }
        }
        if self.since.is_some_and(|since| record.timestamp < since) {
            return false;
        }
        if self.until.is_some_and(|until| record.timestamp > until) {
            return false;
        }
        if self.traces_only && !record.has_trace() {
            return false;
        }
        if let Some(pattern) = &self.pattern {
            let hit = pattern.is_match(&record.message)
                || record.continuation.iter().any(|line| pattern.is_match(line));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// `services` matches `services`, `services.video_service` and
/// `services::video`, but not `servicesx`.
fn logger_matches(logger: &str, prefix: &str) -> bool {
    match logger.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.') || rest.starts_with("::"),
        None => false,
    }
}

/// Parse a time bound for `--since` / `--until`.
///
/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS`, or an age relative to `now` such as `45s`, `15m`,
/// `2h` or `7d`.
///
/// # Errors
///
/// Returns [`Error::InvalidTime`] if the text matches none of these forms.
pub fn parse_time_bound(text: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let text = text.trim();
    let invalid = || Error::InvalidTime(text.to_string());

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(at);
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0).ok_or_else(invalid);
    }

    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (amount, unit) = text.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    let age = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => None,
    }
    .ok_or_else(invalid)?;

    now.checked_sub_signed(age).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_header;

    fn record(line: &str) -> LogRecord {
        parse_header(line).unwrap()
    }

    fn at(hour: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 16)
            .unwrap()
            .and_hms_opt(hour, min, sec)
            .unwrap()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let r = record("2026-01-16 13:39:25 - app - DEBUG - anything");
        assert!(LogFilter::new().matches(&r));
    }

    #[test]
    fn test_tag_filter() {
        let api = record("2026-01-16 13:39:25 - app - INFO - [API] Fetching all decks");
        let status = record("2026-01-16 13:39:25 - app - INFO - [STATUS] Deck status updated");
        let plain = record("2026-01-16 13:39:25 - app - INFO - Logging to: x");

        let filter = LogFilter::new().tag(LogTag::Api).tag(LogTag::Api);
        assert_eq!(filter.tags.len(), 1);
        assert!(filter.matches(&api));
        assert!(!filter.matches(&status));
        assert!(!filter.matches(&plain));

        let filter = filter.tag(LogTag::Status);
        assert!(filter.matches(&status));
    }

    #[test]
    fn test_min_level() {
        let debug = record("2026-01-16 13:39:25 - app - DEBUG - d");
        let error = record("2026-01-16 13:39:25 - app - ERROR - e");
        let filter = LogFilter::new().min_level(LogLevel::Warning);
        assert!(!filter.matches(&debug));
        assert!(filter.matches(&error));
    }

    #[test]
    fn test_logger_prefix() {
        assert!(logger_matches("services.video_service", "services"));
        assert!(logger_matches("veolog::request", "veolog"));
        assert!(logger_matches("app", "app"));
        assert!(!logger_matches("application", "app"));
        assert!(!logger_matches("app", "services"));

        let r = record("2026-01-16 13:39:25 - services.deck_service - INFO - Added card");
        assert!(LogFilter::new().logger("services").matches(&r));
        assert!(!LogFilter::new().logger("app").matches(&r));
    }

    #[test]
    fn test_time_window() {
        let r = record("2026-01-16 13:39:25 - app - INFO - x");
        assert!(LogFilter::new()
            .between(Some(at(13, 39, 25)), Some(at(13, 39, 25)))
            .matches(&r));
        assert!(!LogFilter::new().between(Some(at(13, 40, 0)), None).matches(&r));
        assert!(!LogFilter::new().between(None, Some(at(13, 0, 0))).matches(&r));
    }

    #[test]
    fn test_pattern_searches_continuation() {
        let mut r = record("2026-01-16 13:39:31 - app - ERROR - [ERROR] GET /x | Error: boom");
        r.continuation.push("TimeoutError: upstream timed out".to_string());

        assert!(LogFilter::new().pattern("Timeout").unwrap().matches(&r));
        assert!(LogFilter::new().pattern(r"GET /x").unwrap().matches(&r));
        assert!(!LogFilter::new().pattern("POST").unwrap().matches(&r));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            LogFilter::new().pattern("[oops"),
            Err(Error::Pattern(_))
        ));
    }

    #[test]
    fn test_traces_only() {
        let mut r = record("2026-01-16 13:39:31 - app - ERROR - failed");
        let filter = LogFilter::new().traces_only();
        assert!(!filter.matches(&r));
        r.continuation.push("Traceback".to_string());
        assert!(filter.matches(&r));
    }

    #[test]
    fn test_parse_time_bound_absolute() {
        let now = at(20, 0, 0);
        assert_eq!(
            parse_time_bound("2026-01-16 13:39:25", now).unwrap(),
            at(13, 39, 25)
        );
        assert_eq!(
            parse_time_bound("2026-01-16T13:39:25", now).unwrap(),
            at(13, 39, 25)
        );
        assert_eq!(parse_time_bound("2026-01-16", now).unwrap(), at(0, 0, 0));
    }

    #[test]
    fn test_parse_time_bound_relative() {
        let now = at(20, 0, 0);
        assert_eq!(parse_time_bound("30s", now).unwrap(), at(19, 59, 30));
        assert_eq!(parse_time_bound("15m", now).unwrap(), at(19, 45, 0));
        assert_eq!(parse_time_bound("2h", now).unwrap(), at(18, 0, 0));
        assert_eq!(
            parse_time_bound("1d", now).unwrap(),
            at(20, 0, 0) - Duration::days(1)
        );
    }

    #[test]
    fn test_parse_time_bound_invalid() {
        let now = at(20, 0, 0);
        for text in ["", "yesterday", "5w", "h", "2026-01-16 25:00:00", "12"] {
            assert!(
                matches!(parse_time_bound(text, now), Err(Error::InvalidTime(_))),
                "{text} should be rejected"
            );
        }
    }
}
