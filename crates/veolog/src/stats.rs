//! Summarizing log records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;

use crate::level::LogLevel;
use crate::record::LogRecord;
use crate::tag::LogTag;

fn response_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[RESPONSE\] (\S+) (\S+) \| Status: (\d{3}) \| Duration: (\d+(?:\.\d+)?)s$")
            .unwrap_or_else(|_| unreachable!("static response pattern"))
    })
}

/// The fields of a `[RESPONSE]` line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseLine {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Status code.
    pub status: u16,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl ResponseLine {
    /// Parse a `[RESPONSE] <METHOD> <path> | Status: <code> | Duration: <secs>s`
    /// message.
    #[must_use]
    pub fn parse(message: &str) -> Option<Self> {
        let caps = response_pattern().captures(message.trim_end())?;
        Some(Self {
            method: caps[1].to_string(),
            path: caps[2].to_string(),
            status: caps[3].parse().ok()?,
            duration_secs: caps[4].parse().ok()?,
        })
    }
}

/// Request latency and outcome summary built from `[RESPONSE]` lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseSummary {
    /// Number of responses.
    pub count: usize,
    /// Mean duration in seconds.
    pub mean_secs: f64,
    /// Longest duration in seconds.
    pub max_secs: f64,
    /// `METHOD path` of the slowest response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest: Option<String>,
    /// Responses per status code.
    pub statuses: BTreeMap<u16, usize>,
    #[serde(skip)]
    total_secs: f64,
}

impl ResponseSummary {
    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, response: &ResponseLine) {
        self.count += 1;
        self.total_secs += response.duration_secs;
        self.mean_secs = self.total_secs / self.count as f64;
        if self.slowest.is_none() || response.duration_secs > self.max_secs {
            self.max_secs = response.duration_secs;
            self.slowest = Some(format!("{} {}", response.method, response.path));
        }
        *self.statuses.entry(response.status).or_default() += 1;
    }

    /// Responses with a 5xx status.
    #[must_use]
    pub fn server_errors(&self) -> usize {
        self.statuses.range(500..600).map(|(_, n)| n).sum()
    }
}

/// Counts over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogStats {
    /// Number of records.
    pub total: usize,
    /// Records per level.
    pub levels: BTreeMap<LogLevel, usize>,
    /// Records per tag.
    pub tags: BTreeMap<LogTag, usize>,
    /// Records without a tag.
    pub untagged: usize,
    /// Records carrying continuation lines.
    pub traces: usize,
    /// Earliest record time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<NaiveDateTime>,
    /// Latest record time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<NaiveDateTime>,
    /// Summary of `[RESPONSE]` lines.
    pub responses: ResponseSummary,
}

impl LogStats {
    /// Summarize a sequence of records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.add(record);
        }
        stats
    }

    /// Count one record.
    pub fn add(&mut self, record: &LogRecord) {
        self.total += 1;
        *self.levels.entry(record.level).or_default() += 1;

        match record.tag {
            Some(tag) => *self.tags.entry(tag).or_default() += 1,
            None => self.untagged += 1,
        }
        if record.has_trace() {
            self.traces += 1;
        }

        self.first = Some(self.first.map_or(record.timestamp, |t| t.min(record.timestamp)));
        self.last = Some(self.last.map_or(record.timestamp, |t| t.max(record.timestamp)));

        if record.tag == Some(LogTag::Response) {
            if let Some(response) = ResponseLine::parse(&record.message) {
                self.responses.add(&response);
            }
        }
    }

    /// Records at `level`.
    #[must_use]
    pub fn count(&self, level: LogLevel) -> usize {
        self.levels.get(&level).copied().unwrap_or(0)
    }

    /// Records with `tag`.
    #[must_use]
    pub fn tag_count(&self, tag: LogTag) -> usize {
        self.tags.get(&tag).copied().unwrap_or(0)
    }
}

impl fmt::Display for LogStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records: {}", self.total)?;
        if let (Some(first), Some(last)) = (self.first, self.last) {
            writeln!(f, "Span:    {first} .. {last}")?;
        }

        writeln!(f, "\nBy level:")?;
        for level in LogLevel::ALL {
            writeln!(f, "  {:<10} {}", level.as_str(), self.count(level))?;
        }

        writeln!(f, "\nBy tag:")?;
        for tag in LogTag::ALL {
            writeln!(f, "  {:<12} {}", tag.label(), self.tag_count(tag))?;
        }
        writeln!(f, "  {:<12} {}", "(untagged)", self.untagged)?;
        writeln!(f, "\nWith traces: {}", self.traces)?;

        let responses = &self.responses;
        if responses.count > 0 {
            writeln!(f, "\nResponses: {}", responses.count)?;
            writeln!(f, "  mean {:.3}s, max {:.3}s", responses.mean_secs, responses.max_secs)?;
            if let Some(slowest) = &responses.slowest {
                writeln!(f, "  slowest: {slowest}")?;
            }
            for (status, count) in &responses.statuses {
                writeln!(f, "  {status}: {count}")?;
            }
        }
        Ok(())
    }
}
