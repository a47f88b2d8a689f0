//! The log line layout.
//!
//! Every line is `YYYY-MM-DD HH:MM:SS - <logger> - <LEVEL> - <message>`,
//! local time, second precision. The logger is the event's tracing target.
//! Structured fields other than the message are appended as `key=value`.

use std::fmt::{self, Write as _};

use chrono::{Local, NaiveDateTime};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::level::{LogLevel, CRITICAL_FIELD};
use crate::record::LINE_TIMESTAMP_FORMAT;

/// Render one log line (without trailing newline).
#[must_use]
pub fn format_line(timestamp: NaiveDateTime, logger: &str, level: LogLevel, message: &str) -> String {
    format!(
        "{} - {logger} - {level} - {message}",
        timestamp.format(LINE_TIMESTAMP_FORMAT)
    )
}

/// `FormatEvent` implementation producing the service's line layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let level = LogLevel::from_event(metadata.level(), visitor.critical);
        let line = format_line(
            Local::now().naive_local(),
            metadata.target(),
            level,
            &visitor.into_message(),
        );
        writeln!(writer, "{line}")
    }
}

/// Whether an event was recorded with `critical = true`.
pub(crate) fn is_critical(event: &Event<'_>) -> bool {
    let mut visitor = CriticalVisitor(false);
    event.record(&mut visitor);
    visitor.0
}

struct CriticalVisitor(bool);

impl Visit for CriticalVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == CRITICAL_FIELD {
            self.0 = value;
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

/// Collects the message and extra fields of an event.
#[derive(Debug, Default)]
struct MessageVisitor {
    message: String,
    fields: String,
    critical: bool,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }

    fn into_message(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == CRITICAL_FIELD {
            self.critical = value;
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
