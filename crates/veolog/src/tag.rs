//! Message tags.
//!
//! Every interesting event the service logs starts its message with a
//! bracketed tag such as `[API]`. Tags are what people grep for, so they are
//! a closed set with a fixed spelling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A recognized message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTag {
    /// A page template was rendered.
    Page,
    /// An HTTP request arrived.
    Request,
    /// An HTTP response was sent.
    Response,
    /// An API endpoint did something worth recording.
    Api,
    /// A generation task or deck changed status.
    Status,
    /// Query parameters of a request.
    Query,
    /// Sanitized JSON body of a POST request.
    PostData,
    /// A request failed.
    Error,
}

impl LogTag {
    /// All tags in catalog order.
    pub const ALL: [LogTag; 8] = [
        Self::Page,
        Self::Request,
        Self::Response,
        Self::Api,
        Self::Status,
        Self::Query,
        Self::PostData,
        Self::Error,
    ];

    /// The bracketed label that prefixes messages, e.g. `[POST DATA]`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Page => "[PAGE]",
            Self::Request => "[REQUEST]",
            Self::Response => "[RESPONSE]",
            Self::Api => "[API]",
            Self::Status => "[STATUS]",
            Self::Query => "[QUERY]",
            Self::PostData => "[POST DATA]",
            Self::Error => "[ERROR]",
        }
    }

    /// The tag name without brackets, e.g. `POST DATA`.
    #[must_use]
    pub fn name(self) -> &'static str {
        let label = self.label();
        &label[1..label.len() - 1]
    }

    /// What the tag is used for.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Page => "page template rendered",
            Self::Request => "incoming request: method, path, client address, user agent",
            Self::Response => "outgoing response: status code and duration",
            Self::Api => "API operation (uploads, generation, deck changes)",
            Self::Status => "generation task or deck status change",
            Self::Query => "request query parameters (DEBUG)",
            Self::PostData => "sanitized JSON request body (DEBUG)",
            Self::Error => "failed request with error trace",
        }
    }

    /// Find the tag a message starts with, ignoring leading whitespace.
    #[must_use]
    pub fn detect(message: &str) -> Option<Self> {
        let message = message.trim_start();
        if !message.starts_with('[') {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|tag| message.starts_with(tag.label()))
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LogTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .replace(['-', '_'], " ")
            .to_ascii_uppercase();

        Self::ALL
            .into_iter()
            .find(|tag| tag.name() == name)
            .ok_or_else(|| Error::UnknownTag(s.to_string()))
    }
}

/// Emit a tracing event whose message starts with a [`LogTag`] label.
///
/// ```
/// use veolog::{tagged, LogTag};
/// use tracing::Level;
///
/// let deck_id = "0b6f3c1e-9a4d";
/// tagged!(Level::INFO, LogTag::Api, "Deck created - ID: {}", veolog::sanitize::short_id(deck_id));
/// ```
#[macro_export]
macro_rules! tagged {
    ($level:expr, $tag:expr, $($arg:tt)+) => {
        $crate::__tracing::event!(
            $level,
            "{} {}",
            $tag,
            ::std::format_args!($($arg)+)
        )
    };
}

/// Emit an event that is written with the `CRITICAL` level name.
///
/// ```
/// veolog::critical!("Configuration error: {}", "VEO_API_KEY is missing");
/// ```
#[macro_export]
macro_rules! critical {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::__tracing::error!(target: $target, critical = true, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__tracing::error!(critical = true, $($arg)+)
    };
}
