//! Request and response logging.
//!
//! These helpers produce the `[REQUEST]`, `[QUERY]`, `[POST DATA]`,
//! `[RESPONSE]`, `[ERROR]` and `[PAGE]` lines for an HTTP service. They take
//! plain request facts instead of a framework type so any server can call
//! them from its middleware.
//!
//! ```
//! use veolog::request::{log_request, RequestInfo};
//!
//! let info = RequestInfo::new("GET", "/api/decks").with_remote_addr("10.0.0.7");
//! let timer = log_request(&info);
//! // ... handle the request ...
//! timer.finish(200);
//! ```

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info};

use crate::sanitize::{sanitize_post_data, truncate_chars, USER_AGENT_LIMIT};
use crate::tag::LogTag;

/// Logger name the service's own lines are written under.
pub const APP_TARGET: &str = "app";

/// Placeholder for a missing client address or user agent.
const UNKNOWN: &str = "Unknown";

/// The facts about an incoming request that get logged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    /// Client address.
    pub remote_addr: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Query parameters.
    pub query: BTreeMap<String, String>,
    /// Parsed JSON body, if the request carried one.
    pub json_body: Option<Value>,
}

impl RequestInfo {
    /// Create request info for a method and path.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the client address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Attach the parsed JSON body.
    #[must_use]
    pub fn with_json_body(mut self, body: Value) -> Self {
        self.json_body = Some(body);
        self
    }

    fn is_post(&self) -> bool {
        self.method.eq_ignore_ascii_case("POST")
    }
}

/// `[REQUEST] <METHOD> <path> | IP: <addr> | User-Agent: <agent>`
#[must_use]
pub fn request_line(info: &RequestInfo) -> String {
    format!(
        "{} {} {} | IP: {} | User-Agent: {}",
        LogTag::Request,
        info.method,
        info.path,
        info.remote_addr.as_deref().unwrap_or(UNKNOWN),
        truncate_chars(info.user_agent.as_deref().unwrap_or(UNKNOWN), USER_AGENT_LIMIT),
    )
}

/// `[QUERY] {...}`, or `None` without query parameters.
#[must_use]
pub fn query_line(info: &RequestInfo) -> Option<String> {
    if info.query.is_empty() {
        return None;
    }
    let rendered = serde_json::to_string(&info.query).ok()?;
    Some(format!("{} {rendered}", LogTag::Query))
}

/// `[POST DATA] {...}` with the sanitized body, or `None` when there is
/// nothing to log (not a POST, no body, or an empty/non-object body).
#[must_use]
pub fn post_data_line(info: &RequestInfo) -> Option<String> {
    if !info.is_post() {
        return None;
    }
    let body = info.json_body.as_ref()?;
    match body {
        Value::Object(fields) if !fields.is_empty() => {
            let rendered = serde_json::to_string(&sanitize_post_data(body)).ok()?;
            Some(format!("{} {rendered}", LogTag::PostData))
        }
        _ => None,
    }
}

/// `[RESPONSE] <METHOD> <path> | Status: <code> | Duration: <secs>s`
#[must_use]
pub fn response_line(method: &str, path: &str, status: u16, elapsed: Duration) -> String {
    format!(
        "{} {method} {path} | Status: {status} | Duration: {:.3}s",
        LogTag::Response,
        elapsed.as_secs_f64()
    )
}

/// `[ERROR] <METHOD> <path> | Error: <message>` followed by one
/// `Caused by:` line per error source.
#[must_use]
pub fn error_line(method: &str, path: &str, err: &(dyn StdError + 'static)) -> String {
    let mut line = format!("{} {method} {path} | Error: {err}", LogTag::Error);
    let mut source = err.source();
    while let Some(cause) = source {
        line.push_str("\nCaused by: ");
        line.push_str(&cause.to_string());
        source = cause.source();
    }
    line
}

/// Log an incoming request and start timing it.
pub fn log_request(info: &RequestInfo) -> RequestTimer {
    info!(target: APP_TARGET, "{}", request_line(info));

    if let Some(line) = query_line(info) {
        debug!(target: APP_TARGET, "{line}");
    }
    if let Some(line) = post_data_line(info) {
        debug!(target: APP_TARGET, "{line}");
    }

    RequestTimer {
        method: info.method.clone(),
        path: info.path.clone(),
        started: Instant::now(),
    }
}

/// Times a request from [`log_request`] until its response is sent.
#[derive(Debug)]
#[must_use = "call finish() to log the response"]
pub struct RequestTimer {
    method: String,
    path: String,
    started: Instant,
}

impl RequestTimer {
    /// Time since the request was logged.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log the response and return the request duration.
    pub fn finish(self, status: u16) -> Duration {
        let elapsed = self.elapsed();
        info!(
            target: APP_TARGET,
            "{}",
            response_line(&self.method, &self.path, status, elapsed)
        );
        elapsed
    }

    /// Log a failed request with its error chain, then its `500` response.
    pub fn fail(self, err: &(dyn StdError + 'static)) -> Duration {
        log_failure(&self.method, &self.path, err);
        self.finish(500)
    }
}

/// Log a failed request with its error chain.
pub fn log_failure(method: &str, path: &str, err: &(dyn StdError + 'static)) {
    error!(target: APP_TARGET, "{}", error_line(method, path, err));
}

/// Log that a page template was rendered.
pub fn log_page(template: &str, description: &str) {
    info!(target: APP_TARGET, "{} Rendering {template} - {description}", LogTag::Page);
}
