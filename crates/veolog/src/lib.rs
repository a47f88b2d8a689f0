//! `veolog` - Logging for the Veo Video Generation service
//!
//! This library provides the service's logging pipeline (one line layout on
//! the console and in per-run log files), tagged request/response logging
//! helpers, and the tools behind the `veolog` binary for finding, searching,
//! following and pruning those log files.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod filter;
pub mod follow;
pub mod format;
pub mod level;
pub mod logging;
pub mod record;
pub mod request;
pub mod sanitize;
pub mod stats;
pub mod tag;

#[cfg(test)]
mod testing;

#[doc(hidden)]
pub use tracing as __tracing;

pub use config::{Config, LogDestination};
pub use error::{Error, Result};
pub use filter::LogFilter;
pub use level::LogLevel;
pub use logging::{init_cli_logging, init_logging, LoggingHandle};
pub use record::LogRecord;
pub use stats::LogStats;
pub use tag::LogTag;
