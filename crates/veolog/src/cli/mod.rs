//! Command-line interface for veolog.
//!
//! This module provides the CLI structure for the `veolog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CleanCommand, ConfigCommand, EmitCommand, FilterArgs, ListCommand, OutputFormat,
    SearchCommand, SourceArgs, StatsCommand, TailCommand,
};

use crate::logging::Verbosity;

/// veolog - Inspect and maintain the service's log files
///
/// Finds the log files written by the Veo Video Generation service, searches
/// and follows them by tag, level and time, summarizes request traffic, and
/// prunes old files.
#[derive(Debug, Parser)]
#[command(name = "veolog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the file the current configuration logs to
    Path,

    /// List log files, oldest first
    List(ListCommand),

    /// Print the newest log file
    Latest,

    /// Search log records
    Search(SearchCommand),

    /// Show the last records, optionally following new ones
    Tail(TailCommand),

    /// Summarize log records
    Stats(StatsCommand),

    /// Remove old log files
    Clean(CleanCommand),

    /// List the message tags
    Tags,

    /// Write a message through the configured logging pipeline
    Emit(EmitCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}
