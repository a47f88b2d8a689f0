//! `veolog` - CLI for the Veo Video Generation service's logs
//!
//! This binary finds, searches, follows, summarizes and prunes the log files
//! written by the service's logging pipeline.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info, warn};

use veolog::cli::{
    CleanCommand, Cli, Command, ConfigCommand, EmitCommand, ListCommand, OutputFormat,
    SearchCommand, SourceArgs, StatsCommand, TailCommand,
};
use veolog::files;
use veolog::follow::{read_tail, tail_records, Follower};
use veolog::record::read_records;
use veolog::request::APP_TARGET;
use veolog::{critical, init_cli_logging, init_logging, Config, LogLevel, LogRecord, LogStats, LogTag};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // `emit` installs the service pipeline instead.
    if !matches!(cli.command, Command::Emit(_)) {
        init_cli_logging(cli.verbosity());
    }

    let config_path = cli.config;
    let load = || Config::load_from(config_path.clone()).context("failed to load configuration");

    match cli.command {
        Command::Path => {
            handle_path(&load()?);
            Ok(())
        }
        Command::List(list_cmd) => handle_list(&load()?, &list_cmd),
        Command::Latest => handle_latest(&load()?),
        Command::Search(search_cmd) => handle_search(&load()?, &search_cmd),
        Command::Tail(tail_cmd) => handle_tail(&load()?, &tail_cmd),
        Command::Stats(stats_cmd) => handle_stats(&load()?, &stats_cmd),
        Command::Clean(clean_cmd) => handle_clean(&load()?, &clean_cmd),
        Command::Tags => {
            handle_tags();
            Ok(())
        }
        Command::Emit(emit_cmd) => handle_emit(&load()?, &emit_cmd),
        Command::Config(config_cmd) => handle_config(config_path.clone(), config_cmd),
    }
}

fn handle_path(config: &Config) {
    match config.destination(Local::now().naive_local()).path() {
        Some(path) => println!("{}", path.display()),
        None => println!("disabled"),
    }
}

fn handle_list(config: &Config, cmd: &ListCommand) -> Result<()> {
    let log_files = files::discover(&config.files.log_dir, &config.files.base_name)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&log_files)?);
        return Ok(());
    }

    if log_files.is_empty() {
        println!("No log files in {}", config.files.log_dir.display());
        return Ok(());
    }
    for file in &log_files {
        let started = file
            .started_at
            .map_or_else(|| "-".to_string(), |at| at.to_string());
        println!(
            "{:<40} {:<19}  {:>10}",
            file.file_name(),
            started,
            format_size(file.size)
        );
    }
    Ok(())
}

fn handle_latest(config: &Config) -> Result<()> {
    let latest = files::latest(&config.files.log_dir, &config.files.base_name)?;
    println!("{}", latest.path.display());
    Ok(())
}

fn handle_search(config: &Config, cmd: &SearchCommand) -> Result<()> {
    let filter = cmd
        .filters
        .to_filter(cmd.pattern.as_deref(), Local::now().naive_local())?;

    let mut matches = Vec::new();
    for path in sources(config, &cmd.source)? {
        debug!(path = %path.display(), "Searching log file");
        matches.extend(read_records(&path)?.into_iter().filter(|r| filter.matches(r)));
    }

    if let Some(limit) = cmd.limit {
        let skip = matches.len().saturating_sub(limit);
        matches.drain(..skip);
    }

    let mut out = io::stdout().lock();
    for record in &matches {
        write_record(&mut out, record, cmd.format)?;
    }
    Ok(())
}

fn handle_tail(config: &Config, cmd: &TailCommand) -> Result<()> {
    let filter = cmd.filters.to_filter(None, Local::now().naive_local())?;
    let path = match &cmd.file {
        Some(path) => path.clone(),
        None => files::latest(&config.files.log_dir, &config.files.base_name)?.path,
    };

    if !cmd.follow {
        let mut out = io::stdout().lock();
        for record in tail_records(&path, cmd.lines, &filter)? {
            write_record(&mut out, &record, cmd.format)?;
        }
        return Ok(());
    }

    let tail = read_tail(&path, cmd.lines, &filter)?;
    {
        let mut out = io::stdout().lock();
        for record in &tail.records {
            write_record(&mut out, record, cmd.format)?;
        }
    }

    let mut follower = Follower::new(&path, filter)
        .resume(tail)
        .interval(Duration::from_millis(cmd.interval_ms));
    if cmd.file.is_none() {
        follower = follower.switch_to_newer(&config.files.log_dir, &config.files.base_name);
    }

    let format = cmd.format;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        info!(path = %follower.path().display(), "Following log file");
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };
        follower
            .run(
                |record| {
                    if let Err(e) = write_record(&mut io::stdout().lock(), record, format) {
                        debug!("Failed to write record: {e}");
                    }
                },
                shutdown,
            )
            .await
    })?;
    Ok(())
}

fn handle_stats(config: &Config, cmd: &StatsCommand) -> Result<()> {
    let mut stats = LogStats::default();
    for path in sources(config, &cmd.source)? {
        for record in read_records(&path)? {
            stats.add(&record);
        }
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{stats}");
    }
    Ok(())
}

fn handle_clean(config: &Config, cmd: &CleanCommand) -> Result<()> {
    let log_files = match files::discover(&config.files.log_dir, &config.files.base_name) {
        Ok(found) => found,
        Err(e) if e.is_missing_logs() => {
            println!("Nothing to clean: {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let keep = cmd.keep.unwrap_or(config.files.keep_latest);
    let max_age = match cmd.older_than {
        Some(0) => None,
        Some(days) => Some(chrono::Duration::days(i64::from(days))),
        None => config.max_age(),
    };

    let plan = files::plan_prune(&log_files, keep, max_age, Local::now().naive_local());
    let report = files::prune(&plan, cmd.dry_run)?;

    let verb = if report.dry_run { "Would remove" } else { "Removed" };
    for path in &report.removed {
        println!("{verb} {}", path.display());
    }
    println!(
        "{verb} {} file(s), {}",
        report.removed.len(),
        format_size(report.bytes)
    );
    Ok(())
}

fn handle_tags() {
    for tag in LogTag::ALL {
        println!("{:<12} {}", tag.label(), tag.description());
    }
}

fn handle_emit(config: &Config, cmd: &EmitCommand) -> Result<()> {
    let handle = init_logging(config)?;
    if !handle.is_installed() {
        anyhow::bail!("a logging subscriber is already installed");
    }

    let text = match cmd.tag {
        Some(tag) => format!("{tag} {}", cmd.message),
        None => cmd.message.clone(),
    };
    match cmd.level {
        LogLevel::Debug => debug!(target: APP_TARGET, "{text}"),
        LogLevel::Info => info!(target: APP_TARGET, "{text}"),
        LogLevel::Warning => warn!(target: APP_TARGET, "{text}"),
        LogLevel::Error => error!(target: APP_TARGET, "{text}"),
        LogLevel::Critical => critical!(target: APP_TARGET, "{text}"),
    }
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Logging]");
                println!("  Level:              {}", config.logging.log_level);
                println!(
                    "  Log file:           {}",
                    config.logging.log_file.as_deref().unwrap_or("(default)")
                );
                println!(
                    "  Timestamped logs:   {}",
                    config.logging.use_timestamped_logs
                );
                println!("  Console:            {}", config.logging.console);
                println!(
                    "  Quiet targets:      {}",
                    config.logging.quiet_targets.join(", ")
                );
                println!();
                println!("[Files]");
                println!("  Log directory:      {}", config.files.log_dir.display());
                println!("  Base name:          {}", config.files.base_name);
                println!("  Retention (days):   {}", config.files.retention_days);
                println!("  Keep latest:        {}", config.files.keep_latest);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(config_path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => anyhow::bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

/// Resolve which files a reading command looks at.
fn sources(config: &Config, source: &SourceArgs) -> Result<Vec<PathBuf>> {
    if let Some(file) = &source.file {
        return Ok(vec![file.clone()]);
    }

    let dir = &config.files.log_dir;
    let base = &config.files.base_name;
    if source.all {
        let all = files::discover(dir, base)?;
        if all.is_empty() {
            return Err(veolog::Error::NoLogFiles { path: dir.clone() }.into());
        }
        Ok(all.into_iter().map(|file| file.path).collect())
    } else {
        Ok(vec![files::latest(dir, base)?.path])
    }
}

fn write_record(out: &mut impl Write, record: &LogRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Plain => writeln!(out, "{record}")?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(record)?)?,
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < KIB * KIB {
        format!("{:.1} KiB", bytes / KIB)
    } else {
        format!("{:.1} MiB", bytes / (KIB * KIB))
    }
}
