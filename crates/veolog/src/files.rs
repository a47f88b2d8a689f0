//! Locating and rotating log files.
//!
//! With timestamped logs every process start writes its own
//! `<base>_<YYYYMMDD>_<HHMMSS>.log`. A second start within the same second
//! gets a `-2`, `-3`, ... suffix so an earlier run is never overwritten.
//! Without timestamps everything goes to `<base>.log`.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// `strftime` layout embedded in timestamped file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A log file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// Process start time parsed from the file name, if timestamped.
    pub started_at: Option<NaiveDateTime>,
    /// Collision suffix (`-2`), 1 when absent.
    pub sequence: u32,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time, local.
    pub modified: NaiveDateTime,
}

impl LogFile {
    /// The time this file is ordered by: its start time, else its mtime.
    #[must_use]
    pub fn sort_time(&self) -> NaiveDateTime {
        self.started_at.unwrap_or(self.modified)
    }

    /// File name for display.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn cmp_age(&self, other: &Self) -> Ordering {
        self.sort_time()
            .cmp(&other.sort_time())
            .then(self.sequence.cmp(&other.sequence))
            .then_with(|| self.path.cmp(&other.path))
    }
}

/// File name for a process started at `at`, e.g. `app_20260116_133925.log`.
#[must_use]
pub fn timestamped_file_name(base: &str, at: NaiveDateTime) -> String {
    format!("{base}_{}.log", at.format(FILE_TIMESTAMP_FORMAT))
}

/// `<dir>/<base>_<YYYYMMDD>_<HHMMSS>.log`.
#[must_use]
pub fn timestamped_path(dir: &Path, base: &str, at: NaiveDateTime) -> PathBuf {
    dir.join(timestamped_file_name(base, at))
}

/// `<dir>/<base>.log`, the file used when timestamps are off.
#[must_use]
pub fn fixed_path(dir: &Path, base: &str) -> PathBuf {
    dir.join(format!("{base}.log"))
}

/// `path` itself for sequence 1, else its `<stem>-N.log` sibling.
#[must_use]
pub fn numbered_path(path: &Path, sequence: u32) -> PathBuf {
    if sequence <= 1 {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}-{sequence}{ext}"))
}

fn name_pattern(base: &str) -> Regex {
    let pattern = format!(r"^{}_(\d{{8}}_\d{{6}})(?:-(\d+))?\.log$", regex::escape(base));
    // The base is escaped, so the pattern is always valid.
    Regex::new(&pattern).unwrap_or_else(|_| unreachable!("escaped log file pattern"))
}

/// Parse the start time and collision suffix from a timestamped file name.
#[must_use]
pub fn parse_file_name(file_name: &str, base: &str) -> Option<(NaiveDateTime, u32)> {
    match_name(&name_pattern(base), file_name)
}

fn match_name(pattern: &Regex, file_name: &str) -> Option<(NaiveDateTime, u32)> {
    let caps = pattern.captures(file_name)?;
    let started = NaiveDateTime::parse_from_str(&caps[1], FILE_TIMESTAMP_FORMAT).ok()?;
    let sequence = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);
    Some((started, sequence))
}

/// Parse only the start time from a timestamped file name.
#[must_use]
pub fn parse_started_at(file_name: &str, base: &str) -> Option<NaiveDateTime> {
    parse_file_name(file_name, base).map(|(started, _)| started)
}

/// List the log files for `base` in `dir`, oldest first.
///
/// Both timestamped files and the fixed `<base>.log` are included.
///
/// # Errors
///
/// Returns an error if `dir` does not exist or cannot be read.
pub fn discover(dir: &Path, base: &str) -> Result<Vec<LogFile>> {
    if !dir.is_dir() {
        return Err(Error::LogDirMissing {
            path: dir.to_path_buf(),
        });
    }

    let pattern = name_pattern(base);
    let fixed_name = format!("{base}.log");
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();

        let parsed = match_name(&pattern, &file_name);
        if parsed.is_none() && file_name != fixed_name {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified: DateTime<Local> = metadata.modified()?.into();

        files.push(LogFile {
            path: entry.path(),
            started_at: parsed.map(|(started, _)| started),
            sequence: parsed.map_or(1, |(_, sequence)| sequence),
            size: metadata.len(),
            modified: modified.naive_local(),
        });
    }

    files.sort_by(LogFile::cmp_age);
    debug!(dir = %dir.display(), count = files.len(), "Discovered log files");
    Ok(files)
}

/// The newest log file for `base` in `dir`.
///
/// # Errors
///
/// Returns an error if the directory is missing or holds no log files.
pub fn latest(dir: &Path, base: &str) -> Result<LogFile> {
    discover(dir, base)?
        .pop()
        .ok_or_else(|| Error::NoLogFiles {
            path: dir.to_path_buf(),
        })
}

/// Select the files `clean` would remove.
///
/// A file is pruned when it falls outside the newest `keep_latest` files
/// (0 keeps all) or is older than `max_age`. The newest file is always kept
/// because a running process may still be writing it.
#[must_use]
pub fn plan_prune(
    files: &[LogFile],
    keep_latest: usize,
    max_age: Option<chrono::Duration>,
    now: NaiveDateTime,
) -> Vec<LogFile> {
    let Some(newest_index) = files.len().checked_sub(1) else {
        return Vec::new();
    };

    files
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != newest_index)
        .filter(|(index, file)| {
            let beyond_keep = keep_latest > 0 && files.len() - index > keep_latest;
            let too_old = max_age.is_some_and(|age| now - file.sort_time() > age);
            beyond_keep || too_old
        })
        .map(|(_, file)| file.clone())
        .collect()
}

/// Outcome of a prune run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Files removed (or that would be removed on a dry run).
    pub removed: Vec<PathBuf>,
    /// Bytes freed.
    pub bytes: u64,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Remove the planned files.
///
/// # Errors
///
/// Returns an error on the first file that cannot be removed.
pub fn prune(plan: &[LogFile], dry_run: bool) -> Result<PruneReport> {
    let mut report = PruneReport {
        dry_run,
        ..PruneReport::default()
    };

    for file in plan {
        if !dry_run {
            fs::remove_file(&file.path).map_err(|source| Error::FileRemove {
                path: file.path.clone(),
                source,
            })?;
            info!(path = %file.path.display(), "Removed old log file");
        }
        report.removed.push(file.path.clone());
        report.bytes += file.size;
    }

    Ok(report)
}
