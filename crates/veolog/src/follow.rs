//! Following a log file as it grows.
//!
//! [`Follower`] polls the file, turns newly appended bytes into records and
//! hands back the ones its filter accepts. A record is only complete once the
//! next header arrives, so a record still waiting for continuation lines is
//! released after one poll with no new data.
//!
//! When the file shrinks it was truncated (the fixed `<base>.log` is
//! truncated at every process start) and reading restarts from the top. With
//! [`Follower::switch_to_newer`], a newer timestamped file appearing in the
//! directory (a restarted process) replaces the followed one.
//!
//! [`Follower::run`] polls on file-change events from the directory and on a
//! fixed interval, which also releases pending records.

use std::collections::VecDeque;
use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::files;
use crate::filter::LogFilter;
use crate::record::{read_records, LogRecord, RecordParser};

/// Default delay between polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Polls a log file for new records.
#[derive(Debug)]
pub struct Follower {
    path: PathBuf,
    filter: LogFilter,
    interval: Duration,
    rotation: Option<(PathBuf, String)>,
    offset: u64,
    partial: Vec<u8>,
    parser: RecordParser,
}

impl Follower {
    /// Follow `path` from its beginning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, filter: LogFilter) -> Self {
        Self {
            path: path.into(),
            filter,
            interval: DEFAULT_INTERVAL,
            rotation: None,
            offset: 0,
            partial: Vec::new(),
            parser: RecordParser::new(),
        }
    }

    /// Skip the first `offset` bytes, e.g. the part already printed.
    #[must_use]
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Continue where [`read_tail`] stopped, with its last record pending.
    #[must_use]
    pub fn resume(mut self, tail: Tail) -> Self {
        self.offset = tail.offset;
        self.parser = RecordParser::resuming(tail.pending);
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Move to newer `<base>` log files appearing in `dir`.
    #[must_use]
    pub fn switch_to_newer(mut self, dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        self.rotation = Some((dir.into(), base.into()));
        self
    }

    /// The file currently followed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read whatever was appended since the last poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub async fn poll(&mut self) -> Result<Vec<LogRecord>> {
        let mut completed = Vec::new();
        let appended = self.read_appended(&mut completed).await?;

        if !appended {
            if let Some(next) = self.newer_file()? {
                completed.extend(self.flush());
                info!(from = %self.path.display(), to = %next.display(), "Switching to newer log file");
                self.path = next;
                self.offset = 0;
                self.read_appended(&mut completed).await?;
            } else {
                completed.extend(self.parser.finish());
            }
        }

        completed.retain(|record| self.filter.matches(record));
        Ok(completed)
    }

    /// Poll until `shutdown` resolves, passing each record to `on_record`.
    ///
    /// Whatever is still buffered is delivered before returning.
    ///
    /// # Errors
    ///
    /// Returns the first read error.
    pub async fn run<F, S>(mut self, mut on_record: F, shutdown: S) -> Result<()>
    where
        F: FnMut(&LogRecord),
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let watch_dir = match &self.rotation {
            Some((dir, _)) => Some(dir.clone()),
            None => self.path.parent().map(|dir| {
                if dir.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    dir.to_path_buf()
                }
            }),
        };
        let mut changes = watch_dir.and_then(|dir| ChangeWatch::new(&dir));

        loop {
            for record in self.poll().await? {
                on_record(&record);
            }

            tokio::select! {
                () = &mut shutdown => break,
                () = ChangeWatch::next(&mut changes) => {}
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        for record in self.flush() {
            if self.filter.matches(&record) {
                on_record(&record);
            }
        }
        Ok(())
    }

    /// Feed new bytes to the parser. Returns false when nothing was appended.
    async fn read_appended(&mut self, completed: &mut Vec<LogRecord>) -> Result<bool> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|source| Error::LogFileOpen {
                path: self.path.clone(),
                source,
            })?;
        let len = file.metadata().await?.len();

        if len < self.offset {
            debug!(path = %self.path.display(), "Log file truncated, reading from start");
            completed.extend(self.flush());
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(false);
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut chunk = Vec::new();
        let read = file.read_to_end(&mut chunk).await?;
        self.offset += read as u64;
        self.partial.extend_from_slice(&chunk);

        while let Some(end) = self.partial.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=end).collect();
            if let Some(record) = self.parser.push_line(&String::from_utf8_lossy(&line)) {
                completed.push(record);
            }
        }
        Ok(true)
    }

    /// Treat a trailing partial line as complete and release every
    /// buffered record.
    fn flush(&mut self) -> Vec<LogRecord> {
        let mut records = Vec::new();
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            records.extend(self.parser.push_line(&String::from_utf8_lossy(&line)));
        }
        records.extend(self.parser.finish());
        records
    }

    fn newer_file(&self) -> Result<Option<PathBuf>> {
        let Some((dir, base)) = &self.rotation else {
            return Ok(None);
        };
        let Some(current) = files::parse_file_name(&file_name(&self.path), base) else {
            return Ok(None);
        };

        let newest = match files::latest(dir, base) {
            Ok(file) => file,
            Err(err) if err.is_missing_logs() => return Ok(None),
            Err(err) => return Err(err),
        };
        let is_newer = newest
            .started_at
            .is_some_and(|started| (started, newest.sequence) > current);
        Ok(is_newer.then_some(newest.path))
    }
}

/// Wakes the poll loop when something in the followed directory changes.
struct ChangeWatch {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<()>,
}

impl ChangeWatch {
    fn new(dir: &Path) -> Option<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let handler = move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    let _ = tx.send(());
                }
            }
        };

        let mut watcher = match notify::recommended_watcher(handler) {
            Ok(watcher) => watcher,
            Err(e) => {
                debug!(error = %e, "File watching unavailable, polling only");
                return None;
            }
        };
        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            debug!(dir = %dir.display(), error = %e, "Cannot watch directory, polling only");
            return None;
        }
        Some(Self {
            _watcher: watcher,
            events,
        })
    }

    /// Resolve on the next change; never when watching is off.
    async fn next(watch: &mut Option<Self>) {
        if let Some(watch) = watch {
            if watch.events.recv().await.is_some() {
                while watch.events.try_recv().is_ok() {}
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The end of a log file, read once to hand over to a [`Follower`].
#[derive(Debug, Clone, Default)]
pub struct Tail {
    /// Complete records accepted by the filter, oldest first.
    pub records: Vec<LogRecord>,
    /// The file's last record, still open for continuation lines.
    pub pending: Option<LogRecord>,
    /// Byte offset just past the last complete line.
    pub offset: u64,
}

/// Read `path` once for `tail -f`: up to `n` records accepted by `filter`,
/// counting the pending last record when it matches.
///
/// A trailing partial line is left after `offset` for the follower.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_tail(path: &Path, n: usize, filter: &LogFilter) -> Result<Tail> {
    let bytes = std::fs::read(path).map_err(|source| Error::LogFileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let complete = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |end| end + 1);

    let mut parser = RecordParser::new();
    let mut kept = VecDeque::with_capacity(n);
    for line in String::from_utf8_lossy(&bytes[..complete]).lines() {
        if let Some(record) = parser.push_line(line) {
            if n > 0 && filter.matches(&record) {
                if kept.len() == n {
                    kept.pop_front();
                }
                kept.push_back(record);
            }
        }
    }

    // Not shown, so its later trace lines have nothing to attach to.
    let pending = parser.finish().filter(|_| n > 0);
    if pending.as_ref().is_some_and(|r| filter.matches(r)) && kept.len() == n {
        kept.pop_front();
    }

    Ok(Tail {
        records: kept.into(),
        pending,
        offset: complete as u64,
    })
}

/// The last `n` records of `path` accepted by `filter`, oldest first.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn tail_records(path: &Path, n: usize, filter: &LogFilter) -> Result<Vec<LogRecord>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut kept = VecDeque::with_capacity(n);

    for record in read_records(path)? {
        if !filter.matches(&record) {
            continue;
        }
        if kept.len() == n {
            kept.pop_front();
        }
        kept.push_back(record);
    }
    Ok(kept.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;

    use tempfile::TempDir;

    use crate::level::LogLevel;

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn messages(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(|r| r.message.as_str()).collect()
    }

    #[tokio::test]
    async fn test_poll_reads_appended_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "2026-01-16 13:39:25 - app - INFO - one\n");

        let mut follower = Follower::new(&path, LogFilter::new());
        // "one" may still get continuation lines, so the first poll holds it.
        assert!(follower.poll().await.unwrap().is_empty());

        append(&path, "2026-01-16 13:39:26 - app - INFO - two\n");
        assert_eq!(messages(&follower.poll().await.unwrap()), vec!["one"]);

        // No new data: the pending record is released.
        assert_eq!(messages(&follower.poll().await.unwrap()), vec!["two"]);
        assert!(follower.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_lines_wait_for_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "2026-01-16 13:39:25 - app - ERROR - fail");

        let mut follower = Follower::new(&path, LogFilter::new());
        assert!(follower.poll().await.unwrap().is_empty());

        append(&path, "ed\nCaused by: disk full\n2026-01-16 13:39:26 - app - INFO - next\n");
        let records = follower.poll().await.unwrap();
        assert_eq!(messages(&records), vec!["failed"]);
        assert_eq!(records[0].continuation, vec!["Caused by: disk full"]);
    }

    #[tokio::test]
    async fn test_truncation_restarts_from_top() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(
            &path,
            "2026-01-16 13:39:25 - app - INFO - a long first run line\n\
             2026-01-16 13:39:26 - app - INFO - another first run line\n",
        );

        let mut follower = Follower::new(&path, LogFilter::new());
        follower.poll().await.unwrap();
        follower.poll().await.unwrap();

        fs::write(&path, "2026-01-16 14:00:00 - app - INFO - restart\n").unwrap();
        let mut seen = follower.poll().await.unwrap();
        seen.extend(follower.poll().await.unwrap());
        assert_eq!(messages(&seen), vec!["restart"]);
    }

    #[tokio::test]
    async fn test_filter_applies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(
            &path,
            "2026-01-16 13:39:25 - app - DEBUG - noise\n\
             2026-01-16 13:39:26 - app - ERROR - boom\n",
        );

        let mut follower =
            Follower::new(&path, LogFilter::new().min_level(LogLevel::Error));
        let mut seen = follower.poll().await.unwrap();
        seen.extend(follower.poll().await.unwrap());
        assert_eq!(messages(&seen), vec!["boom"]);
    }

    #[tokio::test]
    async fn test_starting_at_skips_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "2026-01-16 13:39:25 - app - INFO - old\n");
        let len = fs::metadata(&path).unwrap().len();

        let mut follower = Follower::new(&path, LogFilter::new()).starting_at(len);
        append(&path, "2026-01-16 13:39:30 - app - INFO - new\n");
        let mut seen = follower.poll().await.unwrap();
        seen.extend(follower.poll().await.unwrap());
        assert_eq!(messages(&seen), vec!["new"]);
    }

    #[tokio::test]
    async fn test_switches_to_newer_timestamped_file() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("app_20260116_133925.log");
        append(&first, "2026-01-16 13:39:25 - app - INFO - first run\n");

        let mut follower = Follower::new(&first, LogFilter::new())
            .switch_to_newer(dir.path(), "app");
        follower.poll().await.unwrap();

        let second = dir.path().join("app_20260116_140000.log");
        append(&second, "2026-01-16 14:00:00 - app - INFO - second run\n");

        let mut seen = follower.poll().await.unwrap();
        seen.extend(follower.poll().await.unwrap());
        assert_eq!(messages(&seen), vec!["first run", "second run"]);
        assert_eq!(follower.path(), second.as_path());
    }

    #[tokio::test]
    async fn test_switches_to_same_second_restart() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("app_20260116_133925.log");
        append(&first, "2026-01-16 13:39:25 - app - INFO - first run\n");

        let mut follower = Follower::new(&first, LogFilter::new())
            .switch_to_newer(dir.path(), "app");
        follower.poll().await.unwrap();

        let second = dir.path().join("app_20260116_133925-2.log");
        append(&second, "2026-01-16 13:39:25 - app - INFO - second run\n");

        let mut seen = follower.poll().await.unwrap();
        seen.extend(follower.poll().await.unwrap());
        assert_eq!(messages(&seen), vec!["first run", "second run"]);
        assert_eq!(follower.path(), second.as_path());

        // The older file is never picked back up.
        assert!(follower.poll().await.unwrap().is_empty());
        assert_eq!(follower.path(), second.as_path());
    }

    #[tokio::test]
    async fn test_resume_after_tail_attaches_late_traces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(
            &path,
            "2026-01-16 13:39:25 - app - INFO - one\n\
             2026-01-16 13:39:26 - app - ERROR - [ERROR] GET /x | Error: boom\n\
             Caused by: disk",
        );

        let tail = read_tail(&path, 5, &LogFilter::new()).unwrap();
        assert_eq!(messages(&tail.records), vec!["one"]);
        assert_eq!(
            tail.pending.as_ref().map(|r| r.message.as_str()),
            Some("[ERROR] GET /x | Error: boom")
        );
        let printed_len = fs::metadata(&path).unwrap().len() - "Caused by: disk".len() as u64;
        assert_eq!(tail.offset, printed_len);

        let mut follower = Follower::new(&path, LogFilter::new()).resume(tail);
        append(&path, " full\n");
        let mut seen = follower.poll().await.unwrap();
        seen.extend(follower.poll().await.unwrap());

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].continuation, vec!["Caused by: disk full"]);
    }

    #[test]
    fn test_read_tail_counts_pending_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(
            &path,
            "2026-01-16 13:39:25 - app - INFO - one\n\
             2026-01-16 13:39:26 - app - INFO - two\n\
             2026-01-16 13:39:27 - app - INFO - three\n",
        );

        let tail = read_tail(&path, 2, &LogFilter::new()).unwrap();
        assert_eq!(messages(&tail.records), vec!["two"]);
        assert_eq!(tail.pending.unwrap().message, "three");
        assert_eq!(tail.offset, fs::metadata(&path).unwrap().len());

        let tail = read_tail(&path, 0, &LogFilter::new()).unwrap();
        assert!(tail.records.is_empty());
        assert!(tail.pending.is_none());
    }

    #[tokio::test]
    async fn test_run_wakes_on_file_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "");

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            append(
                &writer_path,
                "2026-01-16 13:39:25 - app - INFO - one\n\
                 2026-01-16 13:39:26 - app - INFO - two\n",
            );
        });

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let mut done_tx = Some(done_tx);
        let mut seen = Vec::new();
        let follower = Follower::new(&path, LogFilter::new()).interval(Duration::from_secs(60));
        tokio::time::timeout(
            Duration::from_secs(10),
            follower.run(
                |record| {
                    seen.push(record.message.clone());
                    if let Some(tx) = done_tx.take() {
                        let _ = tx.send(());
                    }
                },
                async {
                    let _ = done_rx.await;
                },
            ),
        )
        .await
        .expect("a change event should wake the follower")
        .unwrap();

        assert_eq!(seen, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_and_flushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "2026-01-16 13:39:25 - app - INFO - only\n");

        let mut seen = Vec::new();
        Follower::new(&path, LogFilter::new())
            .interval(Duration::from_millis(10))
            .run(|record| seen.push(record.message.clone()), async {})
            .await
            .unwrap();
        assert_eq!(seen, vec!["only"]);
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let mut follower = Follower::new(dir.path().join("absent.log"), LogFilter::new());
        assert!(matches!(
            follower.poll().await,
            Err(Error::LogFileOpen { .. })
        ));
    }

    #[test]
    fn test_tail_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(
            &path,
            "2026-01-16 13:39:25 - app - INFO - one\n\
             2026-01-16 13:39:26 - app - ERROR - two\n\
             2026-01-16 13:39:27 - app - INFO - three\n\
             2026-01-16 13:39:28 - app - ERROR - four\n",
        );

        let last = tail_records(&path, 2, &LogFilter::new()).unwrap();
        assert_eq!(messages(&last), vec!["three", "four"]);

        let errors = tail_records(&path, 5, &LogFilter::new().min_level(LogLevel::Error)).unwrap();
        assert_eq!(messages(&errors), vec!["two", "four"]);

        assert!(tail_records(&path, 0, &LogFilter::new()).unwrap().is_empty());
    }
}
