//! Typed git commands: the executor feeding the record parsers.

use super::cancel::CancellationHandle;
use super::error::{GitError, GitResult};
use super::executor::GitExecutor;
use super::invocation::{GitInvocation, Priority};
use super::stream::{GitStream, StreamExit};
use crate::error::EngineResult;
use crate::sink::LogSink;
use chrono::{DateTime, Utc};
use gitlore_records::{FieldMapping, LogParser, Record, RecordDecoder};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which commits a log command covers.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub revision: Option<String>,
    pub limit: Option<usize>,
    pub paths: Vec<PathBuf>,
    pub priority: Option<Priority>,
    pub cancellation: Option<CancellationHandle>,
}

impl LogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancellation = Some(handle);
        self
    }
}

/// `git log` with the parser's format, then the query's revision and paths.
///
/// A revision starting with `-` would be read as an option and is rejected.
pub fn log_invocation(repo: &Path, parser: &LogParser, query: &LogQuery) -> GitResult<GitInvocation> {
    let mut invocation = GitInvocation::new(repo, ["log"]).with_args(parser.args());
    if let Some(limit) = query.limit {
        invocation = invocation.arg(format!("-n{limit}"));
    }
    if let Some(revision) = &query.revision {
        if revision.starts_with('-') {
            return Err(GitError::InvalidRevision(revision.clone()));
        }
        invocation = invocation.arg(revision.clone());
    }
    invocation = invocation.arg("--");
    for path in &query.paths {
        invocation = invocation.arg(path.to_string_lossy());
    }
    if let Some(priority) = query.priority {
        invocation = invocation.priority(priority);
    }
    if let Some(handle) = &query.cancellation {
        invocation = invocation.cancellation(handle.clone());
    }
    Ok(invocation)
}

fn decode(parser: &LogParser, text: &str, sink: &dyn LogSink) -> Vec<Record> {
    let mut decoder = parser.decoder();
    let mut records = decoder.push(text);
    records.extend(decoder.finish());
    log_discarded(&decoder, sink);
    records
}

fn log_discarded(decoder: &RecordDecoder, sink: &dyn LogSink) {
    let discarded = decoder.discarded();
    if discarded > 0 {
        sink.warn("records", &format!("discarded {discarded} incomplete record(s)"));
    }
}

/// Run `git log` and decode every record with `parser`.
pub async fn log_records(
    executor: &GitExecutor,
    repo: &Path,
    parser: &LogParser,
    query: &LogQuery,
) -> EngineResult<Vec<Record>> {
    let output = executor.execute(log_invocation(repo, parser, query)?).await?;
    Ok(decode(parser, output.text()?, executor.sink().as_ref()))
}

/// Log records with the files each commit touched.
pub async fn log_with_files(
    executor: &GitExecutor,
    repo: &Path,
    mapping: FieldMapping,
    query: &LogQuery,
) -> EngineResult<Vec<Record>> {
    log_records(executor, repo, &LogParser::with_files(mapping), query).await
}

/// Log records with per-file status and line counts.
pub async fn log_with_stats(
    executor: &GitExecutor,
    repo: &Path,
    mapping: FieldMapping,
    query: &LogQuery,
) -> EngineResult<Vec<Record>> {
    log_records(executor, repo, &LogParser::with_file_stats(mapping), query).await
}

/// The first hunk `revision` made to `path`, with the commit's fields.
///
/// `None` when the revision did not touch the file.
pub async fn file_patch(
    executor: &GitExecutor,
    repo: &Path,
    revision: &str,
    path: &Path,
) -> EngineResult<Option<Record>> {
    let parser = LogParser::with_patch(FieldMapping::commit());
    let query = LogQuery::new()
        .revision(revision)
        .limit(1)
        .path(path)
        .priority(Priority::Interactive);
    let records = log_records(executor, repo, &parser, &query).await?;
    Ok(records.into_iter().next().filter(|r| r.patch().is_some()))
}

/// Author dates of the commits `query` covers, newest first.
pub async fn commit_dates(
    executor: &GitExecutor,
    repo: &Path,
    query: &LogQuery,
) -> EngineResult<Vec<DateTime<Utc>>> {
    let mapping = FieldMapping::new([("date", "%at")])?;
    let records = log_records(executor, repo, &LogParser::new(mapping), query).await?;
    Ok(records
        .iter()
        .filter_map(|record| record.get("date"))
        .filter_map(|secs| secs.trim().parse::<i64>().ok())
        .filter_map(|secs| DateTime::from_timestamp(secs, 0))
        .collect())
}

/// The repository's git directory, or `None` outside a repository.
pub async fn rev_parse_git_dir(executor: &GitExecutor, cwd: &Path) -> EngineResult<Option<PathBuf>> {
    let output = executor
        .execute(
            GitInvocation::new(cwd, ["rev-parse", "--git-dir"])
                .priority(Priority::Interactive)
                .degrade_on_warnings()
                .cached(),
        )
        .await?;

    let text = output.text()?.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(cwd.join(text)))
}

/// Stream `git log` and decode records as soon as each one closes.
pub async fn stream_log_records(
    executor: &GitExecutor,
    repo: &Path,
    parser: &LogParser,
    query: &LogQuery,
) -> EngineResult<LogRecordStream> {
    let stream = executor.stream(log_invocation(repo, parser, query)?).await?;
    Ok(LogRecordStream {
        stream,
        decoder: parser.decoder(),
        ready: VecDeque::new(),
        sink: Arc::clone(executor.sink()),
    })
}

/// Records decoded incrementally from a running `git log`.
///
/// Dropping it early stops decoding; the process is still drained and reaped.
pub struct LogRecordStream {
    stream: GitStream,
    decoder: RecordDecoder,
    ready: VecDeque<Record>,
    sink: Arc<dyn LogSink>,
}

impl LogRecordStream {
    /// The next complete record, or `None` at the end of output.
    pub async fn next_record(&mut self) -> GitResult<Option<Record>> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Ok(Some(record));
            }
            if self.decoder.is_finished() {
                return Ok(None);
            }
            match self.stream.next_chunk().await? {
                Some(chunk) => self.ready.extend(self.decoder.push(&chunk)),
                None => {
                    self.ready.extend(self.decoder.finish());
                    log_discarded(&self.decoder, self.sink.as_ref());
                }
            }
        }
    }

    /// Stop reading and wait for git to exit.
    pub async fn close(self) -> GitResult<StreamExit> {
        self.stream.close().await
    }
}
