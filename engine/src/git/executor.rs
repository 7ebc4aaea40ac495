//! The git executor: deduplicated, queued, optionally cached invocations.
//!
//! One executor is shared by every caller of a workspace. Identical concurrent
//! invocations share a single process, and every process waits for a slot in
//! the priority queue before it is spawned.
//!
//! Deduplicated callers share fate. If the process is cancelled (through a
//! handle that is part of the identity, or by its timeout) every attached
//! caller sees the same [`GitError::Cancelled`].

use super::cache::{CacheKey, CacheStats, ResultCache};
use super::classify::check_warning;
use super::error::{GitError, GitFailure, GitResult};
use super::invocation::{ErrorMode, GitInvocation, OutputEncoding, Priority};
use super::locate::GitLocator;
use super::output::GitOutput;
use super::pending::{wait_shared, Joined, PendingTable};
use super::process;
use super::queue::{CommandQueue, DefaultPriorityClassifier, Permit, PriorityClassifier, QueueStats};
use super::stream::GitStream;
use crate::config::EngineConfig;
use crate::sink::LogSink;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Occupancy snapshot of an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorStats {
    /// In-flight deduplicated invocations.
    pub pending: usize,
    pub cache: CacheStats,
    pub queue: QueueStats,
}

struct Inner {
    locator: GitLocator,
    queue: CommandQueue,
    cache: ResultCache,
    pending: PendingTable<GitResult<GitOutput>>,
    classifier: Arc<dyn PriorityClassifier>,
    sink: Arc<dyn LogSink>,
    default_timeout: Option<Duration>,
    slow_command_warning: Duration,
    stdin_counter: AtomicU64,
    /// Bumped by every reset. A result is not cached when a reset covering
    /// its scope happened after its run started.
    reset_seq: AtomicU64,
    /// Sequence number of the last `reset_all`.
    reset_all_at: AtomicU64,
    /// Sequence number of the last `reset_for` per scope.
    scope_resets: DashMap<PathBuf, u64>,
}

/// Runs git commands for any number of callers.
#[derive(Clone)]
pub struct GitExecutor {
    inner: Arc<Inner>,
}

impl GitExecutor {
    /// Create an executor that locates git from `config`, the environment or
    /// `PATH` on first use.
    pub fn new(config: &EngineConfig, sink: Arc<dyn LogSink>) -> Self {
        Self::with_locator(config, GitLocator::new(config.git_path.clone()), sink)
    }

    pub fn with_locator(config: &EngineConfig, locator: GitLocator, sink: Arc<dyn LogSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                locator,
                queue: CommandQueue::new(config.max_concurrent, config.background_skip_limit),
                cache: ResultCache::new(config.result_cache_capacity),
                pending: PendingTable::new(),
                classifier: Arc::new(DefaultPriorityClassifier),
                sink,
                default_timeout: config.default_timeout(),
                slow_command_warning: config.slow_command_warning(),
                stdin_counter: AtomicU64::new(0),
                reset_seq: AtomicU64::new(0),
                reset_all_at: AtomicU64::new(0),
                scope_resets: DashMap::new(),
            }),
        }
    }

    /// Replace the heuristic that picks a priority for invocations without an
    /// explicit one. Only valid before the executor is cloned.
    pub fn with_priority_classifier(mut self, classifier: Arc<dyn PriorityClassifier>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.classifier = classifier;
        }
        self
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.inner.sink
    }

    pub fn locator(&self) -> &GitLocator {
        &self.inner.locator
    }

    /// Run `invocation` to completion.
    ///
    /// A nonzero exit is mapped through the invocation's [`ErrorMode`].
    /// Cancellation, timeouts and spawn failures are errors in every mode.
    pub async fn execute(&self, invocation: GitInvocation) -> GitResult<GitOutput> {
        let program = self.inner.locator.locate().await?.path.clone();
        let invocation = self.inner.with_defaults(invocation);
        let args = process::full_args(&invocation);
        let command_line = process::command_line(&program, &args);

        let cache_key = invocation.cache_request().map(|_| {
            CacheKey::new(invocation.cache_scope(), command_line.clone())
                .with_stdin(invocation.stdin_bytes().cloned())
                .with_env(invocation.env_overrides())
        });
        let hit = cache_key.as_ref().and_then(|key| self.inner.cache.get(key));

        let outcome = match hit {
            Some(hit) => {
                self.inner
                    .sink
                    .debug("git", &format!("cache hit `{command_line}`"));
                Ok(hit)
            }
            None => {
                self.run_shared(program, invocation.clone(), args, command_line.clone(), cache_key)
                    .await
            }
        };

        self.inner.apply_mode(&invocation, &command_line, outcome)
    }

    /// Start `invocation` and stream its stdout.
    ///
    /// Streams take a queue slot for as long as they run but are never
    /// deduplicated or cached.
    pub async fn stream(&self, invocation: GitInvocation) -> GitResult<GitStream> {
        let program = self.inner.locator.locate().await?.path.clone();
        let invocation = self.inner.with_defaults(invocation);
        let args = process::full_args(&invocation);
        let command_line = process::command_line(&program, &args);

        let permit = self.inner.admit(&invocation, &command_line).await?;
        let child = process::spawn(&program, &invocation, &args)?;
        self.inner
            .sink
            .debug("stream", &format!("started `{command_line}`"));

        GitStream::start(
            child,
            Some(permit),
            Arc::clone(&self.inner.sink),
            command_line,
            invocation.mode(),
            invocation.timeout_value(),
            invocation.cancellation_handle().cloned(),
        )
    }

    /// Forget every cached result and detach every in-flight invocation.
    pub fn reset_all(&self) {
        let seq = self.inner.reset_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.reset_all_at.store(seq, Ordering::SeqCst);
        self.inner.scope_resets.clear();
        self.inner.cache.invalidate_all();
        self.inner.pending.clear();
        self.inner.sink.debug("git", "reset all cached results");
    }

    /// Forget cached results and detach in-flight invocations in or below
    /// `scope`.
    pub fn reset_for(&self, scope: &Path) {
        let seq = self.inner.reset_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.scope_resets.insert(scope.to_path_buf(), seq);
        let removed = self.inner.cache.invalidate_scope(scope);
        self.inner.pending.clear_scope(scope);
        self.inner.sink.debug(
            "git",
            &format!("reset {} ({removed} cached results)", scope.display()),
        );
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            pending: self.inner.pending.len(),
            cache: self.inner.cache.stats(),
            queue: self.inner.queue.stats(),
        }
    }

    /// Attach to an identical in-flight invocation, or start one.
    async fn run_shared(
        &self,
        program: PathBuf,
        invocation: GitInvocation,
        args: Vec<String>,
        command_line: String,
        cache_key: Option<CacheKey>,
    ) -> GitResult<GitOutput> {
        let stdin_counter = invocation
            .stdin_bytes()
            .map(|_| self.inner.stdin_counter.fetch_add(1, Ordering::Relaxed));
        let identity = invocation.identity(&command_line, stdin_counter);

        let rx = match self.inner.pending.join(&identity, invocation.cwd()) {
            Joined::Attached(rx) => {
                self.inner
                    .sink
                    .debug("git", &format!("joined in-flight `{command_line}`"));
                rx
            }
            Joined::Started { rx, settle } => {
                let inner = Arc::clone(&self.inner);
                let command_line = command_line.clone();
                // Owned by a task so the process settles even if this caller
                // stops waiting
                tokio::spawn(async move {
                    let result = inner
                        .run_queued(&program, &invocation, &args, &command_line, cache_key)
                        .await;
                    settle.settle(result);
                });
                rx
            }
        };

        wait_shared(rx)
            .await
            .unwrap_or_else(|| Err(GitError::Abandoned(command_line)))
    }
}

impl Inner {
    fn with_defaults(&self, invocation: GitInvocation) -> GitInvocation {
        match (invocation.timeout_value(), self.default_timeout) {
            (None, Some(timeout)) => invocation.timeout(timeout),
            _ => invocation,
        }
    }

    fn priority_of(&self, invocation: &GitInvocation) -> Priority {
        invocation
            .requested_priority()
            .unwrap_or_else(|| self.classifier.classify(invocation.args()))
    }

    /// Wait for a queue slot, giving up if the invocation is cancelled first.
    async fn admit(&self, invocation: &GitInvocation, command_line: &str) -> GitResult<Permit> {
        let started = Instant::now();
        let ticket = self.queue.enqueue(self.priority_of(invocation));

        let permit = match invocation.cancellation_handle() {
            Some(handle) => {
                tokio::select! {
                    permit = ticket.wait() => permit,
                    _ = handle.cancelled() => {
                        return Err(process::cancelled(command_line, started, None));
                    }
                }
            }
            None => ticket.wait().await,
        };

        permit.ok_or_else(|| GitError::Abandoned(format!("queue closed before `{command_line}` ran")))
    }

    async fn run_queued(
        &self,
        program: &Path,
        invocation: &GitInvocation,
        args: &[String],
        command_line: &str,
        cache_key: Option<CacheKey>,
    ) -> GitResult<GitOutput> {
        let started_seq = self.reset_seq.load(Ordering::SeqCst);
        let _permit = self.admit(invocation, command_line).await?;

        let started = Instant::now();
        let result = process::run(program, invocation, args, command_line).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(output) => {
                let message = format!(
                    "`{command_line}` exit={} in {elapsed:?}",
                    output.exit_code
                );
                if elapsed > self.slow_command_warning {
                    self.sink.warn("git", &format!("slow: {message}"));
                } else {
                    self.sink.debug("git", &message);
                }

                if let Some(key) = cache_key {
                    if !self.reset_since(&key.scope, started_seq) {
                        self.cache.put(key, output);
                    }
                }
            }
            Err(err) => self.sink.debug("git", &format!("`{command_line}` failed: {err}")),
        }

        result
    }

    /// Whether a reset covering `scope` happened after sequence `since`.
    fn reset_since(&self, scope: &Path, since: u64) -> bool {
        if self.reset_all_at.load(Ordering::SeqCst) > since {
            return true;
        }
        self.scope_resets
            .iter()
            .any(|entry| *entry.value() > since && scope.starts_with(entry.key()))
    }

    fn apply_mode(
        &self,
        invocation: &GitInvocation,
        command_line: &str,
        outcome: GitResult<GitOutput>,
    ) -> GitResult<GitOutput> {
        let output = outcome?;

        let output = if output.success() {
            output
        } else {
            match invocation.mode() {
                ErrorMode::Return => output,
                ErrorMode::Ignore => output.with_exit_code(0),
                ErrorMode::Throw => {
                    let failure = GitFailure::new(
                        command_line,
                        output.exit_code,
                        output.text_lossy(),
                        output.stderr.clone(),
                    );
                    if invocation.degrades_on_warnings() {
                        if let Some(warning) = check_warning(&failure) {
                            self.sink.info("git", &format!("{warning}: {failure}"));
                            return Ok(GitOutput::empty());
                        }
                    }
                    return Err(failure.into());
                }
            }
        };

        if invocation.encoding() == OutputEncoding::Utf8 {
            output.text()?;
        }
        Ok(output)
    }
}
