//! Immutable description of one git invocation.

use super::cancel::CancellationHandle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What a nonzero exit turns into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Raise [`GitError::Command`](super::GitError::Command).
    #[default]
    Throw,
    /// Hand back the raw exit code and stderr.
    Return,
    /// Pretend success: exit code 0 with whatever stdout was produced.
    Ignore,
}

/// How stdout is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    /// Validated UTF-8 text.
    #[default]
    Utf8,
    /// Raw bytes, no validation.
    Raw,
}

/// Scheduling class, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Interactive,
    Normal,
    Background,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Interactive, Priority::Normal, Priority::Background];

    pub(crate) fn index(self) -> usize {
        match self {
            Priority::Interactive => 0,
            Priority::Normal => 1,
            Priority::Background => 2,
        }
    }
}

/// A git command plus everything that shapes how it runs.
///
/// Built with chained setters:
///
/// ```
/// use gitlore_engine::git::{GitInvocation, Priority};
/// use std::time::Duration;
///
/// let invocation = GitInvocation::new("/repo", ["rev-parse", "HEAD"])
///     .timeout(Duration::from_secs(5))
///     .priority(Priority::Interactive)
///     .cached();
/// assert_eq!(invocation.args(), &["rev-parse", "HEAD"]);
/// ```
#[derive(Debug, Clone)]
pub struct GitInvocation {
    args: Vec<String>,
    cwd: PathBuf,
    env: Vec<(String, String)>,
    stdin: Option<Arc<[u8]>>,
    encoding: OutputEncoding,
    timeout: Option<Duration>,
    cancellation: Option<CancellationHandle>,
    error_mode: ErrorMode,
    cache: Option<CacheRequest>,
    correlation_key: Option<String>,
    priority: Option<Priority>,
    degrade_on_warnings: bool,
}

/// Request to serve the result from the whole-command cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    /// Scope for [`reset_for`](super::GitExecutor::reset_for); defaults to the
    /// working directory.
    pub common_path: Option<PathBuf>,
}

impl GitInvocation {
    pub fn new<I, S>(cwd: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            env: Vec::new(),
            stdin: None,
            encoding: OutputEncoding::Utf8,
            timeout: None,
            cancellation: None,
            error_mode: ErrorMode::Throw,
            cache: None,
            correlation_key: None,
            priority: None,
            degrade_on_warnings: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Overlay an environment variable on top of the fixed git environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Bytes written to stdin, which is then closed.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into().into());
        self
    }

    pub fn raw(mut self) -> Self {
        self.encoding = OutputEncoding::Raw;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancellation = Some(handle);
        self
    }

    pub fn error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Cache a successful result, scoped to the working directory.
    pub fn cached(mut self) -> Self {
        self.cache = Some(CacheRequest { common_path: None });
        self
    }

    /// Cache a successful result, scoped to `common_path`.
    pub fn cached_under(mut self, common_path: impl Into<PathBuf>) -> Self {
        self.cache = Some(CacheRequest {
            common_path: Some(common_path.into()),
        });
        self
    }

    /// Caller-chosen prefix that keeps otherwise identical commands apart.
    pub fn correlation_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_key = Some(key.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Treat advisory warnings (e.g. "not a git repository") as an empty
    /// success instead of an error. Only applies in [`ErrorMode::Throw`].
    pub fn degrade_on_warnings(mut self) -> Self {
        self.degrade_on_warnings = true;
        self
    }

    /// Caller arguments, without the fixed configuration prefix.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn env_overrides(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn stdin_bytes(&self) -> Option<&Arc<[u8]>> {
        self.stdin.as_ref()
    }

    pub fn encoding(&self) -> OutputEncoding {
        self.encoding
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancellation_handle(&self) -> Option<&CancellationHandle> {
        self.cancellation.as_ref()
    }

    pub fn mode(&self) -> ErrorMode {
        self.error_mode
    }

    pub fn cache_request(&self) -> Option<&CacheRequest> {
        self.cache.as_ref()
    }

    pub fn requested_priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn degrades_on_warnings(&self) -> bool {
        self.degrade_on_warnings
    }

    /// Scope used for cache keys: the common path, else the working directory.
    pub fn cache_scope(&self) -> &Path {
        self.cache
            .as_ref()
            .and_then(|c| c.common_path.as_deref())
            .unwrap_or(&self.cwd)
    }

    /// Deduplication identity.
    ///
    /// `stdin_counter` must be unique per call whenever stdin is present, since
    /// two identical command lines with different input are different work.
    pub(crate) fn identity(&self, command_line: &str, stdin_counter: Option<u64>) -> String {
        let mut identity = String::new();
        if let Some(key) = &self.correlation_key {
            identity.push_str(key);
            identity.push(':');
        }
        if let (Some(_), Some(counter)) = (&self.stdin, stdin_counter) {
            identity.push_str(&format!("stdin#{counter}:"));
        }
        if let Some(handle) = &self.cancellation {
            identity.push_str(&format!("cancel#{}:", handle.id()));
        }
        identity.push_str(&self.cwd.to_string_lossy());
        identity.push('$');
        identity.push_str(command_line);
        identity
    }
}
