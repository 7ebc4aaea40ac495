//! Error types for git command execution.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why an invocation was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The process ran for at least its configured timeout.
    Timeout,
    /// A caller triggered the cancellation handle.
    Caller,
}

impl std::fmt::Display for CancelCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelCause::Timeout => write!(f, "timed out"),
            CancelCause::Caller => write!(f, "cancelled"),
        }
    }
}

/// Diagnostic text of a failed git process.
///
/// Never trimmed or rewritten, so classification and logs see exactly what
/// git printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitFailure {
    pub command_line: String,
    pub exit_code: i32,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
}

impl GitFailure {
    pub fn new(command_line: impl Into<String>, exit_code: i32, stdout: String, stderr: String) -> Self {
        let command_line = command_line.into();
        let message = format!("`{command_line}` exited with code {exit_code}");
        Self {
            command_line,
            exit_code,
            message,
            stdout,
            stderr,
        }
    }

    /// A failure known only by its text, e.g. pasted from a terminal.
    pub fn from_text(stderr: impl Into<String>) -> Self {
        Self {
            command_line: String::new(),
            exit_code: 1,
            message: String::new(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Message, stderr and stdout, in classification order.
    pub fn texts(&self) -> [&str; 3] {
        [&self.message, &self.stderr, &self.stdout]
    }
}

impl std::fmt::Display for GitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

/// Errors that can occur while running git.
///
/// Cloneable so one settled result can be handed to every deduplicated caller.
#[derive(Error, Debug, Clone)]
pub enum GitError {
    #[error("Git executable not found")]
    NotFound,

    #[error("Git at {path} is not usable: {reason}")]
    Unusable { path: PathBuf, reason: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("I/O error talking to git: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("Git command failed: {0}")]
    Command(Box<GitFailure>),

    #[error("`{command_line}` {cause} after {elapsed:?}")]
    Cancelled {
        command_line: String,
        cause: CancelCause,
        elapsed: Duration,
    },

    #[error("Revision `{0}` looks like an option")]
    InvalidRevision(String),

    #[error("Git output is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Git task ended without a result: {0}")]
    Abandoned(String),
}

impl GitError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GitError::Cancelled { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            GitError::Cancelled {
                cause: CancelCause::Timeout,
                ..
            }
        )
    }

    /// The process failure, when this error wraps one.
    pub fn failure(&self) -> Option<&GitFailure> {
        match self {
            GitError::Command(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GitError {
    fn from(err: std::io::Error) -> Self {
        GitError::Io(Arc::new(err))
    }
}

impl From<GitFailure> for GitError {
    fn from(failure: GitFailure) -> Self {
        GitError::Command(Box::new(failure))
    }
}

/// Result type alias for git execution.
pub type GitResult<T> = Result<T, GitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_keeps_stderr() {
        let failure = GitFailure::new(
            "git push",
            1,
            String::new(),
            "! [rejected] main -> main (non-fast-forward)\n".to_string(),
        );
        let err: GitError = failure.into();
        let text = err.to_string();
        assert!(text.contains("git push"));
        assert!(text.contains("non-fast-forward"));
        assert!(err.failure().is_some());
    }

    #[test]
    fn test_cancelled_helpers() {
        let err = GitError::Cancelled {
            command_line: "git log".to_string(),
            cause: CancelCause::Timeout,
            elapsed: Duration::from_millis(1500),
        };
        assert!(err.is_cancelled());
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: GitError = io_err.into();
        match err {
            GitError::Io(_) => {}
            _ => panic!("Expected GitError::Io"),
        }
    }
}
