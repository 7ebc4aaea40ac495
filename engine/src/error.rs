//! Error types for the gitlore engine.

use crate::git::GitError;
use gitlore_records::RecordError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the engine outside a single git invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = EngineError::Config {
            path: PathBuf::from("/etc/gitlore.json"),
            reason: "max_concurrent must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration in /etc/gitlore.json: max_concurrent must be positive"
        );
    }

    #[test]
    fn test_git_error_is_transparent() {
        let err: EngineError = GitError::NotFound.into();
        assert_eq!(err.to_string(), "Git executable not found");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        match EngineError::from(io_err) {
            EngineError::Io(_) => {}
            other => panic!("Expected EngineError::Io, got {other:?}"),
        }
    }
}
