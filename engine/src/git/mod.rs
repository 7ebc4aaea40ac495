//! Git command execution.
//!
//! This module provides:
//! - Locating git and parsing its version
//! - Deduplicated, priority-queued, optionally cached invocations
//! - Pull-based streaming of stdout with a guaranteed finalizer
//! - Classification of failure text into typed reasons
//! - Typed `git log` helpers that feed the record parsers

mod cache;
mod cancel;
pub mod classify;
pub mod commands;
mod error;
mod executor;
mod invocation;
mod locate;
mod output;
mod pending;
mod process;
mod queue;
mod stream;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use cancel::CancellationHandle;
pub use classify::{check_warning, classify, Classification, GitOperation, GitWarning, Reason};
pub use commands::{LogQuery, LogRecordStream};
pub use error::{CancelCause, GitError, GitFailure, GitResult};
pub use executor::{ExecutorStats, GitExecutor};
pub use invocation::{CacheRequest, ErrorMode, GitInvocation, OutputEncoding, Priority};
pub use locate::{find_in_path, GitLocation, GitLocator, GitVersion, GIT_PATH_ENV};
pub use output::GitOutput;
pub use queue::{
    CommandQueue, DefaultPriorityClassifier, Permit, PriorityClassifier, QueueStats, Ticket,
};
pub use stream::{GitStream, StreamExit};
