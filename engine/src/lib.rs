//! Gitlore Engine
//!
//! Runs git as a subprocess many times a second on behalf of editor features:
//! identical concurrent commands share one process, commands wait in a
//! priority queue, successful results can be cached until the repository
//! changes, and failures are classified into typed reasons. Output is decoded
//! with `gitlore-records`.

pub mod config;
pub mod error;
pub mod git;
pub mod sink;
pub mod watcher;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use git::{GitExecutor, GitInvocation};
pub use sink::{LogLevel, LogSink, MemorySink, TracingSink};
pub use watcher::RepoWatcher;
