//! Logging sink injected into the executor.

use std::fmt;

/// Severity of a sink message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Destination for engine diagnostics.
///
/// `scope` names the subsystem (`"git"`, `"stream"`, `"queue"`, ...).
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, scope: &str, message: &str);

    fn debug(&self, scope: &str, message: &str) {
        self.log(LogLevel::Debug, scope, message);
    }

    fn info(&self, scope: &str, message: &str) {
        self.log(LogLevel::Info, scope, message);
    }

    fn warn(&self, scope: &str, message: &str) {
        self.log(LogLevel::Warn, scope, message);
    }

    fn error(&self, scope: &str, message: &str) {
        self.log(LogLevel::Error, scope, message);
    }
}

/// Forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, scope: &str, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(scope = scope, "{}", message),
            LogLevel::Info => tracing::info!(scope = scope, "{}", message),
            LogLevel::Warn => tracing::warn!(scope = scope, "{}", message),
            LogLevel::Error => tracing::error!(scope = scope, "{}", message),
        }
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: parking_lot::Mutex<Vec<(LogLevel, String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String, String)> {
        self.entries.lock().clone()
    }

    /// Messages logged under `scope`.
    pub fn messages(&self, scope: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, s, _)| s == scope)
            .map(|(_, _, m)| m.clone())
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, scope: &str, message: &str) {
        self.entries
            .lock()
            .push((level, scope.to_string(), message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters_by_scope() {
        let sink = MemorySink::new();
        sink.debug("git", "spawned");
        sink.warn("stream", "finished");
        sink.info("git", "done");

        assert_eq!(sink.messages("git"), vec!["spawned", "done"]);
        assert_eq!(sink.entries()[1].0, LogLevel::Warn);
    }

    #[test]
    fn test_tracing_sink_does_not_panic_without_subscriber() {
        TracingSink.error("git", "boom");
    }
}
