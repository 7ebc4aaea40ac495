//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use crate::git::GIT_PATH_ENV;
use crate::watcher::DEFAULT_DEBOUNCE_MS;
use gitlore_records::HeatmapConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the git executor, heatmap and repository watcher.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Git executable; overridden by `GITLORE_GIT_PATH`, else found on `PATH`.
    pub git_path: Option<PathBuf>,
    /// Process timeout for invocations that do not set one. `None` disables it.
    pub default_timeout_ms: Option<u64>,
    /// Maximum number of git processes running at once.
    pub max_concurrent: usize,
    /// Let one background command through after this many consecutive
    /// higher-priority grants. `None` means strict priority.
    pub background_skip_limit: Option<usize>,
    /// Maximum number of cached command results.
    pub result_cache_capacity: usize,
    /// Commands slower than this are logged at warn level.
    pub slow_command_warning_ms: u64,
    /// Commits older than this are bucketed on their own heatmap table.
    pub cold_threshold_days: i64,
    /// Quiet period before a change under `.git` resets cached results.
    pub watch_debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            git_path: None,
            default_timeout_ms: Some(60_000),
            max_concurrent: 7,
            background_skip_limit: None,
            result_cache_capacity: 500,
            slow_command_warning_ms: 2_000,
            cold_threshold_days: 90,
            watch_debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file, then apply environment overrides.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate(path)?;
        Ok(config.with_env_overrides())
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(GIT_PATH_ENV).filter(|p| !p.is_empty()) {
            self.git_path = Some(PathBuf::from(path));
        }
        self
    }

    fn validate(&self, path: &Path) -> EngineResult<()> {
        let invalid = |reason: &str| EngineError::Config {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.max_concurrent == 0 {
            return Err(invalid("max_concurrent must be at least 1"));
        }
        if self.cold_threshold_days < 0 {
            return Err(invalid("cold_threshold_days must not be negative"));
        }
        if self.background_skip_limit == Some(0) {
            return Err(invalid("background_skip_limit must be at least 1 when set"));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    pub fn slow_command_warning(&self) -> Duration {
        Duration::from_millis(self.slow_command_warning_ms)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    /// Heatmap settings measured from the current time.
    pub fn heatmap(&self) -> HeatmapConfig {
        HeatmapConfig::with_cold_days(self.cold_threshold_days)
    }
}
