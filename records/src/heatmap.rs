//! Relative-age heat for commit timestamps.
//!
//! Timestamps are split into a hot and a cold group at a configurable age so a
//! long tail of old history does not wash out recent activity. Each group gets
//! its own [`LookupTable`]; opacity always uses the two tables concatenated so
//! that it stays comparable across the split.
//!
//! Bucket indices restart in each group. Compare ages with
//! [`AgeClassifier::classify`], which orders by `(Heat, bucket)`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Number of thresholds in one lookup table.
pub const BUCKET_COUNT: usize = 10;

/// Thresholds between the newest timestamp and the median.
const UPPER_STEPS: usize = 5;
/// Thresholds between the median and the oldest timestamp.
const LOWER_STEPS: usize = 4;

const MIN_OPACITY: f64 = 0.2;

/// Inputs for [`AgeClassifier::build`].
#[derive(Debug, Clone, Copy)]
pub struct HeatmapConfig {
    /// Commits strictly older than `now - cold_threshold` are cold.
    pub cold_threshold: Duration,
    pub now: DateTime<Utc>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cold_threshold: Duration::days(90),
            now: Utc::now(),
        }
    }
}

impl HeatmapConfig {
    pub fn with_cold_days(days: i64) -> Self {
        Self {
            cold_threshold: Duration::days(days),
            ..Default::default()
        }
    }

    /// Cutoff in epoch milliseconds.
    pub fn cutoff_millis(&self) -> i64 {
        (self.now - self.cold_threshold).timestamp_millis()
    }
}

/// Which side of the cold cutoff a timestamp falls on. `Hot` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Heat {
    Hot,
    Cold,
}

/// Non-increasing millisecond thresholds, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    thresholds: Vec<i64>,
}

impl LookupTable {
    /// Build a table from unsorted timestamps; `None` when empty.
    pub fn build(timestamps: &[i64]) -> Option<Self> {
        if timestamps.is_empty() {
            return None;
        }

        let mut sorted = timestamps.to_vec();
        sorted.sort_unstable();

        let oldest = sorted[0] as f64;
        let newest = sorted[sorted.len() - 1] as f64;
        let median = median(&sorted);

        let upper_step = (newest - median) / UPPER_STEPS as f64;
        let lower_step = (median - oldest) / LOWER_STEPS as f64;

        let mut thresholds = Vec::with_capacity(BUCKET_COUNT);
        for k in (0..=UPPER_STEPS).rev() {
            thresholds.push((median + upper_step * k as f64).round() as i64);
        }
        for k in 1..=LOWER_STEPS {
            thresholds.push((median - lower_step * k as f64).round() as i64);
        }

        Some(Self { thresholds })
    }

    /// First index whose threshold `t` meets or exceeds, else the last index.
    pub fn index_of(&self, t: i64) -> usize {
        self.thresholds
            .iter()
            .position(|&threshold| t >= threshold)
            .unwrap_or(self.thresholds.len().saturating_sub(1))
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn thresholds(&self) -> &[i64] {
        &self.thresholds
    }

    fn concat(&self, other: &LookupTable) -> LookupTable {
        let mut thresholds = self.thresholds.clone();
        thresholds.extend_from_slice(&other.thresholds);
        LookupTable { thresholds }
    }
}

fn median(sorted: &[i64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}

#[derive(Debug, Clone)]
enum Tables {
    Empty,
    Shared(LookupTable),
    Split {
        hot: LookupTable,
        cold: LookupTable,
        combined: LookupTable,
    },
}

/// Maps a timestamp to a discrete age bucket and a continuous opacity.
#[derive(Debug, Clone)]
pub struct AgeClassifier {
    cutoff: i64,
    tables: Tables,
}

impl AgeClassifier {
    /// Build from epoch-millisecond timestamps.
    pub fn build(timestamps: &[i64], config: &HeatmapConfig) -> Self {
        let cutoff = config.cutoff_millis();
        let (cold, hot): (Vec<i64>, Vec<i64>) = timestamps.iter().partition(|&&t| t < cutoff);

        let tables = match (LookupTable::build(&hot), LookupTable::build(&cold)) {
            (Some(hot), Some(cold)) => {
                let combined = hot.concat(&cold);
                Tables::Split {
                    hot,
                    cold,
                    combined,
                }
            }
            (Some(table), None) | (None, Some(table)) => Tables::Shared(table),
            (None, None) => Tables::Empty,
        };

        Self { cutoff, tables }
    }

    pub fn from_dates(dates: &[DateTime<Utc>], config: &HeatmapConfig) -> Self {
        let timestamps: Vec<i64> = dates.iter().map(DateTime::timestamp_millis).collect();
        Self::build(&timestamps, config)
    }

    /// Whether separate hot and cold tables were built.
    pub fn is_split(&self) -> bool {
        matches!(self.tables, Tables::Split { .. })
    }

    /// Whether `t` is strictly older than the cold cutoff.
    pub fn is_cold(&self, t: i64) -> bool {
        t < self.cutoff
    }

    pub fn heat(&self, t: i64) -> Heat {
        if self.is_cold(t) {
            Heat::Cold
        } else {
            Heat::Hot
        }
    }

    /// Group and bucket of `t`. Older timestamps never compare lower.
    pub fn classify(&self, t: i64) -> (Heat, usize) {
        (self.heat(t), self.bucket(t))
    }

    /// Age bucket in `[0, BUCKET_COUNT)` within the group of `t`; 0 is the
    /// most recent.
    pub fn bucket(&self, t: i64) -> usize {
        match &self.tables {
            Tables::Empty => 0,
            Tables::Shared(table) => table.index_of(t),
            Tables::Split { hot, cold, .. } => {
                if self.is_cold(t) {
                    cold.index_of(t)
                } else {
                    hot.index_of(t)
                }
            }
        }
    }

    /// Opacity in `[0.2, 1.0]`, rounded to two decimals.
    pub fn opacity(&self, t: i64) -> f64 {
        let table = match &self.tables {
            Tables::Empty => return 1.0,
            Tables::Shared(table) => table,
            Tables::Split { combined, .. } => combined,
        };
        let ratio = 1.0 - table.index_of(t) as f64 / table.len() as f64;
        ((ratio * 100.0).round() / 100.0).max(MIN_OPACITY)
    }

    pub fn bucket_at(&self, date: DateTime<Utc>) -> usize {
        self.bucket(date.timestamp_millis())
    }

    pub fn opacity_at(&self, date: DateTime<Utc>) -> f64 {
        self.opacity(date.timestamp_millis())
    }

    /// The table opacity is computed against.
    pub fn combined_table(&self) -> Option<&LookupTable> {
        match &self.tables {
            Tables::Empty => None,
            Tables::Shared(table) => Some(table),
            Tables::Split { combined, .. } => Some(combined),
        }
    }
}
