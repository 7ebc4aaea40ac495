//! Decoded records and the collections attached to them.

use crate::patch::FilePatch;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// One decoded unit of git output (usually one commit).
///
/// Field values are stored exactly as git printed them between separators.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    names: Arc<[String]>,
    values: Vec<String>,
    files: Option<Vec<FileChange>>,
    stats: Option<RecordStats>,
    patch: Option<FilePatch>,
}

impl Record {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            names,
            values,
            files: None,
            stats: None,
            patch: None,
        }
    }

    pub(crate) fn with_files(mut self, files: Vec<FileChange>) -> Self {
        self.files = Some(files);
        self
    }

    pub(crate) fn with_stats(mut self, stats: RecordStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub(crate) fn with_patch(mut self, patch: Option<FilePatch>) -> Self {
        self.patch = patch;
        self
    }

    /// Value of a declared field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// Changed files; empty for shapes without a file list.
    pub fn files(&self) -> &[FileChange] {
        self.files.as_deref().unwrap_or(&[])
    }

    /// Whether this record's shape carries a file list at all.
    pub fn has_files(&self) -> bool {
        self.files.is_some()
    }

    /// Aggregate line statistics (numstat shape only).
    pub fn stats(&self) -> Option<&RecordStats> {
        self.stats.as_ref()
    }

    /// Single-file patch (patch shape only).
    pub fn patch(&self) -> Option<&FilePatch> {
        self.patch.as_ref()
    }
}

struct FieldsView<'a>(&'a Record);

impl Serialize for FieldsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.values.len()))?;
        for (name, value) in self.0.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Record", 4)?;
        state.serialize_field("fields", &FieldsView(self))?;
        if let Some(files) = &self.files {
            state.serialize_field("files", files)?;
        } else {
            state.skip_field("files")?;
        }
        if let Some(stats) = &self.stats {
            state.serialize_field("stats", stats)?;
        } else {
            state.skip_field("stats")?;
        }
        if let Some(patch) = &self.patch {
            state.serialize_field("patch", patch)?;
        } else {
            state.skip_field("patch")?;
        }
        state.end()
    }
}

/// Status letter from git's raw diff output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Copied,
    Deleted,
    Modified,
    Renamed,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl FileStatus {
    /// Decode a raw status token such as `M`, `A` or `R086`.
    ///
    /// Returns the status and, for renames and copies, the similarity score.
    pub fn parse(token: &str) -> (Self, Option<u8>) {
        let mut chars = token.chars();
        let status = match chars.next() {
            Some('A') => FileStatus::Added,
            Some('C') => FileStatus::Copied,
            Some('D') => FileStatus::Deleted,
            Some('M') => FileStatus::Modified,
            Some('R') => FileStatus::Renamed,
            Some('T') => FileStatus::TypeChanged,
            Some('U') => FileStatus::Unmerged,
            _ => FileStatus::Unknown,
        };
        let similarity = chars.as_str().parse::<u8>().ok();
        (status, similarity)
    }

    /// Whether the raw line carries both a source and a destination path.
    pub fn has_source_path(self) -> bool {
        matches!(self, FileStatus::Renamed | FileStatus::Copied)
    }
}

/// Added/deleted line counts for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineStats {
    pub added: u32,
    pub deleted: u32,
    /// Git reported `-` for both counts.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub binary: bool,
}

/// Commit ids a submodule pointed at before and after the change.
///
/// `None` means the side does not exist (added or removed submodule).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmoduleChange {
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// One file touched by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<LineStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submodule: Option<SubmoduleChange>,
}

impl FileChange {
    /// A change known only by path.
    pub fn path_only(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            original_path: None,
            status: None,
            similarity: None,
            stats: None,
            submodule: None,
        }
    }
}

/// Totals across all files of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordStats {
    pub files_changed: u32,
    pub additions: u32,
    pub deletions: u32,
}

impl RecordStats {
    /// Sum the per-file counts.
    pub fn from_files(files: &[FileChange]) -> Self {
        files.iter().fold(
            RecordStats {
                files_changed: files.len() as u32,
                ..Default::default()
            },
            |mut acc, file| {
                if let Some(stats) = file.stats {
                    acc.additions += stats.added;
                    acc.deletions += stats.deleted;
                }
                acc
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        let names: Arc<[String]> = vec!["sha".to_string(), "subject".to_string()].into();
        Record::new(names, vec!["abc".to_string(), "Fix it".to_string()])
    }

    #[test]
    fn test_get_field() {
        let r = record();
        assert_eq!(r.get("sha"), Some("abc"));
        assert_eq!(r.get("subject"), Some("Fix it"));
        assert_eq!(r.get("missing"), None);
    }

    #[test]
    fn test_fields_in_order() {
        let r = record();
        let fields: Vec<_> = r.fields().collect();
        assert_eq!(fields, vec![("sha", "abc"), ("subject", "Fix it")]);
    }

    #[test]
    fn test_plain_record_has_no_files() {
        let r = record();
        assert!(!r.has_files());
        assert!(r.files().is_empty());
        assert!(r.stats().is_none());
        assert!(r.patch().is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(FileStatus::parse("M"), (FileStatus::Modified, None));
        assert_eq!(FileStatus::parse("R086"), (FileStatus::Renamed, Some(86)));
        assert_eq!(FileStatus::parse("C100"), (FileStatus::Copied, Some(100)));
        assert_eq!(FileStatus::parse("?"), (FileStatus::Unknown, None));
        assert!(FileStatus::Renamed.has_source_path());
        assert!(!FileStatus::Added.has_source_path());
    }

    #[test]
    fn test_record_stats_from_files() {
        let mut a = FileChange::path_only("a");
        a.stats = Some(LineStats {
            added: 3,
            deleted: 1,
            binary: false,
        });
        let b = FileChange::path_only("b");
        let stats = RecordStats::from_files(&[a, b]);
        assert_eq!(
            stats,
            RecordStats {
                files_changed: 2,
                additions: 3,
                deletions: 1
            }
        );
    }

    #[test]
    fn test_serialize_record() {
        let r = record().with_files(vec![FileChange::path_only("src/main.rs")]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["fields"]["sha"], "abc");
        assert_eq!(json["files"][0]["path"], "src/main.rs");
        assert!(json.get("patch").is_none());
    }
}
