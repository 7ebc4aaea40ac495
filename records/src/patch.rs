//! Single-file patch decoding for `git log -p -- <path>` style output.

use crate::error::{RecordError, Result};
use crate::files::unquote_path;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("constant regex pattern is valid")
});

/// Start line and line count of one side of a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HunkRange {
    pub start: u32,
    pub count: u32,
}

impl HunkRange {
    /// Last line covered by the range, inclusive; equal to `start` when empty.
    pub fn end(&self) -> u32 {
        if self.count == 0 {
            self.start
        } else {
            self.start.saturating_add(self.count - 1)
        }
    }
}

/// The first hunk of a single file's diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePatch {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    pub original: HunkRange,
    pub current: HunkRange,
    /// Hunk header plus body lines.
    pub hunk: String,
}

/// Decode a hunk header such as `@@ -10,3 +12 @@ fn main()`.
///
/// A missing count means one line.
pub fn parse_hunk_header(line: &str) -> Result<(HunkRange, HunkRange)> {
    let caps = HUNK_HEADER
        .captures(line)
        .ok_or_else(|| RecordError::InvalidHunkHeader(line.to_string()))?;

    let number = |index: usize, default: u32| -> Result<u32> {
        match caps.get(index) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| RecordError::InvalidHunkHeader(line.to_string())),
            None => Ok(default),
        }
    };

    Ok((
        HunkRange {
            start: number(1, 0)?,
            count: number(2, 1)?,
        },
        HunkRange {
            start: number(3, 0)?,
            count: number(4, 1)?,
        },
    ))
}

/// Decode the trailing diff of a patch-shaped record.
///
/// Returns `None` when the record carries no hunk (e.g. a mode-only change).
pub fn parse_file_patch(trailing: &str) -> Option<FilePatch> {
    let mut diff_paths: Option<(String, String)> = None;
    let mut rename_from: Option<String> = None;
    let mut rename_to: Option<String> = None;
    let mut minus_path: Option<String> = None;
    let mut plus_path: Option<String> = None;
    let mut ranges: Option<(HunkRange, HunkRange)> = None;
    let mut hunk = String::new();

    for line in trailing.lines() {
        let line = line.trim_end_matches('\r');

        if let Some((original, current)) = ranges {
            // Stop at the next hunk or the next file
            if line.starts_with("@@") || line.starts_with("diff --git ") {
                return Some(build_patch(
                    diff_paths,
                    rename_from,
                    rename_to,
                    minus_path,
                    plus_path,
                    original,
                    current,
                    hunk,
                ));
            }
            hunk.push_str(line);
            hunk.push('\n');
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            diff_paths = split_diff_git_paths(rest);
        } else if let Some(path) = line.strip_prefix("rename from ") {
            rename_from = Some(unquote_path(path));
        } else if let Some(path) = line.strip_prefix("rename to ") {
            rename_to = Some(unquote_path(path));
        } else if let Some(path) = line.strip_prefix("--- ") {
            minus_path = strip_side_prefix(path, "a/");
        } else if let Some(path) = line.strip_prefix("+++ ") {
            plus_path = strip_side_prefix(path, "b/");
        } else if line.starts_with("@@") {
            if let Ok(parsed) = parse_hunk_header(line) {
                ranges = Some(parsed);
                hunk.push_str(line);
                hunk.push('\n');
            }
        }
    }

    let (original, current) = ranges?;
    Some(build_patch(
        diff_paths,
        rename_from,
        rename_to,
        minus_path,
        plus_path,
        original,
        current,
        hunk,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_patch(
    diff_paths: Option<(String, String)>,
    rename_from: Option<String>,
    rename_to: Option<String>,
    minus_path: Option<String>,
    plus_path: Option<String>,
    original: HunkRange,
    current: HunkRange,
    hunk: String,
) -> FilePatch {
    let (diff_a, diff_b) = match diff_paths {
        Some((a, b)) => (Some(a), Some(b)),
        None => (None, None),
    };

    let path = rename_to
        .or(plus_path)
        .or_else(|| minus_path.clone())
        .or_else(|| diff_b.clone())
        .unwrap_or_default();

    let original_path = rename_from.or_else(|| {
        let source = minus_path.or(diff_a)?;
        (source != path).then_some(source)
    });

    FilePatch {
        path,
        original_path,
        original,
        current,
        hunk,
    }
}

/// `--- a/path` / `+++ b/path`; `/dev/null` means the side does not exist.
fn strip_side_prefix(path: &str, prefix: &str) -> Option<String> {
    let path = path.trim_end_matches('\t');
    if path == "/dev/null" {
        return None;
    }
    let path = unquote_path(path);
    Some(path.strip_prefix(prefix).map(str::to_string).unwrap_or(path))
}

/// Split `a/old b/new` from a `diff --git` line when unambiguous.
fn split_diff_git_paths(rest: &str) -> Option<(String, String)> {
    let rest = rest.strip_prefix("a/")?;
    let index = rest.find(" b/")?;
    Some((rest[..index].to_string(), rest[index + 3..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hunk_header_full() {
        let (old, new) = parse_hunk_header("@@ -10,3 +12,5 @@ fn main() {").unwrap();
        assert_eq!(old, HunkRange { start: 10, count: 3 });
        assert_eq!(new, HunkRange { start: 12, count: 5 });
    }

    #[test]
    fn test_parse_hunk_header_default_count() {
        let (old, new) = parse_hunk_header("@@ -7 +7,0 @@").unwrap();
        assert_eq!(old, HunkRange { start: 7, count: 1 });
        assert_eq!(new, HunkRange { start: 7, count: 0 });
        assert_eq!(new.end(), 7);
    }

    #[test]
    fn test_hunk_end_saturates() {
        let (old, new) = parse_hunk_header("@@ -4294967295,2 +7,0 @@").unwrap();
        assert_eq!(old.end(), u32::MAX);
        assert_eq!(new.end(), 7);
    }

    #[test]
    fn test_parse_hunk_header_invalid() {
        assert!(matches!(
            parse_hunk_header("not a hunk"),
            Err(RecordError::InvalidHunkHeader(_))
        ));
    }

    #[test]
    fn test_parse_file_patch_modified() {
        let trailing = "\n\ndiff --git a/src/lib.rs b/src/lib.rs\n\
                        index 1111111..2222222 100644\n\
                        --- a/src/lib.rs\n\
                        +++ b/src/lib.rs\n\
                        @@ -4,2 +4,3 @@ pub fn run() {\n\
                        -    old();\n\
                        +    new();\n\
                        +    more();\n";
        let patch = parse_file_patch(trailing).unwrap();
        assert_eq!(patch.path, "src/lib.rs");
        assert_eq!(patch.original_path, None);
        assert_eq!(patch.original, HunkRange { start: 4, count: 2 });
        assert_eq!(patch.current, HunkRange { start: 4, count: 3 });
        assert!(patch.hunk.starts_with("@@ -4,2 +4,3 @@"));
        assert_eq!(patch.hunk.lines().count(), 4);
    }

    #[test]
    fn test_parse_file_patch_rename() {
        let trailing = "diff --git a/old.rs b/new.rs\n\
                        similarity index 90%\n\
                        rename from old.rs\n\
                        rename to new.rs\n\
                        --- a/old.rs\n\
                        +++ b/new.rs\n\
                        @@ -1 +1 @@\n\
                        -a\n\
                        +b\n";
        let patch = parse_file_patch(trailing).unwrap();
        assert_eq!(patch.path, "new.rs");
        assert_eq!(patch.original_path.as_deref(), Some("old.rs"));
        assert_eq!(patch.original, HunkRange { start: 1, count: 1 });
    }

    #[test]
    fn test_parse_file_patch_stops_at_second_hunk() {
        let trailing = "--- a/x\n+++ b/x\n@@ -1,1 +1,1 @@\n-a\n+b\n@@ -9,1 +9,1 @@\n-c\n+d\n";
        let patch = parse_file_patch(trailing).unwrap();
        assert_eq!(patch.original.start, 1);
        assert!(!patch.hunk.contains("@@ -9"));
    }

    #[test]
    fn test_parse_file_patch_added_file() {
        let trailing = "--- /dev/null\n+++ b/fresh.txt\n@@ -0,0 +1,2 @@\n+a\n+b\n";
        let patch = parse_file_patch(trailing).unwrap();
        assert_eq!(patch.path, "fresh.txt");
        assert_eq!(patch.original_path, None);
        assert_eq!(patch.original, HunkRange { start: 0, count: 0 });
    }

    #[test]
    fn test_parse_file_patch_without_hunk() {
        assert!(parse_file_patch("diff --git a/x b/x\nold mode 100644\nnew mode 100755\n").is_none());
    }
}
