//! Trailing file lists: `--name-only` and `--raw --numstat`.

use crate::record::{FileChange, FileStatus, LineStats, SubmoduleChange};
use std::collections::HashMap;

/// Git's file mode for gitlinks (submodule entries).
pub const SUBMODULE_MODE: &str = "160000";

/// Decode a `--name-only` block: one path per line, blank lines ignored.
pub fn parse_name_only(trailing: &str) -> Vec<FileChange> {
    trailing
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(|line| FileChange::path_only(unquote_path(line)))
        .collect()
}

/// Decode an interleaved `--raw` / `--numstat` block.
///
/// Raw lines (`:old_mode new_mode old_sha new_sha STATUS\tpath[\tpath]`) give
/// status, rename source and submodule ids; numstat lines
/// (`added\tdeleted\tpath`) give line counts. Both are keyed by the file's
/// current path. A numstat line with no matching raw line still produces an
/// entry.
pub fn parse_file_stats(trailing: &str) -> Vec<FileChange> {
    let mut files: Vec<FileChange> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();

    for line in trailing.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(raw) = line.strip_prefix(':') {
            if let Some(change) = parse_raw_line(raw) {
                match by_path.get(&change.path) {
                    // Merge commits may list a path once per parent
                    Some(_) => {}
                    None => {
                        by_path.insert(change.path.clone(), files.len());
                        files.push(change);
                    }
                }
            }
            continue;
        }

        if let Some((stats, path, original)) = parse_numstat_line(line) {
            match by_path.get(&path) {
                Some(&index) => {
                    let file = &mut files[index];
                    file.stats = Some(stats);
                    if file.original_path.is_none() {
                        file.original_path = original;
                    }
                }
                None => {
                    let mut change = FileChange::path_only(path.clone());
                    change.original_path = original;
                    change.stats = Some(stats);
                    by_path.insert(path, files.len());
                    files.push(change);
                }
            }
        }
    }

    files
}

fn parse_raw_line(raw: &str) -> Option<FileChange> {
    let mut parts = raw.split('\t');
    let meta = parts.next()?;
    let mut meta = meta.split_whitespace();

    let old_mode = meta.next()?;
    let new_mode = meta.next()?;
    let old_sha = meta.next()?;
    let new_sha = meta.next()?;
    let (status, similarity) = FileStatus::parse(meta.next()?);

    let first = unquote_path(parts.next()?);
    let (path, original_path) = if status.has_source_path() {
        match parts.next() {
            Some(second) => (unquote_path(second), Some(first)),
            None => (first, None),
        }
    } else {
        (first, None)
    };

    let submodule = (old_mode == SUBMODULE_MODE || new_mode == SUBMODULE_MODE).then(|| {
        SubmoduleChange {
            previous: (old_mode == SUBMODULE_MODE).then(|| non_null_sha(old_sha)).flatten(),
            current: (new_mode == SUBMODULE_MODE).then(|| non_null_sha(new_sha)).flatten(),
        }
    });

    Some(FileChange {
        path,
        original_path,
        status: Some(status),
        similarity,
        stats: None,
        submodule,
    })
}

fn non_null_sha(sha: &str) -> Option<String> {
    let sha = sha.trim_end_matches('.');
    if sha.is_empty() || sha.chars().all(|c| c == '0') {
        None
    } else {
        Some(sha.to_string())
    }
}

/// Returns the stats, the current path, and the source path for renames.
fn parse_numstat_line(line: &str) -> Option<(LineStats, String, Option<String>)> {
    let mut parts = line.splitn(3, '\t');
    let added = parts.next()?;
    let deleted = parts.next()?;
    let spec = parts.next()?;

    let binary = added == "-" && deleted == "-";
    let stats = LineStats {
        added: if binary { 0 } else { added.parse().ok()? },
        deleted: if binary { 0 } else { deleted.parse().ok()? },
        binary,
    };

    let (path, original) = resolve_rename_spec(spec);
    Some((stats, path, original))
}

/// Expand numstat rename notation into `(new_path, Some(old_path))`.
///
/// Handles both `old => new` and `prefix/{old => new}/suffix`; empty brace
/// sides collapse the doubled slash they leave behind.
pub fn resolve_rename_spec(spec: &str) -> (String, Option<String>) {
    const ARROW: &str = " => ";

    if !spec.contains(ARROW) {
        return (unquote_path(spec), None);
    }

    if let (Some(open), Some(close)) = (spec.find('{'), spec.rfind('}')) {
        if open < close {
            let inner = &spec[open + 1..close];
            if let Some((old, new)) = inner.split_once(ARROW) {
                let prefix = &spec[..open];
                let suffix = &spec[close + 1..];
                let old_path = collapse_slashes(&format!("{prefix}{old}{suffix}"));
                let new_path = collapse_slashes(&format!("{prefix}{new}{suffix}"));
                return (new_path, Some(old_path));
            }
        }
    }

    match spec.split_once(ARROW) {
        Some((old, new)) => (unquote_path(new), Some(unquote_path(old))),
        None => (unquote_path(spec), None),
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out.trim_start_matches('/').to_string()
}

/// Undo git's C-style quoting of unusual paths (`"a\tb"`, `"caf\303\251"`).
///
/// `core.quotepath=false` keeps non-ASCII bytes verbatim, but control
/// characters, quotes and backslashes are still escaped.
pub fn unquote_path(path: &str) -> String {
    let inner = match path
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner,
        None => return path.to_string(),
    };

    let mut bytes: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        match chars.next() {
            Some('t') => bytes.push(b'\t'),
            Some('n') => bytes.push(b'\n'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some('"') => bytes.push(b'"'),
            Some('\\') => bytes.push(b'\\'),
            Some(d @ '0'..='7') => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(next) => {
                            value = value * 8 + next;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => {
                bytes.push(b'\\');
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
