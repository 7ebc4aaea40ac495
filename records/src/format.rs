//! Delimiters and field mappings for git's `--format` mini-language.
//!
//! Every record starts with [`RECORD_SEPARATOR`] and every declared field is
//! terminated by [`FIELD_SEPARATOR`]:
//!
//! ```text
//! RS <field 1> FS <field 2> FS ... <field N> FS <trailing data>
//! ```
//!
//! Anything git prints after the last field separator (file lists, stats,
//! patches) is the record's trailing data and belongs to it until the next
//! record separator.

use crate::error::{RecordError, Result};
use std::sync::Arc;

/// ASCII Record Separator, marks the start of every record.
pub const RECORD_SEPARATOR: char = '\x1e';

/// ASCII Group Separator, terminates every declared field.
pub const FIELD_SEPARATOR: char = '\x1d';

/// Placeholder spelling of the separators inside a `--format` string.
const RECORD_SEPARATOR_PLACEHOLDER: &str = "%x1E";
const FIELD_SEPARATOR_PLACEHOLDER: &str = "%x1D";

/// Ordered mapping from field name to a git format placeholder.
///
/// The declaration order is the authoritative decoding order: placeholders are
/// injected into the format string verbatim, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    names: Arc<[String]>,
    placeholders: Vec<String>,
}

impl FieldMapping {
    /// Build a mapping from `(name, placeholder)` pairs.
    pub fn new<I, N, P>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        let mut placeholders = Vec::new();

        for (name, placeholder) in pairs {
            let name = name.into();
            let placeholder = placeholder.into();

            if name.is_empty() {
                return Err(RecordError::invalid_field(name, "name is empty"));
            }
            if names.contains(&name) {
                return Err(RecordError::DuplicateField(name));
            }
            if contains_separator(&placeholder) {
                return Err(RecordError::invalid_field(
                    name,
                    "placeholder contains a reserved separator",
                ));
            }

            names.push(name);
            placeholders.push(placeholder);
        }

        if names.is_empty() {
            return Err(RecordError::EmptyMapping);
        }

        Ok(Self {
            names: names.into(),
            placeholders,
        })
    }

    /// The common commit fields used by log-style views.
    pub fn commit() -> Self {
        Self {
            names: [
                "sha",
                "parents",
                "author_name",
                "author_email",
                "author_date",
                "committer_date",
                "subject",
                "body",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into(),
            placeholders: ["%H", "%P", "%an", "%ae", "%at", "%ct", "%s", "%b"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false; an empty mapping cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn shared_names(&self) -> Arc<[String]> {
        Arc::clone(&self.names)
    }

    /// The value for git's `--format=` option.
    pub fn format_string(&self) -> String {
        let mut format = String::from(RECORD_SEPARATOR_PLACEHOLDER);
        for placeholder in &self.placeholders {
            format.push_str(placeholder);
            format.push_str(FIELD_SEPARATOR_PLACEHOLDER);
        }
        format
    }

    /// The complete `--format=...` argument.
    pub fn format_arg(&self) -> String {
        format!("--format={}", self.format_string())
    }
}

fn contains_separator(placeholder: &str) -> bool {
    let lower = placeholder.to_ascii_lowercase();
    placeholder.contains(RECORD_SEPARATOR)
        || placeholder.contains(FIELD_SEPARATOR)
        || lower.contains("%x1e")
        || lower.contains("%x1d")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_string_preserves_order() {
        let mapping = FieldMapping::new([("sha", "%H"), ("date", "%at"), ("subject", "%s")]).unwrap();
        assert_eq!(mapping.format_string(), "%x1E%H%x1D%at%x1D%s%x1D");
        assert_eq!(mapping.format_arg(), "--format=%x1E%H%x1D%at%x1D%s%x1D");
        assert_eq!(mapping.names(), &["sha", "date", "subject"]);
    }

    #[test]
    fn test_empty_mapping_rejected() {
        let pairs: Vec<(&str, &str)> = vec![];
        assert_eq!(FieldMapping::new(pairs), Err(RecordError::EmptyMapping));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = FieldMapping::new([("sha", "%H"), ("sha", "%h")]);
        assert_eq!(result, Err(RecordError::DuplicateField("sha".to_string())));
    }

    #[test]
    fn test_separator_in_placeholder_rejected() {
        assert!(FieldMapping::new([("bad", "%H%x1d")]).is_err());
        assert!(FieldMapping::new([("bad", "a\x1eb")]).is_err());
    }

    #[test]
    fn test_commit_mapping() {
        let mapping = FieldMapping::commit();
        assert_eq!(mapping.len(), 8);
        assert!(mapping.format_string().starts_with("%x1E%H%x1D%P%x1D"));
    }
}
