//! Error types for gitlore-records

use thiserror::Error;

/// Errors that can occur while building parsers or decoding output
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A field mapping must declare at least one field
    #[error("Field mapping is empty")]
    EmptyMapping,

    /// Two fields share the same name
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    /// A field name or placeholder would corrupt the format string
    #[error("Invalid field {name}: {reason}")]
    InvalidField { name: String, reason: String },

    /// A hunk header could not be decoded
    #[error("Invalid hunk header: {0}")]
    InvalidHunkHeader(String),
}

impl RecordError {
    /// Create an invalid field error
    pub fn invalid_field(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for record operations
pub type Result<T> = std::result::Result<T, RecordError>;
