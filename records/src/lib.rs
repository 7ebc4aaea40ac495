//! Gitlore Records
//!
//! Decoding of delimiter-separated `git log` output into structured records,
//! and the age-bucketing engine that turns commit timestamps into heat.
//!
//! ## Features
//!
//! - **Custom delimiters** - records and fields are separated by ASCII control
//!   bytes so paths and messages may contain newlines and tabs
//! - **Four record shapes** - plain fields, name-only file lists, raw+numstat
//!   file lists, and single-file patches
//! - **Incremental decoding** - records are yielded as soon as they close, so
//!   callers can start work before the subprocess exits
//! - **Heatmap** - relative-age buckets and opacity from a set of timestamps
//!
//! ## Example
//!
//! ```
//! use gitlore_records::{FieldMapping, LogParser};
//!
//! let mapping = FieldMapping::new([("sha", "%H"), ("author", "%an")]).unwrap();
//! let parser = LogParser::with_files(mapping);
//!
//! // `parser.args()` goes on the `git log` command line
//! assert!(parser.args().iter().any(|a| a == "--name-only"));
//!
//! let output = "\x1eabc123\x1dAda\x1d\n\nsrc/lib.rs\n";
//! let records = parser.parse(output);
//! assert_eq!(records[0].get("author"), Some("Ada"));
//! assert_eq!(records[0].files()[0].path, "src/lib.rs");
//! ```

pub mod decoder;
pub mod error;
pub mod files;
pub mod format;
pub mod heatmap;
pub mod parser;
pub mod patch;
pub mod record;

// Re-exports for convenience
pub use decoder::{RecordDecoder, RecordIter, Utf8Chunker};
pub use error::{RecordError, Result};
pub use format::{FieldMapping, FIELD_SEPARATOR, RECORD_SEPARATOR};
pub use heatmap::{AgeClassifier, Heat, HeatmapConfig, LookupTable, BUCKET_COUNT};
pub use parser::{LogParser, RecordShape};
pub use patch::{FilePatch, HunkRange};
pub use record::{FileChange, FileStatus, LineStats, Record, RecordStats, SubmoduleChange};
