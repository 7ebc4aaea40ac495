//! Log parsers: command-line arguments plus bulk and incremental decoding.

use crate::decoder::{RecordDecoder, RecordIter};
use crate::files::{parse_file_stats, parse_name_only};
use crate::format::FieldMapping;
use crate::patch::parse_file_patch;
use crate::record::{Record, RecordStats};
use std::sync::Arc;

/// How a record's trailing data (after the last field) is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordShape {
    /// Fields only; trailing data is ignored.
    Plain,
    /// `--name-only`: one path per line.
    Files,
    /// `--raw --numstat`: status, renames, submodules and line counts.
    FileStats,
    /// `-p`: one file's diff, first hunk extracted.
    Patch,
}

impl RecordShape {
    /// Extra arguments this shape needs on the `git log` command line.
    pub fn extra_args(self) -> &'static [&'static str] {
        match self {
            RecordShape::Plain => &[],
            RecordShape::Files => &["--name-only"],
            RecordShape::FileStats => &["--raw", "--numstat", "--no-abbrev"],
            RecordShape::Patch => &["-p"],
        }
    }

    /// Whether the record continues after its last field separator.
    pub fn has_trailing(self) -> bool {
        !matches!(self, RecordShape::Plain)
    }
}

/// A parser for one field mapping and one record shape.
///
/// Cheap to clone; the field names are shared with every record produced.
#[derive(Debug, Clone)]
pub struct LogParser {
    mapping: FieldMapping,
    shape: RecordShape,
    names: Arc<[String]>,
}

impl LogParser {
    /// Plain parser: declared fields only.
    pub fn new(mapping: FieldMapping) -> Self {
        Self::with_shape(mapping, RecordShape::Plain)
    }

    /// Fields followed by a `--name-only` file list.
    pub fn with_files(mapping: FieldMapping) -> Self {
        Self::with_shape(mapping, RecordShape::Files)
    }

    /// Fields followed by raw status and numstat blocks.
    pub fn with_file_stats(mapping: FieldMapping) -> Self {
        Self::with_shape(mapping, RecordShape::FileStats)
    }

    /// Fields followed by a single file's patch.
    pub fn with_patch(mapping: FieldMapping) -> Self {
        Self::with_shape(mapping, RecordShape::Patch)
    }

    /// Parser for an explicit shape.
    pub fn with_shape(mapping: FieldMapping, shape: RecordShape) -> Self {
        let names = mapping.shared_names();
        Self {
            mapping,
            shape,
            names,
        }
    }

    pub fn shape(&self) -> RecordShape {
        self.shape
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Arguments that make `git log` emit output this parser understands.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.mapping.format_arg()];
        args.extend(self.shape.extra_args().iter().map(|a| a.to_string()));
        args
    }

    /// Decode a complete buffer.
    pub fn parse(&self, data: &str) -> Vec<Record> {
        let mut decoder = self.decoder();
        let mut records = decoder.push(data);
        records.extend(decoder.finish());
        records
    }

    /// Decode a complete byte buffer; invalid UTF-8 is replaced.
    pub fn parse_bytes(&self, data: &[u8]) -> Vec<Record> {
        self.parse(&String::from_utf8_lossy(data))
    }

    /// A fresh incremental decoder.
    pub fn decoder(&self) -> RecordDecoder {
        RecordDecoder::new(self.clone())
    }

    /// Lazily decode a sequence of text chunks.
    pub fn parse_chunks<I, S>(&self, chunks: I) -> RecordIter<I::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RecordIter::new(self.decoder(), chunks.into_iter())
    }

    pub(crate) fn field_count(&self) -> usize {
        self.names.len()
    }

    /// Assemble a record from its terminated fields and trailing data.
    pub(crate) fn build(&self, values: Vec<String>, trailing: &str) -> Record {
        let record = Record::new(Arc::clone(&self.names), values);
        match self.shape {
            RecordShape::Plain => record,
            RecordShape::Files => record.with_files(parse_name_only(trailing)),
            RecordShape::FileStats => {
                let files = parse_file_stats(trailing);
                let stats = RecordStats::from_files(&files);
                record.with_files(files).with_stats(stats)
            }
            RecordShape::Patch => record.with_patch(parse_file_patch(trailing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FIELD_SEPARATOR as FS, RECORD_SEPARATOR as RS};
    use crate::record::FileStatus;

    fn mapping() -> FieldMapping {
        FieldMapping::new([("sha", "%H"), ("author", "%an"), ("message", "%B")]).unwrap()
    }

    fn commit(sha: &str, author: &str, message: &str, trailing: &str) -> String {
        format!("{RS}{sha}{FS}{author}{FS}{message}{FS}{trailing}")
    }

    #[test]
    fn test_args_per_shape() {
        assert_eq!(LogParser::new(mapping()).args().len(), 1);
        assert!(LogParser::with_files(mapping())
            .args()
            .contains(&"--name-only".to_string()));
        let stats_args = LogParser::with_file_stats(mapping()).args();
        assert!(stats_args.contains(&"--raw".to_string()));
        assert!(stats_args.contains(&"--numstat".to_string()));
        assert!(LogParser::with_patch(mapping()).args().contains(&"-p".to_string()));
    }

    #[test]
    fn test_plain_parse_keeps_raw_field_values() {
        let parser = LogParser::new(mapping());
        let data = format!(
            "{}{}",
            commit("a1", "Ada", "Subject\n\nBody with\ttab\n", "\n"),
            commit("b2", "Grace", "Second", "\n")
        );
        let records = parser.parse(&data);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("message"), Some("Subject\n\nBody with\ttab\n"));
        assert_eq!(records[1].get("author"), Some("Grace"));
        assert!(!records[0].has_files());
    }

    #[test]
    fn test_empty_records_skipped() {
        let parser = LogParser::new(mapping());
        let data = format!("{RS}{RS}{}{RS}", commit("a1", "Ada", "m", ""));
        let records = parser.parse(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("sha"), Some("a1"));
    }

    #[test]
    fn test_truncated_trailing_record_dropped() {
        let parser = LogParser::with_files(mapping());
        let data = format!("{}{RS}c3{FS}Lin", commit("a1", "Ada", "m", "\nx.rs\n"));
        let records = parser.parse(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("sha"), Some("a1"));
    }

    #[test]
    fn test_record_missing_fields_before_next_separator_dropped() {
        let parser = LogParser::new(mapping());
        let data = format!("{RS}only{FS}two{}", commit("b2", "Grace", "m", ""));
        let records = parser.parse(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("sha"), Some("b2"));
    }

    #[test]
    fn test_files_shape() {
        let parser = LogParser::with_files(mapping());
        let data = format!(
            "{}{}",
            commit("a1", "Ada", "m", "\n\nsrc/a.rs\nsrc/b.rs\n"),
            commit("b2", "Grace", "m", "\n")
        );
        let records = parser.parse(&data);
        assert_eq!(records[0].files().len(), 2);
        assert!(records[1].has_files());
        assert!(records[1].files().is_empty());
    }

    #[test]
    fn test_file_stats_round_trip() {
        let parser = LogParser::with_file_stats(mapping());
        let sub_old = "1".repeat(40);
        let sub_new = "2".repeat(40);
        let trailing = format!(
            "\n\n:100644 100644 {a} {b} R086\tsrc/old name.rs\tsrc/new name.rs\n\
             :160000 160000 {sub_old} {sub_new} M\tvendor/dep\n\
             :100755 100644 {a} {a} M\tscripts/run.sh\n\
             \n\
             4\t1\tsrc/{{old name.rs => new name.rs}}\n\
             1\t1\tvendor/dep\n\
             0\t0\tscripts/run.sh\n",
            a = "a".repeat(40),
            b = "b".repeat(40),
        );
        let data = commit("c0ffee", "Ada Lovelace", "Rename things\n", &trailing);
        let records = parser.parse(&data);
        assert_eq!(records.len(), 1);
        let record = &records[0];

        assert_eq!(record.get("sha"), Some("c0ffee"));
        assert_eq!(record.get("author"), Some("Ada Lovelace"));
        assert_eq!(record.get("message"), Some("Rename things\n"));

        let files = record.files();
        assert_eq!(files.len(), 3);

        assert_eq!(files[0].path, "src/new name.rs");
        assert_eq!(files[0].original_path.as_deref(), Some("src/old name.rs"));
        assert_eq!(files[0].status, Some(FileStatus::Renamed));
        assert_eq!(files[0].similarity, Some(86));
        assert_eq!(files[0].stats.map(|s| (s.added, s.deleted)), Some((4, 1)));

        assert_eq!(files[1].path, "vendor/dep");
        let submodule = files[1].submodule.as_ref().unwrap();
        assert_eq!(submodule.previous.as_deref(), Some(sub_old.as_str()));
        assert_eq!(submodule.current.as_deref(), Some(sub_new.as_str()));

        assert_eq!(files[2].path, "scripts/run.sh");
        assert_eq!(files[2].stats.map(|s| (s.added, s.deleted)), Some((0, 0)));

        let stats = record.stats().unwrap();
        assert_eq!(stats.files_changed, 3);
        assert_eq!(stats.additions, 5);
        assert_eq!(stats.deletions, 2);
    }

    #[test]
    fn test_patch_shape() {
        let parser = LogParser::with_patch(mapping());
        let data = format!(
            "{}{}",
            commit(
                "a1",
                "Ada",
                "m",
                "\n\ndiff --git a/f.rs b/f.rs\n--- a/f.rs\n+++ b/f.rs\n@@ -3,2 +3,4 @@\n-x\n+y\n"
            ),
            commit("b2", "Grace", "m", "\n")
        );
        let records = parser.parse(&data);
        let patch = records[0].patch().unwrap();
        assert_eq!(patch.path, "f.rs");
        assert_eq!(patch.current.count, 4);
        assert!(records[1].patch().is_none());
    }

    #[test]
    fn test_parse_bytes_lossy() {
        let parser = LogParser::new(mapping());
        let mut data = commit("a1", "Ada", "m", "").into_bytes();
        data[4] = 0xff;
        let records = parser.parse_bytes(&data);
        assert_eq!(records.len(), 1);
    }
}
