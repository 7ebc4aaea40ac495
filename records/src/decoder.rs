//! Incremental record decoding over arbitrarily split input.

use crate::format::{FIELD_SEPARATOR, RECORD_SEPARATOR};
use crate::parser::LogParser;
use crate::record::Record;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing seen yet; anything before the first record separator is noise.
    BeforeFirst,
    /// Collecting declared fields.
    Fields,
    /// All fields terminated; collecting trailing data.
    Trailing,
    /// Plain record already emitted; skipping to the next separator.
    Skipping,
    Done,
}

/// Push-based decoder. Feed chunks with [`push`](Self::push), then call
/// [`finish`](Self::finish) once input ends.
///
/// A record is emitted only once every declared field has been terminated.
/// Shapes with trailing data emit at the next record separator or at
/// `finish`. Input that ends mid-field is discarded.
#[derive(Debug)]
pub struct RecordDecoder {
    parser: LogParser,
    state: State,
    values: Vec<String>,
    current: String,
    trailing: String,
    discarded: usize,
}

impl RecordDecoder {
    pub fn new(parser: LogParser) -> Self {
        Self {
            parser,
            state: State::BeforeFirst,
            values: Vec::new(),
            current: String::new(),
            trailing: String::new(),
            discarded: 0,
        }
    }

    /// Consume a chunk, returning every record it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<Record> {
        let mut out = Vec::new();
        let mut rest = chunk;

        while !rest.is_empty() {
            match self.state {
                State::Done => break,
                State::BeforeFirst | State::Skipping => match rest.find(RECORD_SEPARATOR) {
                    Some(index) => {
                        rest = &rest[index + RECORD_SEPARATOR.len_utf8()..];
                        self.begin();
                    }
                    None => rest = "",
                },
                State::Fields => match rest.find([RECORD_SEPARATOR, FIELD_SEPARATOR]) {
                    Some(index) => {
                        self.current.push_str(&rest[..index]);
                        let is_field_end = rest[index..].starts_with(FIELD_SEPARATOR);
                        // Both separators are single-byte
                        rest = &rest[index + 1..];

                        if is_field_end {
                            self.end_field(&mut out);
                        } else {
                            self.abandon();
                            self.begin();
                        }
                    }
                    None => {
                        self.current.push_str(rest);
                        rest = "";
                    }
                },
                State::Trailing => match rest.find(RECORD_SEPARATOR) {
                    Some(index) => {
                        self.trailing.push_str(&rest[..index]);
                        rest = &rest[index + RECORD_SEPARATOR.len_utf8()..];
                        out.push(self.emit());
                        self.begin();
                    }
                    None => {
                        self.trailing.push_str(rest);
                        rest = "";
                    }
                },
            }
        }

        out
    }

    /// Signal end of input. Returns the last record when it was complete.
    ///
    /// Further pushes are ignored.
    pub fn finish(&mut self) -> Option<Record> {
        let last = match self.state {
            State::Trailing => Some(self.emit()),
            State::Fields => {
                self.abandon();
                None
            }
            _ => None,
        };
        self.state = State::Done;
        last
    }

    /// Number of non-empty records dropped because they were incomplete.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    fn begin(&mut self) {
        self.values.clear();
        self.current.clear();
        self.trailing.clear();
        self.state = State::Fields;
    }

    fn end_field(&mut self, out: &mut Vec<Record>) {
        self.values.push(std::mem::take(&mut self.current));
        if self.values.len() < self.parser.field_count() {
            return;
        }

        if self.parser.shape().has_trailing() {
            self.state = State::Trailing;
        } else {
            let values = std::mem::take(&mut self.values);
            out.push(self.parser.build(values, ""));
            self.state = State::Skipping;
        }
    }

    fn emit(&mut self) -> Record {
        let values = std::mem::take(&mut self.values);
        let trailing = std::mem::take(&mut self.trailing);
        self.parser.build(values, &trailing)
    }

    fn abandon(&mut self) {
        if !self.values.is_empty() || !self.current.trim().is_empty() {
            self.discarded += 1;
        }
        self.values.clear();
        self.current.clear();
    }
}

/// Lazy iterator of records over an iterator of text chunks.
pub struct RecordIter<I> {
    decoder: RecordDecoder,
    chunks: I,
    ready: VecDeque<Record>,
    exhausted: bool,
}

impl<I> RecordIter<I> {
    pub(crate) fn new(decoder: RecordDecoder, chunks: I) -> Self {
        Self {
            decoder,
            chunks,
            ready: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<I, S> Iterator for RecordIter<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(record);
            }
            if self.exhausted {
                return None;
            }
            match self.chunks.next() {
                Some(chunk) => self.ready.extend(self.decoder.push(chunk.as_ref())),
                None => {
                    self.exhausted = true;
                    self.ready.extend(self.decoder.finish());
                }
            }
        }
    }
}

/// Reassembles UTF-8 text from byte chunks that may split a code point.
///
/// Invalid sequences are replaced with U+FFFD; an incomplete sequence at the
/// end of a chunk is held back until the next one.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    carry: Vec<u8>,
}

impl Utf8Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any held-back prefix) as possible.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.carry.len());
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.carry[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.carry.len();
                    break;
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.carry[start..valid_end]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.carry.drain(..start);
        out
    }

    /// Flush a dangling partial sequence at end of input.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        rest
    }
}
