//! Line-oriented corpus parsing.
//!
//! [`TermStream`] pulls one line at a time from a `BufRead`, so memory use is
//! bounded by the longest line, not the corpus size. Malformed lines are
//! counted and skipped; only I/O errors end the stream early.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry;

/// Field separator in delimited records.
pub const FIELD_DELIMITER: char = '|';

/// Zero-based position of the term in a delimited record.
pub const TERM_FIELD_INDEX: usize = 14;

/// Progress is logged every this many lines.
pub const PROGRESS_INTERVAL: u64 = 500_000;

const READ_BUFFER_BYTES: usize = 1 << 20;

/// Layout of a raw corpus file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorpusFormat {
    /// Pipe-delimited rows with the term in field 14 (MRCONSO.RRF).
    #[default]
    #[serde(rename = "rrf")]
    DelimitedRecords,
    /// One term per line.
    #[serde(rename = "terms")]
    LineList,
}

impl CorpusFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DelimitedRecords => "rrf",
            Self::LineList => "terms",
        }
    }
}

impl fmt::Display for CorpusFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown corpus format: {0} (expected rrf or terms)")]
pub struct UnknownFormat(pub String);

impl FromStr for CorpusFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rrf" | "delimited" => Ok(Self::DelimitedRecords),
            "terms" | "lines" => Ok(Self::LineList),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// Counters accumulated while a stream is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub lines: u64,
    pub terms: u64,
    pub skipped: u64,
    /// True when the term cap stopped enumeration with input remaining.
    pub truncated: bool,
}

/// Extract the term from one line (terminator already stripped).
pub fn extract_term(line: &str, format: CorpusFormat) -> Option<String> {
    match format {
        CorpusFormat::DelimitedRecords => line
            .split(FIELD_DELIMITER)
            .nth(TERM_FIELD_INDEX)
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string),
        CorpusFormat::LineList => {
            if line.trim().is_empty() {
                None
            } else {
                Some(line.to_string())
            }
        }
    }
}

/// Lazy, single-pass sequence of terms.
pub struct TermStream<R> {
    reader: R,
    format: CorpusFormat,
    max_terms: Option<u64>,
    buf: Vec<u8>,
    stats: ParseStats,
    done: bool,
}

/// Parse `reader` as `format`, stopping after `max_terms` terms when set.
pub fn parse<R: BufRead>(reader: R, format: CorpusFormat, max_terms: Option<usize>) -> TermStream<R> {
    TermStream {
        reader,
        format,
        max_terms: max_terms.filter(|&cap| cap > 0).map(|cap| cap as u64),
        buf: Vec::new(),
        stats: ParseStats::default(),
        done: false,
    }
}

/// Open a local corpus file with a large read buffer.
pub fn open(
    path: &Path,
    format: CorpusFormat,
    max_terms: Option<usize>,
) -> io::Result<TermStream<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(parse(BufReader::with_capacity(READ_BUFFER_BYTES, file), format, max_terms))
}

impl<R: BufRead> TermStream<R> {
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn format(&self) -> CorpusFormat {
        self.format
    }

    fn next_term(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.stats.lines += 1;
            if self.stats.lines % PROGRESS_INTERVAL == 0 {
                tracing::info!(lines = self.stats.lines, terms = self.stats.terms, "Processed corpus lines");
            }

            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim_end_matches(['\n', '\r']);
            match extract_term(line, self.format) {
                Some(term) => return Ok(Some(term)),
                None => self.stats.skipped += 1,
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        if self.stats.skipped > 0 {
            tracing::info!(
                skipped = self.stats.skipped,
                format = %self.format,
                "Skipped malformed corpus rows"
            );
            telemetry::record_skipped_records(self.stats.skipped);
        }
    }
}

impl<R: BufRead> Iterator for TermStream<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(cap) = self.max_terms {
            if self.stats.terms >= cap {
                // Peek once so a corpus of exactly `cap` terms is not
                // reported as truncated.
                match self.next_term() {
                    Ok(Some(_)) => {
                        self.stats.truncated = true;
                        tracing::warn!(max_terms = cap, "Reached term cap; result is truncated");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
                self.finish();
                return None;
            }
        }

        match self.next_term() {
            Ok(Some(term)) => {
                self.stats.terms += 1;
                Some(Ok(term))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
