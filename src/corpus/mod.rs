//! Raw corpus handling.

mod parser;

pub use parser::{
    extract_term, open, parse, CorpusFormat, ParseStats, TermStream, UnknownFormat,
    FIELD_DELIMITER, PROGRESS_INTERVAL, TERM_FIELD_INDEX,
};
