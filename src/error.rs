use std::path::PathBuf;

/// Custom Result type for seqdelta operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the seqdelta library, encompassing all possible error cases
/// that can occur while indexing and reading delta and sequence files.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Grammar violations or premature end of file in delta text
    FormatError(#[from] FormatError),
    /// Errors that occur during record access
    ReadError(#[from] ReadError),
    /// Errors related to the secondary position index
    IndexError(#[from] IndexError),
    /// Invalid or missing constructor arguments
    ArgumentError(#[from] ArgumentError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Errors raised by the FASTA grammar parser
    FastaError(#[from] seq_io::fasta::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
}
impl Error {
    /// Returns true if this error is a structural violation of the delta grammar
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(self, Self::FormatError(_))
    }

    /// Returns true if a record disagreed with the offset it was requested at
    #[must_use]
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::Consistency { .. }))
    }

    /// Returns true if an ordinal index was outside the record range
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::OutOfRange(..)))
    }
}

/// Structural violations of the delta-alignment line grammar
///
/// Every variant carries the path of the delta file and the byte offset of the
/// line (or record) at which the violation was detected.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// A record did not begin with an `@<offset>` header line
    #[error("Expected a header line at byte {pos} of {path:?}, found: {line:?}")]
    MissingHeader {
        path: PathBuf,
        pos: u64,
        line: String,
    },

    /// The header line did not hold a valid offset
    #[error("Invalid header offset at byte {pos} of {path:?}: {line:?}")]
    InvalidHeader {
        path: PathBuf,
        pos: u64,
        line: String,
    },

    /// The line after the header was not a `>` reference line
    #[error("Expected a reference line at byte {pos} of {path:?}, found: {line:?}")]
    MissingReference {
        path: PathBuf,
        pos: u64,
        line: String,
    },

    /// The query line was not empty and lacked a trailing `@<offset>` tag
    #[error("Query line at byte {pos} of {path:?} has no sequence offset: {line:?}")]
    InvalidQueryTag {
        path: PathBuf,
        pos: u64,
        line: String,
    },

    /// The properties line did not hold exactly seven fields
    ///
    /// # Fields
    /// * `found` - The number of whitespace separated fields on the line
    #[error("Expected 7 property fields at byte {pos} of {path:?}, found {found}")]
    InvalidProperties {
        path: PathBuf,
        pos: u64,
        found: usize,
    },

    /// A delta line held a token that is not an integer
    #[error("Invalid delta value {token:?} at byte {pos} of {path:?}")]
    InvalidDelta {
        path: PathBuf,
        pos: u64,
        token: String,
    },

    /// No record was found at a requested offset because the file ended there
    #[error("Unexpected end of file at byte {pos} of {path:?}")]
    UnexpectedEof { path: PathBuf, pos: u64 },

    /// The file ended before the record starting at `record` was terminated
    #[error("Record at byte {record} of {path:?} is truncated before its terminator")]
    TruncatedRecord { path: PathBuf, record: u64 },
}

/// Errors that can occur while accessing records
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The header found at a requested offset reports a different offset
    ///
    /// # Fields
    /// * `expected` - The offset the record was requested at
    /// * `found` - The offset written in the record header
    /// * `path` - The delta file
    #[error("Record requested at offset {expected} reports offset {found} in {path:?}")]
    Consistency {
        expected: u64,
        found: u64,
        path: PathBuf,
    },

    /// Attempted to access a record index that is beyond the available range
    ///
    /// # Arguments
    /// * First `usize` - The requested record index
    /// * Second `usize` - The number of records available
    #[error("Requested record index ({0}) is out of record range ({1})")]
    OutOfRange(usize, usize),

    /// The sequence referenced by a query line could not be found
    ///
    /// # Fields
    /// * `query` - The query line of the record
    /// * `offset` - The sequence offset decoded from the query line
    #[error("No sequence at offset {offset} for query {query:?}")]
    UnresolvedQuery { query: String, offset: u64 },

    /// A sequence was requested at an offset that does not hold a `>` marker
    ///
    /// # Fields
    /// * `path` - The FASTA file
    /// * `offset` - The requested offset
    #[error("No record starts at byte {offset} of {path:?}")]
    NotARecordStart { path: PathBuf, offset: u64 },

    /// The parser was already opened once
    #[error("Parser for {0:?} is already open")]
    AlreadyOpen(PathBuf),

    /// The parser was used after it was closed
    #[error("Parser for {0:?} is closed")]
    Closed(PathBuf),
}

/// Errors raised by the secondary position index
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The index file held fewer bytes than a full slot at a valid index
    ///
    /// # Fields
    /// * `slot` - The record index being read
    /// * `read` - The number of bytes available for the slot
    #[error("Position index is corrupted: slot {slot} holds {read} of 8 bytes")]
    Corrupted { slot: usize, read: usize },
}

/// Invalid or missing constructor arguments
#[derive(thiserror::Error, Debug)]
pub enum ArgumentError {
    /// No path was provided
    #[error("An empty path was provided")]
    EmptyPath,

    /// The provided path exists but does not name a regular file
    #[error("Path is not a regular file: {0:?}")]
    NotAFile(PathBuf),

    /// The point-access buffer must hold at least a few bytes
    #[error("Invalid buffer capacity: {0}")]
    InvalidBufferCapacity(usize),
}
