//! Line grammar of the delta-alignment format
//!
//! ```text
//! @<offset>                 header: the record's own byte offset
//! ><reference id>           reference line
//! <query id>@<n>            query line, possibly empty; n is the sequence offset
//! s1 e1 s2 e2 err sim nonA  properties: exactly seven fields
//! <int> <int> ...           zero or more delta lines
//! *                         terminator
//! ```
//!
//! Blank lines are skipped everywhere except in the query slot, where an empty
//! line is an empty query.

use std::io::{BufRead, Seek, SeekFrom};
use std::path::Path;

use crate::error::{FormatError, Result};

/// Number of fields on a properties line
pub const N_PROPERTIES: usize = 7;

/// First byte of a header line
pub const HEADER_MARKER: u8 = b'@';

/// First byte of a reference line
pub const REFERENCE_MARKER: u8 = b'>';

/// First byte of a terminator line
pub const TERMINATOR: u8 = b'*';

/// Buffered line reader that tracks the byte offset of every line
pub(crate) struct LineReader<R> {
    inner: R,
    /// Offset of the first byte of the next line
    pos: u64,
    buf: Vec<u8>,
}
impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, pos: u64) -> Self {
        Self {
            inner,
            pos,
            buf: Vec::new(),
        }
    }

    /// Reads the next line without skipping blanks
    ///
    /// Returns the offset of the line and its content without the line ending.
    pub fn raw_line(&mut self) -> Result<Option<(u64, &str)>> {
        self.buf.clear();
        let start = self.pos;
        let n = self.inner.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.pos += n as u64;
        let line = std::str::from_utf8(&self.buf)?;
        Ok(Some((start, line.trim_end_matches(['\n', '\r']))))
    }

    /// Reads the next line that is not blank
    pub fn next_line(&mut self) -> Result<Option<(u64, &str)>> {
        loop {
            let Some((pos, line)) = self.raw_line()? else {
                return Ok(None);
            };
            if !line.trim().is_empty() {
                // hand out a fresh borrow of the same bytes
                let len = line.len();
                let line = std::str::from_utf8(&self.buf[..len])?;
                return Ok(Some((pos, line)));
            }
        }
    }
}
impl<R: BufRead + Seek> LineReader<R> {
    /// Moves to `offset`, dropping any buffered data
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }
}

/// The seven positional fields of a properties line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Properties {
    pub start1: i64,
    pub end1: i64,
    pub start2: i64,
    pub end2: i64,
    pub errors: i64,
    pub sim_errors: i64,
    pub non_alphas: i64,
}
impl Properties {
    /// Parses a properties line
    ///
    /// Fields that are not integers become `0`; only the field count is
    /// enforced.
    pub fn parse(line: &str, path: &Path, pos: u64) -> Result<Self> {
        let mut fields = [0i64; N_PROPERTIES];
        let mut found = 0;
        for token in line.split_whitespace() {
            if let Some(field) = fields.get_mut(found) {
                *field = token.parse().unwrap_or(0);
            }
            found += 1;
        }
        if found != N_PROPERTIES {
            return Err(FormatError::InvalidProperties {
                path: path.to_path_buf(),
                pos,
                found,
            }
            .into());
        }
        let [start1, end1, start2, end2, errors, sim_errors, non_alphas] = fields;
        Ok(Self {
            start1,
            end1,
            start2,
            end2,
            errors,
            sim_errors,
            non_alphas,
        })
    }
}

/// A record as written in the file, before its query is resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RawRecord {
    /// Offset reported by the header line
    pub id: u64,
    pub reference: String,
    pub query: String,
    /// Offset of the query line, for error reporting
    pub query_pos: u64,
    pub properties: Properties,
    pub deltas: Vec<i64>,
}

/// How much of a record body to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detail {
    /// Keep everything
    Full,
    /// Validate the body but do not collect delta values
    Skim,
}

/// Reads one record from the current position
///
/// Returns `None` if only blank lines remain.
pub(crate) fn read_record<R: BufRead>(
    lines: &mut LineReader<R>,
    path: &Path,
    detail: Detail,
) -> Result<Option<RawRecord>> {
    let truncated = |record: u64| FormatError::TruncatedRecord {
        path: path.to_path_buf(),
        record,
    };

    // header
    let Some((record_pos, line)) = lines.next_line()? else {
        return Ok(None);
    };
    let Some(offset) = line.strip_prefix(HEADER_MARKER as char) else {
        return Err(FormatError::MissingHeader {
            path: path.to_path_buf(),
            pos: record_pos,
            line: line.to_string(),
        }
        .into());
    };
    let Ok(id) = offset.trim().parse::<u64>() else {
        return Err(FormatError::InvalidHeader {
            path: path.to_path_buf(),
            pos: record_pos,
            line: line.to_string(),
        }
        .into());
    };
    let mut record = RawRecord {
        id,
        ..RawRecord::default()
    };

    // reference
    let (pos, line) = lines.next_line()?.ok_or_else(|| truncated(record_pos))?;
    let Some(reference) = line.strip_prefix(REFERENCE_MARKER as char) else {
        return Err(FormatError::MissingReference {
            path: path.to_path_buf(),
            pos,
            line: line.to_string(),
        }
        .into());
    };
    record.reference = reference.trim().to_string();

    // query, which may be empty
    let (pos, line) = lines.raw_line()?.ok_or_else(|| truncated(record_pos))?;
    record.query = line.trim().to_string();
    record.query_pos = pos;

    // properties
    let (pos, line) = lines.next_line()?.ok_or_else(|| truncated(record_pos))?;
    record.properties = Properties::parse(line, path, pos)?;

    // deltas
    loop {
        let (pos, line) = lines.next_line()?.ok_or_else(|| truncated(record_pos))?;
        if line.starts_with(TERMINATOR as char) {
            break;
        }
        for token in line.split_whitespace() {
            let Ok(value) = token.parse::<i64>() else {
                return Err(FormatError::InvalidDelta {
                    path: path.to_path_buf(),
                    pos,
                    token: token.to_string(),
                }
                .into());
            };
            if detail == Detail::Full {
                record.deltas.push(value);
            }
        }
    }

    Ok(Some(record))
}
