use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace};

use super::grammar::{read_record, Detail, LineReader, RawRecord};
use super::DeltaRecord;
use crate::{
    error::{ArgumentError, FormatError, ReadError, Result},
    fasta::validate_path,
    paired, Sequence, SequenceStore,
};

type FileLines = LineReader<BufReader<File>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Unopened,
    Open,
    Closed,
}

/// Parser for delta-alignment files
///
/// The parser offers two access modes over the same file:
///
/// * point access ([`DeltaParser::get_at`], [`DeltaParser::query_id_at`]) through
///   one persistent reader that seeks to the requested offset and checks that the
///   record found there reports that same offset;
/// * streaming ([`DeltaParser::parse`], [`DeltaParser::parse_from`],
///   [`DeltaParser::positions`], [`DeltaParser::query_ids`]) where every call
///   returns an independent cursor owning its own reader.
///
/// Cursors borrow the parser, so all of them are gone by the time
/// [`DeltaParser::close`] runs.
pub struct DeltaParser {
    path: PathBuf,
    sequences: Rc<SequenceStore>,
    state: Cell<ParserState>,
    /// Persistent reader for point access, opened lazily
    point: RefCell<Option<FileLines>>,
    /// Number of streaming cursors currently alive
    live: Cell<usize>,
}
impl DeltaParser {
    /// Creates a parser resolving queries through `sequences`
    ///
    /// The file is not touched until the parser is opened, either explicitly
    /// with [`DeltaParser::open`] or implicitly by the first access.
    pub fn new<P: AsRef<Path>>(path: P, sequences: Rc<SequenceStore>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ArgumentError::EmptyPath.into());
        }
        Ok(Self {
            path: path.to_path_buf(),
            sequences,
            state: Cell::new(ParserState::Unopened),
            point: RefCell::new(None),
            live: Cell::new(0),
        })
    }

    /// Opens the parser
    ///
    /// A parser may be opened once in its lifetime; any further call fails
    /// with [`ReadError::AlreadyOpen`], also after [`DeltaParser::close`].
    pub fn open(&self) -> Result<()> {
        if self.state.get() != ParserState::Unopened {
            return Err(ReadError::AlreadyOpen(self.path.clone()).into());
        }
        validate_path(&self.path)?;
        self.state.set(ParserState::Open);
        debug!(path = ?self.path, "opened delta parser");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state.get() {
            ParserState::Unopened => self.open(),
            ParserState::Open => Ok(()),
            ParserState::Closed => Err(ReadError::Closed(self.path.clone()).into()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The store used to resolve query sequences
    #[must_use]
    pub fn sequences(&self) -> &Rc<SequenceStore> {
        &self.sequences
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.get() == ParserState::Open
    }

    /// Number of streaming cursors currently alive
    #[must_use]
    pub fn live_cursors(&self) -> usize {
        self.live.get()
    }

    fn open_reader(&self, offset: u64) -> Result<FileLines> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(LineReader::new(BufReader::new(file), offset))
    }

    fn cursor(&self, offset: u64, detail: Detail) -> Result<RawCursor<'_>> {
        self.ensure_open()?;
        let lines = self.open_reader(offset)?;
        self.live.set(self.live.get() + 1);
        debug!(path = ?self.path, offset, live = self.live.get(), "opened delta cursor");
        Ok(RawCursor {
            parser: self,
            lines,
            detail,
            finished: false,
        })
    }

    /// Reads the raw record at `offset` through the persistent reader
    fn point_record(&self, offset: u64, detail: Detail) -> Result<RawRecord> {
        self.ensure_open()?;
        let mut slot = self.point.borrow_mut();
        let lines = match slot.take() {
            Some(lines) => lines,
            None => {
                debug!(path = ?self.path, "opening delta point reader");
                self.open_reader(0)?
            }
        };
        let lines = slot.insert(lines);

        trace!(offset, "delta point access");
        lines.seek(offset)?;
        let Some(record) = read_record(lines, &self.path, detail)? else {
            return Err(FormatError::UnexpectedEof {
                path: self.path.clone(),
                pos: offset,
            }
            .into());
        };
        if record.id != offset {
            return Err(ReadError::Consistency {
                expected: offset,
                found: record.id,
                path: self.path.clone(),
            }
            .into());
        }
        Ok(record)
    }

    fn reference(&self, raw: &RawRecord) -> Sequence {
        Sequence::placeholder(raw.reference.clone(), self.sequences.alphabet())
    }

    /// Resolves the query line of a record through the sequence store
    fn resolve_query(&self, raw: &RawRecord) -> Result<Option<Rc<Sequence>>> {
        if raw.query.is_empty() {
            return Ok(None);
        }
        let Some(offset) = paired::offset_of(&raw.query) else {
            return Err(FormatError::InvalidQueryTag {
                path: self.path.clone(),
                pos: raw.query_pos,
                line: raw.query.clone(),
            }
            .into());
        };
        match self.sequences.get_at(offset)? {
            Some(sequence) => Ok(Some(sequence)),
            None => Err(ReadError::UnresolvedQuery {
                query: raw.query.clone(),
                offset,
            }
            .into()),
        }
    }

    /// Returns the record whose header is at `offset`
    ///
    /// Fails with a consistency error if the header found at `offset` reports a
    /// different offset, and with a format error if no header is found there.
    /// The query sequence is resolved anew on every call.
    pub fn get_at(&self, offset: u64) -> Result<DeltaRecord> {
        let raw = self.point_record(offset, Detail::Full)?;
        let query = self.resolve_query(&raw)?;
        let reference = self.reference(&raw);
        Ok(DeltaRecord::from_raw(raw, reference, query))
    }

    /// Returns the query line of the record whose header is at `offset`
    ///
    /// The query sequence is not resolved.
    pub fn query_id_at(&self, offset: u64) -> Result<String> {
        self.point_record(offset, Detail::Skim).map(|raw| raw.query)
    }

    /// Streams every record from the start of the file
    pub fn parse(&self) -> Result<DeltaRecords<'_>> {
        self.parse_from(0)
    }

    /// Streams records starting at `offset`, which must be a record header
    pub fn parse_from(&self, offset: u64) -> Result<DeltaRecords<'_>> {
        Ok(DeltaRecords {
            raw: self.cursor(offset, Detail::Full)?,
            last_query: None,
        })
    }

    /// Streams the offset reported by every record header
    pub fn positions(&self) -> Result<Positions<'_>> {
        Ok(Positions {
            raw: self.cursor(0, Detail::Skim)?,
        })
    }

    /// Streams `(offset, query line)` pairs without resolving sequences
    pub fn query_ids(&self) -> Result<QueryIds<'_>> {
        Ok(QueryIds {
            raw: self.cursor(0, Detail::Skim)?,
        })
    }

    /// Releases the point reader
    ///
    /// Streaming cursors borrow the parser and have therefore already released
    /// their readers. Safe to call repeatedly; the parser cannot be reopened.
    pub fn close(&mut self) {
        if self.state.get() == ParserState::Closed {
            return;
        }
        self.point.get_mut().take();
        self.state.set(ParserState::Closed);
        debug!(path = ?self.path, "closed delta parser");
    }
}
impl std::fmt::Debug for DeltaParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaParser")
            .field("path", &self.path)
            .field("state", &self.state.get())
            .field("live", &self.live.get())
            .finish_non_exhaustive()
    }
}

/// Forward-only cursor over raw records, registered with its parser while alive
struct RawCursor<'a> {
    parser: &'a DeltaParser,
    lines: FileLines,
    detail: Detail,
    finished: bool,
}
impl RawCursor<'_> {
    fn next_raw(&mut self) -> Option<Result<RawRecord>> {
        if self.finished {
            return None;
        }
        match read_record(&mut self.lines, &self.parser.path, self.detail) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
impl Drop for RawCursor<'_> {
    fn drop(&mut self) {
        let live = self.parser.live.get().saturating_sub(1);
        self.parser.live.set(live);
        trace!(live, "released delta cursor");
    }
}

/// Streaming cursor over fully resolved records
///
/// Consecutive records with the same query line share one resolved
/// `Rc<Sequence>` instead of resolving it again.
pub struct DeltaRecords<'a> {
    raw: RawCursor<'a>,
    /// Query line and resolved sequence of the previous record
    last_query: Option<(String, Option<Rc<Sequence>>)>,
}
impl DeltaRecords<'_> {
    fn resolve(&mut self, raw: &RawRecord) -> Result<Option<Rc<Sequence>>> {
        if let Some((query, sequence)) = &self.last_query {
            if *query == raw.query {
                return Ok(sequence.clone());
            }
        }
        let sequence = self.raw.parser.resolve_query(raw)?;
        self.last_query = Some((raw.query.clone(), sequence.clone()));
        Ok(sequence)
    }
}
impl Iterator for DeltaRecords<'_> {
    type Item = Result<DeltaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.raw.next_raw()? {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e)),
        };
        let query = match self.resolve(&raw) {
            Ok(query) => query,
            Err(e) => {
                self.raw.finished = true;
                return Some(Err(e));
            }
        };
        let reference = self.raw.parser.reference(&raw);
        Some(Ok(DeltaRecord::from_raw(raw, reference, query)))
    }
}

/// Streaming cursor over the offsets reported by record headers
pub struct Positions<'a> {
    raw: RawCursor<'a>,
}
impl Iterator for Positions<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        self.raw.next_raw().map(|raw| raw.map(|raw| raw.id))
    }
}

/// Streaming cursor over `(offset, query line)` pairs
pub struct QueryIds<'a> {
    raw: RawCursor<'a>,
}
impl Iterator for QueryIds<'_> {
    type Item = Result<(u64, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.raw.next_raw().map(|raw| raw.map(|raw| (raw.id, raw.query)))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const READS: &[u8] = b">readA\nACGT\n>readB!1\nGGGG\n>readB!2\nAACC\n";

    /// Writes records laid out so that every header reports its own offset
    fn delta_text(bodies: &[(&str, &str, &str)]) -> String {
        let mut text = String::new();
        for (reference, query, deltas) in bodies {
            let offset = text.len();
            text.push_str(&format!(
                "@{offset}\n>{reference}\n{query}\n1 10 1 10 0 0 0\n{deltas}*\n"
            ));
        }
        text
    }

    fn write(data: &[u8]) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(file)
    }

    struct Fixture {
        _reads: NamedTempFile,
        delta: NamedTempFile,
        parser: DeltaParser,
    }

    fn fixture(text: &str) -> Result<Fixture> {
        let reads = write(READS)?;
        let delta = write(text.as_bytes())?;
        let sequences = Rc::new(
            crate::SequenceStoreBuilder::default()
                .buffer_capacity(1024)
                .build(reads.path())?,
        );
        let parser = DeltaParser::new(delta.path(), sequences)?;
        Ok(Fixture {
            _reads: reads,
            delta,
            parser,
        })
    }

    fn three_records() -> String {
        delta_text(&[
            ("chr1", "readA!@0", "5\n-3\n"),
            ("chr1", "readA!@0", ""),
            ("chr2", "readB!2@26", "1 2 3\n"),
        ])
    }

    #[test]
    fn test_stream_and_point_agree() -> Result<()> {
        let fx = fixture(&three_records())?;
        let streamed = fx.parser.parse()?.collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(streamed.len(), 3);
        assert_eq!(streamed[0].deltas, vec![5, -3]);
        assert_eq!(streamed[2].deltas, vec![1, 2, 3]);
        assert_eq!(streamed[2].reference.id, "chr2");

        for record in streamed.iter().rev() {
            assert_eq!(&fx.parser.get_at(record.id)?, record);
        }
        Ok(())
    }

    #[test]
    fn test_stream_reuses_query() -> Result<()> {
        let fx = fixture(&three_records())?;
        let streamed = fx.parser.parse()?.collect::<crate::Result<Vec<_>>>()?;
        let first = streamed[0].query.as_ref().unwrap();
        let second = streamed[1].query.as_ref().unwrap();
        assert!(Rc::ptr_eq(first, second));

        let point = fx.parser.get_at(streamed[1].id)?;
        assert!(!Rc::ptr_eq(first, point.query.as_ref().unwrap()));
        assert_eq!(point.query_id(), Some("readA!@0"));
        Ok(())
    }

    #[test]
    fn test_consistency_failure() -> Result<()> {
        let mut text = three_records();
        // a header that lies about its own position
        text.push_str("@1\n>chr3\nreadA!@0\n1 1 1 1 0 0 0\n*\n");
        let fx = fixture(&text)?;
        let lying = three_records().len() as u64;

        let err = fx.parser.get_at(lying).unwrap_err();
        assert!(err.is_consistency(), "{err}");
        assert!(err.to_string().contains(&fx.delta.path().display().to_string()));
        Ok(())
    }

    #[test]
    fn test_point_access_off_header() -> Result<()> {
        let fx = fixture(&three_records())?;
        let err = fx.parser.get_at(4).unwrap_err();
        assert!(err.is_format() || err.is_consistency(), "{err}");
        let err = fx.parser.get_at(10_000).unwrap_err();
        assert!(err.is_format(), "{err}");
        Ok(())
    }

    #[test]
    fn test_positions_and_query_ids() -> Result<()> {
        let text = three_records();
        let fx = fixture(&text)?;
        let positions = fx.parser.positions()?.collect::<crate::Result<Vec<_>>>()?;
        let headers: Vec<u64> = text
            .match_indices('@')
            .filter(|(i, _)| *i == 0 || text.as_bytes()[i - 1] == b'\n')
            .map(|(i, _)| i as u64)
            .collect();
        assert_eq!(positions, headers);

        let ids = fx.parser.query_ids()?.collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(ids[2], (positions[2], "readB!2@26".to_string()));
        assert_eq!(fx.parser.query_id_at(positions[1])?, "readA!@0");
        Ok(())
    }

    #[test]
    fn test_parse_from_middle() -> Result<()> {
        let fx = fixture(&three_records())?;
        let positions = fx.parser.positions()?.collect::<crate::Result<Vec<_>>>()?;
        let tail = fx
            .parser
            .parse_from(positions[1])?
            .collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].id, positions[1]);
        Ok(())
    }

    #[test]
    fn test_independent_cursors() -> Result<()> {
        let fx = fixture(&three_records())?;
        let mut a = fx.parser.parse()?;
        let mut b = fx.parser.parse()?;
        assert_eq!(fx.parser.live_cursors(), 2);

        let a0 = a.next().unwrap()?;
        let a1 = a.next().unwrap()?;
        let b0 = b.next().unwrap()?;
        assert_eq!(a0, b0);
        assert_ne!(a1.id, b0.id);

        drop(a);
        assert_eq!(fx.parser.live_cursors(), 1);
        drop(b);
        assert_eq!(fx.parser.live_cursors(), 0);
        Ok(())
    }

    #[test]
    fn test_open_once() -> Result<()> {
        let mut fx = fixture(&three_records())?;
        fx.parser.open()?;
        assert!(matches!(
            fx.parser.open(),
            Err(crate::Error::ReadError(ReadError::AlreadyOpen(_)))
        ));

        fx.parser.close();
        fx.parser.close();
        assert!(!fx.parser.is_open());
        assert!(matches!(
            fx.parser.get_at(0),
            Err(crate::Error::ReadError(ReadError::Closed(_)))
        ));
        assert!(matches!(
            fx.parser.open(),
            Err(crate::Error::ReadError(ReadError::AlreadyOpen(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_stream_format_errors() -> Result<()> {
        let fx = fixture(">chr1\nreadA!@0\n1 1 1 1 0 0 0\n*\n")?;
        let mut records = fx.parser.parse()?;
        assert!(records.next().unwrap().unwrap_err().is_format());
        assert!(records.next().is_none());

        let fx = fixture("@0\n>chr1\nreadA!@0\n1 1 1 1 0 0 0\n4\n")?;
        let first = fx.parser.parse()?.next().unwrap();
        assert!(first.unwrap_err().is_format());
        Ok(())
    }

    #[test]
    fn test_empty_query_and_bad_tag() -> Result<()> {
        let fx = fixture(&delta_text(&[("chr1", "", ""), ("chr1", "readA", "")]))?;
        let mut records = fx.parser.parse()?;
        let empty = records.next().unwrap()?;
        assert!(empty.query.is_none());
        assert!(records.next().unwrap().unwrap_err().is_format());
        Ok(())
    }

    #[test]
    fn test_unresolved_query() -> Result<()> {
        let fx = fixture(&delta_text(&[("chr1", "readZ!@999", "")]))?;
        assert!(matches!(
            fx.parser.get_at(0),
            Err(crate::Error::ReadError(ReadError::UnresolvedQuery { offset: 999, .. }))
        ));
        Ok(())
    }
}
