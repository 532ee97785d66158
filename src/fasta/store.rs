use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use seq_io::fasta::{self, Position, Record};
use tracing::{debug, trace, warn};

use super::{MarkerScanner, OffsetCache, RECORD_MARKER};
use crate::{
    error::{ArgumentError, ReadError, Result},
    paired::{self, INVALID_OFFSET},
    Alphabet, Sequence,
};

/// Default capacity of the buffer used for point access (256 MiB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 256 * 1024 * 1024;

/// Smallest buffer the grammar parser accepts
const MIN_BUFFER_CAPACITY: usize = 3;

/// Checks that a path names an existing regular file
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ArgumentError::EmptyPath.into());
    }
    if !std::fs::metadata(path)?.is_file() {
        return Err(ArgumentError::NotAFile(path.to_path_buf()).into());
    }
    Ok(())
}

/// Settings shared by every access path of a [`SequenceStore`]
#[derive(Debug, Clone, Copy)]
struct StoreConfig {
    normalize_pairs: bool,
    alphabet: Alphabet,
    buffer_capacity: usize,
}
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            normalize_pairs: false,
            alphabet: Alphabet::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}
impl StoreConfig {
    /// Converts a parsed record into an offset-tagged sequence
    fn build(self, record: &fasta::RefRecord, offset: i64) -> Result<Sequence> {
        let mut id = record.id()?.to_string();
        let description = record.desc().transpose()?.map(str::to_string);
        paired::tag_offset(&mut id, offset);

        let mut sequence = Sequence::new(id, record.full_seq().into_owned(), self.alphabet)
            .with_description(description);
        if self.normalize_pairs && paired::is_reverse_mate(&sequence.id) {
            sequence.reverse_complement();
        }
        Ok(sequence)
    }
}

/// Builder for [`SequenceStore`]
///
/// # Examples
///
/// ```rust,no_run
/// use seqdelta::{Alphabet, SequenceStoreBuilder};
///
/// let store = SequenceStoreBuilder::default()
///     .normalize_pairs(true)
///     .alphabet(Alphabet::Dna)
///     .build("reads.fasta")
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct SequenceStoreBuilder {
    /// Reverse complement reverse mates on every access path
    normalize_pairs: Option<bool>,
    /// Alphabet assigned to every returned sequence
    alphabet: Option<Alphabet>,
    /// Capacity of the point-access buffer
    buffer_capacity: Option<usize>,
}
impl SequenceStoreBuilder {
    /// Sets whether reverse mates of paired reads are reverse complemented
    pub fn normalize_pairs(mut self, normalize_pairs: bool) -> Self {
        self.normalize_pairs = Some(normalize_pairs);
        self
    }

    /// Overrides the alphabet assigned to parsed sequences
    pub fn alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = Some(alphabet);
        self
    }

    /// Sets the capacity of the buffer used by [`SequenceStore::get_at`]
    ///
    /// The buffer is allocated once, on the first uncached point access, and
    /// reused for the lifetime of the store. It grows if a single record is
    /// larger than the capacity.
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = Some(buffer_capacity);
        self
    }

    pub fn build<P: AsRef<Path>>(self, path: P) -> Result<SequenceStore> {
        let defaults = StoreConfig::default();
        let config = StoreConfig {
            normalize_pairs: self.normalize_pairs.unwrap_or(defaults.normalize_pairs),
            alphabet: self.alphabet.unwrap_or(defaults.alphabet),
            buffer_capacity: self.buffer_capacity.unwrap_or(defaults.buffer_capacity),
        };
        if config.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(ArgumentError::InvalidBufferCapacity(config.buffer_capacity).into());
        }
        SequenceStore::with_config(path.as_ref(), config)
    }
}

/// Offset-aware store over a FASTA file
///
/// Every sequence handed out carries the byte offset of its record in its
/// identifier (see [`paired::tag_offset`]), so a later [`SequenceStore::get_at`]
/// can fetch it again without rescanning the file.
///
/// The store keeps mutable reader and cache state behind `RefCell`s and is
/// meant to be used from a single thread; it is shared between delta parsers
/// through an `Rc`.
pub struct SequenceStore {
    path: PathBuf,
    config: StoreConfig,
    /// Persistent reader for point access, opened lazily
    point: RefCell<Option<PointReader>>,
    /// Offset cache, present after `cache_for_random_access`
    cache: RefCell<Option<OffsetCache>>,
}
impl SequenceStore {
    /// Opens a store with default settings
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        SequenceStoreBuilder::default().build(path)
    }

    fn with_config(path: &Path, config: StoreConfig) -> Result<Self> {
        validate_path(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
            point: RefCell::new(None),
            cache: RefCell::new(None),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn alphabet(&self) -> Alphabet {
        self.config.alphabet
    }

    #[must_use]
    pub fn is_normalizing(&self) -> bool {
        self.config.normalize_pairs
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.borrow().is_some()
    }

    /// Number of cached sequences, zero when not cached
    #[must_use]
    pub fn len_cached(&self) -> usize {
        self.cache.borrow().as_ref().map_or(0, OffsetCache::len)
    }

    /// Parses the whole file
    ///
    /// Returns the cached sequences in offset order if the store has been
    /// cached, otherwise streams a fresh parse from disk.
    pub fn parse(&self) -> Result<Sequences> {
        if let Some(cache) = self.cache.borrow().as_ref() {
            let cached: Vec<_> = cache.iter().map(|(_, seq)| Rc::clone(seq)).collect();
            return Ok(Sequences::Cached(cached.into_iter()));
        }
        Ok(Sequences::Streamed(StreamedSequences::open(
            &self.path,
            self.config,
        )?))
    }

    /// Streams the whole file once into the offset cache
    ///
    /// Does nothing if the store is already cached. Records whose offset could
    /// not be located are left out of the cache.
    pub fn cache_for_random_access(&self) -> Result<()> {
        if self.is_cached() {
            return Ok(());
        }
        let mut cache = OffsetCache::new();
        for sequence in StreamedSequences::open(&self.path, self.config)? {
            let sequence = sequence?;
            match sequence.offset() {
                Some(offset) => cache.insert(offset, Rc::new(sequence)),
                None => warn!(id = %sequence.id, "skipping sequence without offset"),
            }
        }
        debug!(
            path = ?self.path,
            sequences = cache.len(),
            buckets = cache.n_buckets(),
            scale = ?cache.scale(),
            "cached sequence file"
        );
        *self.cache.borrow_mut() = Some(cache);
        Ok(())
    }

    fn open_point_reader(&self) -> Result<PointReader> {
        debug!(path = ?self.path, capacity = self.config.buffer_capacity, "opening sequence point reader");
        let marker = File::open(&self.path)?;
        let len = marker.metadata()?.len();
        Ok(PointReader {
            reader: fasta::Reader::with_capacity(File::open(&self.path)?, self.config.buffer_capacity),
            marker,
            len,
        })
    }

    /// Returns the sequence whose record starts at `offset`
    ///
    /// When cached, the lookup is served from memory and an unknown offset
    /// yields `None`. Otherwise the persistent reader seeks to `offset` and
    /// parses exactly one record. An offset at or past the end of the file
    /// yields `None`; an offset inside the file that does not hold a `>` fails
    /// with [`ReadError::NotARecordStart`].
    pub fn get_at(&self, offset: u64) -> Result<Option<Rc<Sequence>>> {
        if let Some(cache) = self.cache.borrow().as_ref() {
            return Ok(cache.get(offset).cloned());
        }

        let mut slot = self.point.borrow_mut();
        let point = match slot.take() {
            Some(point) => point,
            None => self.open_point_reader()?,
        };
        let point = slot.insert(point);

        trace!(offset, "sequence point access");
        if offset >= point.len {
            return Ok(None);
        }
        if !point.is_record_start(offset)? {
            return Err(ReadError::NotARecordStart {
                path: self.path.clone(),
                offset,
            }
            .into());
        }
        point.reader.seek(&Position::new(0, offset))?;
        match point.reader.next() {
            Some(record) => {
                let sequence = self.config.build(&record?, offset as i64)?;
                Ok(Some(Rc::new(sequence)))
            }
            None => Ok(None),
        }
    }

    /// Releases the persistent reader and the cache
    ///
    /// Safe to call repeatedly. Later calls reopen readers as needed.
    pub fn close(&self) {
        if self.point.borrow_mut().take().is_some() {
            debug!(path = ?self.path, "released sequence point reader");
        }
        self.cache.borrow_mut().take();
    }
}

impl std::fmt::Debug for SequenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("point_open", &self.point.borrow().is_some())
            .field("cached", &self.len_cached())
            .finish()
    }
}

/// Persistent point-access state of a [`SequenceStore`]
///
/// The grammar reader seeks without looking at the target byte, so a second
/// handle checks for the record marker first.
struct PointReader {
    reader: fasta::Reader<File>,
    marker: File,
    /// File length when the reader was opened
    len: u64,
}
impl PointReader {
    fn is_record_start(&mut self, offset: u64) -> Result<bool> {
        let mut byte = [0u8; 1];
        self.marker.seek(SeekFrom::Start(offset))?;
        self.marker.read_exact(&mut byte)?;
        Ok(byte[0] == RECORD_MARKER)
    }
}

/// Sequences produced by [`SequenceStore::parse`]
pub enum Sequences {
    /// Snapshot of the offset cache
    Cached(std::vec::IntoIter<Rc<Sequence>>),
    /// Fresh parse from disk
    Streamed(StreamedSequences),
}
impl Iterator for Sequences {
    type Item = Result<Rc<Sequence>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Cached(iter) => iter.next().map(Ok),
            Self::Streamed(iter) => iter.next().map(|seq| seq.map(Rc::new)),
        }
    }
}

/// Streaming parse pairing record-start offsets with grammar records
///
/// Two readers walk the same file: a [`MarkerScanner`] locating record starts
/// and the FASTA grammar parser. The n-th offset is attached to the n-th record;
/// if the scanner runs dry first, the remaining records receive
/// [`INVALID_OFFSET`].
pub struct StreamedSequences<R: Read = File> {
    scanner: MarkerScanner<R>,
    reader: fasta::Reader<File>,
    config: StoreConfig,
}
impl StreamedSequences {
    fn open(path: &Path, config: StoreConfig) -> Result<Self> {
        debug!(?path, "streaming sequence file");
        Ok(Self::with_scanner(
            MarkerScanner::new(File::open(path)?),
            File::open(path)?,
            config,
        ))
    }
}
impl<R: Read> StreamedSequences<R> {
    fn with_scanner(scanner: MarkerScanner<R>, file: File, config: StoreConfig) -> Self {
        Self {
            scanner,
            reader: fasta::Reader::new(file),
            config,
        }
    }
}
impl<R: Read> Iterator for StreamedSequences<R> {
    type Item = Result<Sequence>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.reader.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        let offset = match self.scanner.next() {
            Some(Ok(offset)) => offset as i64,
            Some(Err(e)) => return Some(Err(e)),
            None => {
                warn!("record start not found, reporting an invalid offset");
                INVALID_OFFSET
            }
        };
        Some(self.config.build(&record, offset))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const READS: &[u8] = b">readA first\nACGTAC\nGG\n>readB!1\nTTTT\n>readB!2\nAACC\n";

    fn fasta_file(data: &[u8]) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(file)
    }

    fn small_store(path: &Path, normalize: bool) -> crate::Result<SequenceStore> {
        SequenceStoreBuilder::default()
            .normalize_pairs(normalize)
            .buffer_capacity(64)
            .build(path)
    }

    #[test]
    fn test_streamed_ids_carry_offsets() -> Result<()> {
        let file = fasta_file(READS)?;
        let store = small_store(file.path(), false)?;
        let seqs = store.parse()?.collect::<crate::Result<Vec<_>>>()?;
        let ids: Vec<_> = seqs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["readA!@0", "readB!1@23", "readB!2@37"]);
        assert_eq!(seqs[0].residues, b"ACGTACGG");
        assert_eq!(seqs[0].description.as_deref(), Some("first"));
        Ok(())
    }

    #[test]
    fn test_point_access_matches_stream() -> Result<()> {
        let file = fasta_file(READS)?;
        let store = small_store(file.path(), false)?;
        let streamed = store.parse()?.collect::<crate::Result<Vec<_>>>()?;

        // visit out of order to exercise seeking backwards
        for seq in streamed.iter().rev() {
            let offset = seq.offset().unwrap();
            let fetched = store.get_at(offset)?.unwrap();
            assert_eq!(fetched.as_ref(), seq.as_ref());
        }
        Ok(())
    }

    #[test]
    fn test_cache_equivalence() -> Result<()> {
        let file = fasta_file(READS)?;
        let store = small_store(file.path(), true)?;
        let before: Vec<_> = [0, 23, 37]
            .iter()
            .map(|&offset| store.get_at(offset))
            .collect::<crate::Result<_>>()?;

        store.cache_for_random_access()?;
        store.cache_for_random_access()?;
        assert!(store.is_cached());
        assert_eq!(store.len_cached(), 3);

        for (offset, expected) in [0, 23, 37].into_iter().zip(before) {
            assert_eq!(store.get_at(offset)?, expected);
        }
        assert_eq!(store.get_at(5)?, None);
        Ok(())
    }

    #[test]
    fn test_point_access_past_end() -> Result<()> {
        let file = fasta_file(READS)?;
        let store = small_store(file.path(), false)?;
        let len = READS.len() as u64;
        assert_eq!(store.get_at(len)?, None);
        assert_eq!(store.get_at(len + 100)?, None);
        assert_eq!(store.get_at(u64::MAX)?, None);
        assert!(store.get_at(37)?.is_some());
        Ok(())
    }

    #[test]
    fn test_point_access_inside_record() -> Result<()> {
        let file = fasta_file(b">readA\nACGT\n>readB\nGGGG\n")?;
        let store = small_store(file.path(), false)?;
        for offset in [1, 3, 7, 11, 13] {
            match store.get_at(offset) {
                Err(crate::Error::ReadError(ReadError::NotARecordStart { offset: found, .. })) => {
                    assert_eq!(found, offset);
                }
                other => panic!("offset {offset}: {other:?}"),
            }
        }
        assert_eq!(store.get_at(12)?.unwrap().id, "readB!@12");
        assert_eq!(store.get_at(0)?.unwrap().id, "readA!@0");
        Ok(())
    }

    #[test]
    fn test_exhausted_scanner_reports_invalid_offset() -> Result<()> {
        let file = fasta_file(b">readA\nACGT\n>readB!1\nGGGG\n")?;
        let scanner = MarkerScanner::new(&b">readA\n"[..]);
        let streamed = StreamedSequences::with_scanner(
            scanner,
            File::open(file.path())?,
            StoreConfig::default(),
        );
        let seqs = streamed.collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].id, "readA!@0");
        assert_eq!(seqs[0].offset(), Some(0));
        assert_eq!(seqs[1].id, "readB!1@-1");
        assert_eq!(seqs[1].offset(), None);
        Ok(())
    }

    #[test]
    fn test_normalize_pairs() -> Result<()> {
        let file = fasta_file(READS)?;
        let store = small_store(file.path(), true)?;
        let reverse = store.get_at(37)?.unwrap();
        assert_eq!(reverse.residues, b"GGTT");
        let forward = store.get_at(23)?.unwrap();
        assert_eq!(forward.residues, b"TTTT");

        let streamed = store.parse()?.collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(streamed[2].residues, b"GGTT");
        Ok(())
    }

    #[test]
    fn test_cached_parse_is_ordered() -> Result<()> {
        let file = fasta_file(READS)?;
        let store = small_store(file.path(), false)?;
        store.cache_for_random_access()?;
        let offsets: Vec<_> = store
            .parse()?
            .map(|seq| seq.map(|s| s.offset()))
            .collect::<crate::Result<_>>()?;
        assert_eq!(offsets, vec![Some(0), Some(23), Some(37)]);
        Ok(())
    }

    #[test]
    fn test_close_is_idempotent() -> Result<()> {
        let file = fasta_file(READS)?;
        let store = small_store(file.path(), false)?;
        store.cache_for_random_access()?;
        store.close();
        store.close();
        assert!(!store.is_cached());
        assert!(store.get_at(0)?.is_some());
        Ok(())
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            SequenceStore::new(""),
            Err(crate::Error::ArgumentError(ArgumentError::EmptyPath))
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SequenceStore::new(dir.path()),
            Err(crate::Error::ArgumentError(ArgumentError::NotAFile(_)))
        ));
        assert!(matches!(
            SequenceStore::new(dir.path().join("missing.fa")),
            Err(crate::Error::IoError(_))
        ));
        let file = fasta_file(READS).unwrap();
        assert!(matches!(
            SequenceStoreBuilder::default()
                .buffer_capacity(1)
                .build(file.path()),
            Err(crate::Error::ArgumentError(
                ArgumentError::InvalidBufferCapacity(1)
            ))
        ));
    }
}
