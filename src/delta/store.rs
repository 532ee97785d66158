//! Ordinal access to delta records through a secondary position index
//!
//! ```rust,no_run
//! use seqdelta::DeltaStore;
//!
//! let store = DeltaStore::open("alignments.delta", "reads.fasta").unwrap();
//! for idx in 0..store.count() {
//!     let record = store.at(idx).unwrap();
//!     println!("{} {:?}", record.id, record.query_id());
//! }
//! ```

use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use super::index::PositionIndex;
use super::{DeltaParser, DeltaRecord, DeltaRecords};
use crate::{
    error::{ReadError, Result},
    paired, SequenceStore,
};

/// Builder for [`DeltaStore`]
#[derive(Debug, Default)]
pub struct DeltaStoreBuilder {
    /// Whether closing the store also closes its sequence store
    owns_sequences: Option<bool>,
}
impl DeltaStoreBuilder {
    /// Sets whether [`DeltaStore::close`] cascades to the sequence store
    ///
    /// Defaults to `false`: a store built around a shared [`SequenceStore`]
    /// leaves it open for its other users.
    pub fn owns_sequences(mut self, owns_sequences: bool) -> Self {
        self.owns_sequences = Some(owns_sequences);
        self
    }

    /// Opens the delta file and builds its position index
    ///
    /// This streams the whole file once.
    pub fn build<P: AsRef<Path>>(self, path: P, sequences: Rc<SequenceStore>) -> Result<DeltaStore> {
        let parser = DeltaParser::new(path, sequences)?;
        parser.open()?;
        let index = PositionIndex::build(parser.positions()?)?;
        debug!(path = ?parser.path(), records = index.count(), "opened delta store");
        Ok(DeltaStore {
            count: index.count(),
            index: Some(index),
            parser,
            owns_sequences: self.owns_sequences.unwrap_or(false),
        })
    }
}

/// Indexed store over a delta file
///
/// Record `i` is materialized on demand by reading its offset from the
/// position index and handing it to [`DeltaParser::get_at`].
#[derive(Debug)]
pub struct DeltaStore {
    parser: DeltaParser,
    count: usize,
    /// Released on close
    index: Option<PositionIndex>,
    owns_sequences: bool,
}
impl DeltaStore {
    /// Opens a store over `delta` that owns a default store over `fasta`
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(delta: P, fasta: Q) -> Result<Self> {
        let sequences = Rc::new(SequenceStore::new(fasta)?);
        DeltaStoreBuilder::default()
            .owns_sequences(true)
            .build(delta, sequences)
    }

    /// Number of records in the file
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn parser(&self) -> &DeltaParser {
        &self.parser
    }

    #[must_use]
    pub fn sequences(&self) -> &Rc<SequenceStore> {
        self.parser.sequences()
    }

    #[must_use]
    pub fn owns_sequences(&self) -> bool {
        self.owns_sequences
    }

    /// Byte offset of record `idx`
    pub fn offset_at(&self, idx: usize) -> Result<u64> {
        let Some(index) = &self.index else {
            return Err(ReadError::Closed(self.parser.path().to_path_buf()).into());
        };
        if idx >= self.count {
            return Err(ReadError::OutOfRange(idx, self.count).into());
        }
        index.offset(idx)
    }

    /// Returns record `idx` in file order
    pub fn at(&self, idx: usize) -> Result<DeltaRecord> {
        let offset = self.offset_at(idx)?;
        self.parser.get_at(offset)
    }

    /// Iterates all records in file order through the index
    #[must_use]
    pub fn iter(&self) -> IndexedRecords<'_> {
        IndexedRecords {
            store: self,
            next: 0,
        }
    }

    /// Streams records in runs sharing the same resolved query
    ///
    /// The file is expected to be grouped by query already. Records are not
    /// sorted and the grouping is not checked, so a query that appears in two
    /// separate runs yields two groups.
    pub fn grouped_by_query(&self) -> Result<QueryGroups<'_>> {
        Ok(QueryGroups {
            records: self.parser.parse()?,
            pending: None,
            finished: false,
        })
    }

    /// Collects the first run of records whose query has the base id `id`
    ///
    /// Query lines are compared after removing their offset tag and mate
    /// suffix. The run starts at the first match and continues while the
    /// resolved query stays the same, so the two mates of a pair form separate
    /// runs. Returns an empty vector if no record matches. Linear in the
    /// number of records before the run.
    pub fn for_query(&self, id: &str) -> Result<Vec<DeltaRecord>> {
        let mut start = None;
        for item in self.parser.query_ids()? {
            let (offset, query) = item?;
            if paired::base_id(&query) == id {
                start = Some(offset);
                break;
            }
        }
        let Some(start) = start else {
            debug!(id, "no delta records for query");
            return Ok(Vec::new());
        };

        let mut run: Vec<DeltaRecord> = Vec::new();
        for record in self.parser.parse_from(start)? {
            let record = record?;
            if let Some(first) = run.first() {
                if first.query_id() != record.query_id() {
                    break;
                }
            }
            run.push(record);
        }
        debug!(id, start, records = run.len(), "collected delta records for query");
        Ok(run)
    }

    /// Releases the parser and removes the position index
    ///
    /// The sequence store is closed too when this store owns it. Safe to call
    /// repeatedly; every later access fails with [`ReadError::Closed`].
    pub fn close(&mut self) {
        self.parser.close();
        if self.index.take().is_some() {
            debug!(path = ?self.parser.path(), "removed position index");
        }
        if self.owns_sequences {
            self.parser.sequences().close();
        }
    }
}

impl<'a> IntoIterator for &'a DeltaStore {
    type Item = Result<DeltaRecord>;
    type IntoIter = IndexedRecords<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Records of a [`DeltaStore`] in ordinal order
pub struct IndexedRecords<'a> {
    store: &'a DeltaStore,
    next: usize,
}
impl Iterator for IndexedRecords<'_> {
    type Item = Result<DeltaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.store.count() {
            return None;
        }
        let record = self.store.at(self.next);
        self.next += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.store.count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

/// Runs of consecutive records sharing a resolved query
pub struct QueryGroups<'a> {
    records: DeltaRecords<'a>,
    /// First record of the next group
    pending: Option<DeltaRecord>,
    finished: bool,
}
impl Iterator for QueryGroups<'_> {
    type Item = Result<Vec<DeltaRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut group: Vec<DeltaRecord> = self.pending.take().into_iter().collect();
        loop {
            match self.records.next() {
                Some(Ok(record)) => {
                    if group
                        .first()
                        .is_some_and(|first| first.query_id() != record.query_id())
                    {
                        self.pending = Some(record);
                        break;
                    }
                    group.push(record);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }
        if group.is_empty() {
            None
        } else {
            Some(Ok(group))
        }
    }
}
