use std::rc::Rc;

use crate::Sequence;

/// Multiplier applied to the first observed sequence length to size a bucket
pub const BUCKET_SCALE: u64 = 1000;

/// Offset-keyed cache of streamed sequences
///
/// Offsets are partitioned into fixed-width buckets of
/// `first_len * BUCKET_SCALE` bytes, where `first_len` is the length of the
/// first sequence ever inserted. For files of uniform-length reads each bucket
/// then holds at most about a thousand records and a lookup is one division plus
/// a binary search within the bucket. Files with very heterogeneous lengths
/// still work but buckets may grow large.
#[derive(Debug, Default)]
pub struct OffsetCache {
    /// Width of a bucket in bytes, fixed by the first insertion
    scale: Option<u64>,
    /// Buckets sorted by offset
    buckets: Vec<Vec<(u64, Rc<Sequence>)>>,
    /// Number of cached sequences
    len: usize,
}
impl OffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_of(&self, offset: u64) -> Option<usize> {
        self.scale.map(|scale| (offset / scale) as usize)
    }

    /// Inserts a sequence at the given offset
    ///
    /// An existing entry at the same offset is replaced.
    pub fn insert(&mut self, offset: u64, sequence: Rc<Sequence>) {
        let scale = *self
            .scale
            .get_or_insert_with(|| (sequence.len() as u64).max(1) * BUCKET_SCALE);
        let idx = (offset / scale) as usize;
        if idx >= self.buckets.len() {
            self.buckets.resize_with(idx + 1, Vec::new);
        }
        let bucket = &mut self.buckets[idx];
        match bucket.binary_search_by_key(&offset, |(pos, _)| *pos) {
            Ok(pos) => bucket[pos].1 = sequence,
            Err(pos) => {
                bucket.insert(pos, (offset, sequence));
                self.len += 1;
            }
        }
    }

    /// Returns the sequence cached at exactly this offset
    #[must_use]
    pub fn get(&self, offset: u64) -> Option<&Rc<Sequence>> {
        let bucket = self.buckets.get(self.bucket_of(offset)?)?;
        bucket
            .binary_search_by_key(&offset, |(pos, _)| *pos)
            .ok()
            .map(|pos| &bucket[pos].1)
    }

    /// Iterates over all cached sequences in ascending offset order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Rc<Sequence>)> {
        self.buckets
            .iter()
            .flatten()
            .map(|(offset, sequence)| (*offset, sequence))
    }

    /// Number of cached sequences
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of allocated buckets, including empty padding buckets
    #[must_use]
    pub fn n_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Width of a bucket in bytes, if anything has been inserted
    #[must_use]
    pub fn scale(&self) -> Option<u64> {
        self.scale
    }
}
