//! Offset-aware access to FASTA sequence files
//!
//! The [`SequenceStore`] wraps the `seq_io` FASTA grammar and adds byte offsets:
//! a streamed parse pairs every record with the position of its `>` marker, and
//! a point access seeks straight to a known offset. After
//! [`SequenceStore::cache_for_random_access`] all sequences live in an
//! offset-keyed bucket cache and point access no longer touches the disk.

mod cache;
mod scanner;
mod store;

pub use cache::BUCKET_SCALE;
pub use scanner::{RECORD_MARKER, SCAN_CHUNK_SIZE};
pub use store::{
    SequenceStore, SequenceStoreBuilder, Sequences, StreamedSequences, DEFAULT_BUFFER_CAPACITY,
};

pub(crate) use cache::OffsetCache;
pub(crate) use scanner::MarkerScanner;
pub(crate) use store::validate_path;
