//! # seqdelta
//!
//! Offset-indexed random access over delta-alignment files and the FASTA
//! files holding their query reads.
//!
//! Every record in a delta file is keyed by the byte offset of its own header,
//! and refers to its query read by the byte offset of that read in a companion
//! FASTA file. This crate turns those offsets into cheap lookups:
//!
//! * [`SequenceStore`] streams a FASTA file while tagging each identifier with
//!   its record offset, and fetches single sequences by offset, either by
//!   seeking or from an in-memory cache.
//! * [`DeltaParser`] parses delta records, streaming or by offset, and checks
//!   that every record found at an offset reports that offset.
//! * [`DeltaStore`] indexes a delta file once and serves records by ordinal.
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use seqdelta::{DeltaStoreBuilder, SequenceStoreBuilder};
//!
//! let reads = Rc::new(
//!     SequenceStoreBuilder::default()
//!         .normalize_pairs(true)
//!         .build("reads.fasta")
//!         .unwrap(),
//! );
//! reads.cache_for_random_access().unwrap();
//!
//! let store = DeltaStoreBuilder::default()
//!     .build("alignments.delta", Rc::clone(&reads))
//!     .unwrap();
//! for group in store.grouped_by_query().unwrap() {
//!     let group = group.unwrap();
//!     println!("{:?}: {} alignments", group[0].query_id(), group.len());
//! }
//! ```
//!
//! All types keep their readers behind interior mutability and are meant to
//! be used from one thread. Independent streaming cursors over the same file
//! may be interleaved freely.

mod delta;
mod error;
mod fasta;
pub mod paired;
mod sequence;

pub use delta::{
    DeltaParser, DeltaRecord, DeltaRecords, DeltaStore, DeltaStoreBuilder, IndexedRecords,
    Positions, Properties, QueryGroups, QueryIds, HEADER_MARKER, N_PROPERTIES, REFERENCE_MARKER,
    SLOT_SIZE, TERMINATOR,
};
pub use error::{ArgumentError, Error, FormatError, IndexError, ReadError, Result};
pub use fasta::{
    SequenceStore, SequenceStoreBuilder, Sequences, StreamedSequences, BUCKET_SCALE,
    DEFAULT_BUFFER_CAPACITY, RECORD_MARKER, SCAN_CHUNK_SIZE,
};
pub use sequence::{Alphabet, Sequence};
