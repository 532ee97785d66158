//! # Delta alignments
//!
//! Reading of the line-oriented delta-alignment format, in which every record
//! is keyed by the byte offset of its own header line and refers to its query
//! read by the offset of that read in a companion FASTA file.
//!
//! * [`DeltaParser`] parses records, either streaming from a position or by
//!   point access at a header offset, resolving queries through a
//!   [`SequenceStore`](crate::SequenceStore).
//! * [`DeltaStore`] indexes the record offsets once and then serves records by
//!   ordinal, grouped by query, or by query id.

mod grammar;
mod index;
mod parser;
mod record;
mod store;

pub use grammar::{Properties, HEADER_MARKER, N_PROPERTIES, REFERENCE_MARKER, TERMINATOR};
pub use index::SLOT_SIZE;
pub use parser::{DeltaParser, DeltaRecords, Positions, QueryIds};
pub use record::DeltaRecord;
pub use store::{DeltaStore, DeltaStoreBuilder, IndexedRecords, QueryGroups};
