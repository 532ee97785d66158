use std::rc::Rc;

use super::grammar::{Properties, RawRecord};
use crate::Sequence;

/// A pairwise alignment record from a delta file
///
/// Records are keyed by `id`, the byte offset of their header line in the delta
/// file. Point access guarantees that `id` equals the offset the record was
/// requested at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRecord {
    /// Byte offset of the record header
    pub id: u64,
    /// Reference sequence placeholder (identifier and alphabet, no residues)
    pub reference: Sequence,
    /// Resolved query sequence, `None` when the query line is empty
    pub query: Option<Rc<Sequence>>,
    /// Start of the aligned range on the first sequence
    pub start1: i64,
    /// End of the aligned range on the first sequence
    pub end1: i64,
    /// Start of the aligned range on the second sequence
    pub start2: i64,
    /// End of the aligned range on the second sequence
    pub end2: i64,
    /// Number of errors in the alignment
    pub errors: i64,
    /// Number of similarity errors
    pub sim_errors: i64,
    /// Number of non-alphabetic characters
    pub non_alphas: i64,
    /// Integer-encoded edit operations in file order
    pub deltas: Vec<i64>,
}
impl DeltaRecord {
    pub(crate) fn from_raw(raw: RawRecord, reference: Sequence, query: Option<Rc<Sequence>>) -> Self {
        let Properties {
            start1,
            end1,
            start2,
            end2,
            errors,
            sim_errors,
            non_alphas,
        } = raw.properties;
        Self {
            id: raw.id,
            reference,
            query,
            start1,
            end1,
            start2,
            end2,
            errors,
            sim_errors,
            non_alphas,
            deltas: raw.deltas,
        }
    }

    /// Identifier of the resolved query sequence
    #[must_use]
    pub fn query_id(&self) -> Option<&str> {
        self.query.as_deref().map(|seq| seq.id.as_str())
    }

    /// The seven properties in file order
    #[must_use]
    pub fn properties(&self) -> Properties {
        Properties {
            start1: self.start1,
            end1: self.end1,
            start2: self.start2,
            end2: self.end2,
            errors: self.errors,
            sim_errors: self.sim_errors,
            non_alphas: self.non_alphas,
        }
    }

    /// Number of bases covered on the first sequence
    #[must_use]
    pub fn len1(&self) -> u64 {
        self.start1.abs_diff(self.end1).saturating_add(1)
    }

    /// Number of bases covered on the second sequence
    #[must_use]
    pub fn len2(&self) -> u64 {
        self.start2.abs_diff(self.end2).saturating_add(1)
    }
}
