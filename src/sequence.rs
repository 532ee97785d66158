//! Sequence records returned by the sequence store

/// Residue alphabet of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alphabet {
    #[default]
    Dna,
    Rna,
    Protein,
}
impl Alphabet {
    /// Returns true if residues of this alphabet can be reverse complemented
    #[must_use]
    pub fn is_nucleotide(&self) -> bool {
        matches!(self, Self::Dna | Self::Rna)
    }

    fn complement(self, base: u8) -> u8 {
        match base {
            b'A' => match self {
                Self::Rna => b'U',
                _ => b'T',
            },
            b'a' => match self {
                Self::Rna => b'u',
                _ => b't',
            },
            b'T' | b'U' => b'A',
            b't' | b'u' => b'a',
            b'C' => b'G',
            b'c' => b'g',
            b'G' => b'C',
            b'g' => b'c',
            b'R' => b'Y',
            b'r' => b'y',
            b'Y' => b'R',
            b'y' => b'r',
            b'K' => b'M',
            b'k' => b'm',
            b'M' => b'K',
            b'm' => b'k',
            b'B' => b'V',
            b'b' => b'v',
            b'V' => b'B',
            b'v' => b'b',
            b'D' => b'H',
            b'd' => b'h',
            b'H' => b'D',
            b'h' => b'd',
            _ => base,
        }
    }
}

/// A named sequence
///
/// Sequences produced by the store carry an offset-tagged identifier
/// (see [`crate::paired::tag_offset`]). Reference placeholders built by the
/// delta parser carry an identifier and alphabet but no residues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// Identifier (first word of the header line)
    pub id: String,
    /// Remainder of the header line after the identifier
    pub description: Option<String>,
    /// Residues with line breaks removed
    pub residues: Vec<u8>,
    /// Residue alphabet
    pub alphabet: Alphabet,
}
impl Sequence {
    pub fn new(id: String, residues: Vec<u8>, alphabet: Alphabet) -> Self {
        Self {
            id,
            description: None,
            residues,
            alphabet,
        }
    }

    /// Creates a sequence with an identifier and no residues
    pub fn placeholder(id: String, alphabet: Alphabet) -> Self {
        Self::new(id, Vec::new(), alphabet)
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Number of residues
    #[must_use]
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Offset of the record in its sequence file, decoded from the identifier tag
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        crate::paired::offset_of(&self.id)
    }

    /// Reverse complements the residues in place
    ///
    /// Protein sequences are left untouched.
    pub fn reverse_complement(&mut self) {
        if !self.alphabet.is_nucleotide() {
            return;
        }
        let alphabet = self.alphabet;
        self.residues.reverse();
        self.residues
            .iter_mut()
            .for_each(|base| *base = alphabet.complement(*base));
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        let mut seq = Sequence::new("x".into(), b"ACGTNacgt".to_vec(), Alphabet::Dna);
        seq.reverse_complement();
        assert_eq!(seq.residues, b"acgtNACGT");

        let mut rna = Sequence::new("r".into(), b"AACU".to_vec(), Alphabet::Rna);
        rna.reverse_complement();
        assert_eq!(rna.residues, b"AGUU");

        let mut protein = Sequence::new("p".into(), b"MKV".to_vec(), Alphabet::Protein);
        protein.reverse_complement();
        assert_eq!(protein.residues, b"MKV");
    }

    #[test]
    fn test_placeholder() {
        let seq = Sequence::placeholder("chr1".into(), Alphabet::Dna);
        assert!(seq.is_empty());
        assert_eq!(seq.offset(), None);
    }
}
