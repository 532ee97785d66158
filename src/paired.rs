//! Paired-read naming helpers
//!
//! Mates of a paired read share a base identifier and carry a mate marker after
//! the [`DELIMITER`]: `<base>!1` for the forward mate and `<base>!2` for the
//! reverse mate. Identifiers handed out by the sequence store additionally carry
//! an offset tag (`@<offset>`), which is appended after the mate marker or, for
//! unpaired identifiers, after a bare delimiter (`<id>!@<offset>`).

/// Marker separating the base identifier of a read from its mate suffix
pub const DELIMITER: &str = "!";

/// Marker separating an identifier from its offset tag
pub const OFFSET_MARKER: char = '@';

/// Offset reported for records whose start could not be located
pub const INVALID_OFFSET: i64 = -1;

/// Orientation of a mate within a read pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Forward,
    Reverse,
}

/// Returns true if the identifier carries the paired-read delimiter
#[must_use]
pub fn has_delimiter(id: &str) -> bool {
    id.contains(DELIMITER)
}

/// Returns the mate orientation if the identifier names one mate of a pair
///
/// Only the first character after the delimiter is inspected, so offset tags
/// (`readA!2@120`) do not interfere.
#[must_use]
pub fn orientation(id: &str) -> Option<Orientation> {
    let (_, mate) = id.split_once(DELIMITER)?;
    match mate.as_bytes().first() {
        Some(b'1') => Some(Orientation::Forward),
        Some(b'2') => Some(Orientation::Reverse),
        _ => None,
    }
}

/// Returns true if the identifier names one mate of a pair
#[must_use]
pub fn is_paired(id: &str) -> bool {
    orientation(id).is_some()
}

/// Returns true if the identifier names the reverse mate of a pair
#[must_use]
pub fn is_reverse_mate(id: &str) -> bool {
    orientation(id) == Some(Orientation::Reverse)
}

/// Strips the delimiter and everything after it
#[must_use]
pub fn strip_delimiter(id: &str) -> &str {
    id.split_once(DELIMITER).map_or(id, |(base, _)| base)
}

/// Appends the offset tag to an identifier
///
/// The tag is `@<offset>` when the identifier already carries the delimiter
/// and `!@<offset>` otherwise.
pub fn tag_offset(id: &mut String, offset: i64) {
    if !has_delimiter(id) {
        id.push_str(DELIMITER);
    }
    id.push(OFFSET_MARKER);
    id.push_str(itoa::Buffer::new().format(offset));
}

/// Decodes the offset tag after the last `@` of an identifier
///
/// Returns `None` if there is no tag or if the tag is not a valid offset
/// (including the [`INVALID_OFFSET`] sentinel).
#[must_use]
pub fn offset_of(id: &str) -> Option<u64> {
    let (_, tag) = id.rsplit_once(OFFSET_MARKER)?;
    tag.trim().parse().ok()
}

/// Strips the offset tag and then any mate suffix from an identifier
///
/// `readA!2@120`, `readA!@0` and `readA@0` all reduce to `readA`.
#[must_use]
pub fn base_id(id: &str) -> &str {
    let untagged = id.rsplit_once(OFFSET_MARKER).map_or(id, |(head, _)| head);
    strip_delimiter(untagged)
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_orientation() {
        assert_eq!(orientation("readA!1"), Some(Orientation::Forward));
        assert_eq!(orientation("readA!2@120"), Some(Orientation::Reverse));
        assert_eq!(orientation("readA!@0"), None);
        assert_eq!(orientation("readA"), None);
        assert!(is_reverse_mate("x!2"));
        assert!(!is_reverse_mate("x!1"));
    }

    #[test]
    fn test_tag_offset() {
        let mut paired = String::from("readA!1");
        tag_offset(&mut paired, 42);
        assert_eq!(paired, "readA!1@42");

        let mut single = String::from("readA");
        tag_offset(&mut single, 0);
        assert_eq!(single, "readA!@0");

        let mut missing = String::from("readB");
        tag_offset(&mut missing, INVALID_OFFSET);
        assert_eq!(missing, "readB!@-1");
        assert_eq!(offset_of(&missing), None);
    }

    #[test]
    fn test_base_id() {
        assert_eq!(base_id("readA!2@120"), "readA");
        assert_eq!(base_id("readA!@0"), "readA");
        assert_eq!(base_id("readA@0"), "readA");
        assert_eq!(base_id("readA"), "readA");
        assert_eq!(offset_of("readA!@1234"), Some(1234));
    }
}
