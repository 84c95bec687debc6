//! The token stream protocol: tags, operand codecs and record shapes.
//!
//! A compiled template is a flat array of byte-sized *cells*. Every record
//! starts with a [`Tag`] cell; the cells that follow are operands whose
//! number and encoding are fixed by the tag:
//!
//! | operand | width | encoding |
//! |---------|-------|----------|
//! | name ordinal | 1 | the catalog enumerant's `u8` |
//! | pool index | 2 | little endian `u16` |
//! | header length | 2 or 3 | little endian |
//! | offset | 1.. | big-endian base-128 varint |
//!
//! Offsets set the `0x80` continuation bit on every cell except the last.
//! Tags never have it set, so an offset that sits right after a tag can be
//! decoded backwards from its last cell as well as forwards from its first.

use strum_macros::{Display, EnumIter, FromRepr, IntoStaticStr};

/// Largest length a 2-cell header can hold.
pub const MAX_LENGTH2: usize = 0xFFFF;

/// Largest length a 3-cell header can hold.
pub const MAX_LENGTH3: usize = 0xFF_FFFF;

/// Cells a `FRAGMENT` header occupies before its body.
pub const FRAGMENT_HEADER: usize = 4;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7F;

/// A token tag.
///
/// Tags are the only cells a reader ever dispatches on. They are all below
/// `0x80` and never `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Tag {
    /// `<!DOCTYPE html>`, a tag-only record.
    Doctype = 1,
    /// Unclaimed element header with a 2-cell length. Inside an element or
    /// flatten body the same tag introduces a child element reference.
    Element,
    /// Unclaimed element header with a 3-cell length.
    #[strum(to_string = "ELEMENT3")]
    Element3,
    /// Unclaimed flatten group header with a 2-cell length.
    Flatten,
    /// Unclaimed flatten group header with a 3-cell length.
    #[strum(to_string = "FLATTEN3")]
    Flatten3,
    /// Unclaimed fragment header, always with a 3-cell length.
    Fragment,
    /// Claimed record with a 2-cell length. Readers skip it.
    #[strum(to_string = "LENGTH2")]
    Length2,
    /// Claimed record with a 3-cell length. Readers skip it.
    #[strum(to_string = "LENGTH3")]
    Length3,
    /// Element name; one ordinal cell follows.
    StandardName,
    /// Record end; the varint that follows is the distance back to the first
    /// cell of the record's span.
    End,
    /// Last cell of every structural record.
    Internal,
    /// Flag attribute placeholder: `MARKED3 ordinal INTERNAL3`.
    #[strum(to_string = "MARKED3")]
    Marked3,
    /// Trailer of a 3-cell placeholder.
    #[strum(to_string = "INTERNAL3")]
    Internal3,
    /// Text placeholder: `MARKED4 index index INTERNAL4`.
    #[strum(to_string = "MARKED4")]
    Marked4,
    /// Trailer of a 4-cell placeholder.
    #[strum(to_string = "INTERNAL4")]
    Internal4,
    /// Valued placeholder: `MARKED5 ordinal index index INTERNAL5`.
    #[strum(to_string = "MARKED5")]
    Marked5,
    /// Trailer of a 5-cell placeholder.
    #[strum(to_string = "INTERNAL5")]
    Internal5,
    /// Reference to a flag attribute placeholder.
    #[strum(to_string = "ATTRIBUTE0")]
    Attribute0,
    /// Reference to a valued attribute placeholder.
    #[strum(to_string = "ATTRIBUTE1")]
    Attribute1,
    /// Inline `id` attribute; a pool index follows.
    AttributeId,
    /// Inline `class` attribute; a pool index follows.
    AttributeClass,
    /// Reference to an ambiguous placeholder taken as an attribute.
    #[strum(to_string = "AMBIGUOUS1")]
    Ambiguous1,
    /// Reference to an ambiguous placeholder taken as an element.
    AmbiguousElement,
    /// Reference to a text placeholder.
    Text,
    /// Reference to a raw text placeholder.
    Raw,
}

impl Tag {
    /// Decode a cell as a tag.
    #[must_use]
    pub const fn from_cell(cell: u8) -> Option<Self> {
        Self::from_repr(cell)
    }

    /// The cell this tag is written as.
    #[must_use]
    pub const fn cell(self) -> u8 {
        self as u8
    }

    /// Number of length cells following a structural header tag.
    #[must_use]
    pub const fn header_width(self) -> Option<usize> {
        match self {
            Self::Element | Self::Flatten | Self::Length2 => Some(2),
            Self::Element3 | Self::Flatten3 | Self::Fragment | Self::Length3 => Some(3),
            _ => None,
        }
    }

    /// Total size of a placeholder record, given its opening or closing tag.
    #[must_use]
    pub const fn placeholder_size(self) -> Option<usize> {
        match self {
            Self::Marked3 | Self::Internal3 => Some(3),
            Self::Marked4 | Self::Internal4 => Some(4),
            Self::Marked5 | Self::Internal5 => Some(5),
            _ => None,
        }
    }

    /// The skip-only tag a header is rewritten to once a parent claims it.
    #[must_use]
    pub const fn claimed(self) -> Option<Self> {
        match self {
            Self::Element | Self::Flatten => Some(Self::Length2),
            Self::Element3 | Self::Flatten3 | Self::Fragment => Some(Self::Length3),
            _ => None,
        }
    }

    /// Whether the tag introduces a varint-addressed reference inside an
    /// element or flatten body.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(
            self,
            Self::Attribute0
                | Self::Attribute1
                | Self::Ambiguous1
                | Self::Element
                | Self::AmbiguousElement
                | Self::Text
                | Self::Raw
        )
    }

    /// Whether the tag is an attribute entry inside an element body.
    #[must_use]
    pub const fn is_attribute(self) -> bool {
        matches!(
            self,
            Self::Attribute0 | Self::Attribute1 | Self::Ambiguous1 | Self::AttributeId | Self::AttributeClass
        )
    }
}

/// Name of the tag stored in `cell`, for diagnostics.
#[must_use]
pub fn cell_name(cell: u8) -> &'static str {
    Tag::from_cell(cell).map_or("unknown cell", <&'static str>::from)
}

/// Number of cells `value` occupies as a varint.
#[must_use]
pub const fn varint_len(mut value: usize) -> usize {
    let mut len = 1;
    while value > PAYLOAD as usize {
        value >>= 7;
        len += 1;
    }
    len
}

/// Append `value` as a big-endian varint.
pub fn encode_varint(value: usize, out: &mut Vec<u8>) {
    let len = varint_len(value);
    for group in (0..len).rev() {
        let payload = ((value >> (group * 7)) & PAYLOAD as usize) as u8;
        if group == 0 {
            out.push(payload);
        } else {
            out.push(payload | CONTINUATION);
        }
    }
}

/// Decode the varint starting at `pos`.
///
/// Returns the value and the position right after its last cell, or `None`
/// when the stream ends inside the varint.
#[must_use]
pub fn decode_varint(cells: &[u8], pos: usize) -> Option<(usize, usize)> {
    let mut value = 0usize;
    let mut cursor = pos;
    loop {
        let cell = *cells.get(cursor)?;
        if value > usize::MAX >> 7 {
            return None;
        }
        value = (value << 7) | usize::from(cell & PAYLOAD);
        cursor += 1;
        if cell & CONTINUATION == 0 {
            return Some((value, cursor));
        }
    }
}

/// Decode the varint whose last cell is at `end - 1`.
///
/// Returns the value and the position of the varint's first cell.
#[must_use]
pub fn decode_varint_back(cells: &[u8], end: usize) -> Option<(usize, usize)> {
    let last = *cells.get(end.checked_sub(1)?)?;
    if last & CONTINUATION != 0 {
        return None;
    }
    let mut start = end - 1;
    while start > 0 && cells[start - 1] & CONTINUATION != 0 {
        start -= 1;
    }
    let (value, next) = decode_varint(cells, start)?;
    debug_assert_eq!(next, end);
    Some((value, start))
}

/// Encode a header length as `width` little endian cells.
#[must_use]
pub fn encode_length(len: usize, width: usize) -> [u8; 3] {
    let mut cells = [0; 3];
    for (index, cell) in cells.iter_mut().enumerate().take(width) {
        *cell = (len >> (index * 8)) as u8;
    }
    cells
}

/// Decode a `width`-cell little endian header length at `pos`.
#[must_use]
pub fn decode_length(cells: &[u8], pos: usize, width: usize) -> Option<usize> {
    let bytes = cells.get(pos..pos + width)?;
    Some(
        bytes
            .iter()
            .rev()
            .fold(0usize, |len, &cell| (len << 8) | usize::from(cell)),
    )
}

/// Encode a pool index as two little endian cells.
#[must_use]
pub const fn encode_index(index: u16) -> [u8; 2] {
    index.to_le_bytes()
}

/// Decode the two-cell pool index at `pos`.
#[must_use]
pub fn decode_index(cells: &[u8], pos: usize) -> Option<usize> {
    let bytes = cells.get(pos..pos + 2)?;
    Some(usize::from(u16::from_le_bytes([bytes[0], bytes[1]])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_tags_never_look_like_continuations() {
        for tag in Tag::iter() {
            assert_ne!(tag.cell(), 0);
            assert!(tag.cell() < CONTINUATION, "{tag} collides with varint continuation");
            assert_eq!(Tag::from_cell(tag.cell()), Some(tag));
        }
    }

    #[test]
    fn test_varint_widths() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(16_383), 2);
        assert_eq!(varint_len(16_384), 3);
    }

    #[test]
    fn test_varint_is_big_endian() {
        let mut out = Vec::new();
        encode_varint(200, &mut out);
        assert_eq!(out, vec![0x81, 0x48]);
    }

    #[test]
    fn test_varint_reads_both_ways() {
        for value in [0, 5, 127, 128, 300, 70_000, 2_000_000] {
            let mut cells = vec![Tag::End.cell()];
            encode_varint(value, &mut cells);
            let end = cells.len();
            cells.push(Tag::Internal.cell());

            assert_eq!(decode_varint(&cells, 1), Some((value, end)));
            assert_eq!(decode_varint_back(&cells, end), Some((value, 1)));
        }
    }

    #[test]
    fn test_truncated_varint() {
        assert_eq!(decode_varint(&[0x81], 0), None);
        assert_eq!(decode_varint_back(&[0x81], 1), None);
    }

    #[test]
    fn test_length_little_endian() {
        assert_eq!(encode_length(7, 2), [7, 0, 0]);
        assert_eq!(encode_length(0x01_2345, 3), [0x45, 0x23, 0x01]);
        assert_eq!(decode_length(&[0x45, 0x23, 0x01], 0, 3), Some(0x01_2345));
        assert_eq!(decode_length(&[0x45, 0x23], 0, 2), Some(0x2345));
        assert_eq!(decode_length(&[0x45], 0, 2), None);
    }

    #[test]
    fn test_claimed_headers() {
        assert_eq!(Tag::Element.claimed(), Some(Tag::Length2));
        assert_eq!(Tag::Flatten.claimed(), Some(Tag::Length2));
        assert_eq!(Tag::Element3.claimed(), Some(Tag::Length3));
        assert_eq!(Tag::Fragment.claimed(), Some(Tag::Length3));
        assert_eq!(Tag::Length2.claimed(), None);
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(Tag::StandardName.to_string(), "STANDARD_NAME");
        assert_eq!(Tag::Marked5.to_string(), "MARKED5");
        assert_eq!(Tag::Length2.to_string(), "LENGTH2");
        assert_eq!(cell_name(0), "unknown cell");
    }
}
