use thiserror::Error;

/// A token stream that does not decode.
///
/// Streams produced by the encoder always decode; these errors mean the
/// stream was corrupted or produced elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The stream ends inside a record.
    #[error("stream ends inside a record at offset {offset}")]
    Truncated {
        /// Offset of the missing cell.
        offset: usize,
    },

    /// A cell that cannot appear where it was found.
    #[error("unexpected {found} in {context} at offset {offset}")]
    UnexpectedTag {
        /// What was being decoded.
        context: &'static str,
        /// The cell found.
        found: &'static str,
        /// Its offset.
        offset: usize,
    },

    /// A name ordinal outside its catalog.
    #[error("unknown {catalog} ordinal {ordinal} at offset {offset}")]
    UnknownName {
        /// The catalog the ordinal belongs to.
        catalog: &'static str,
        /// The ordinal.
        ordinal: u8,
        /// Its offset.
        offset: usize,
    },

    /// A reference whose distance points before the start of the stream, or
    /// at a record that encloses the reference itself.
    #[error("reference at offset {offset} does not point at an earlier record")]
    BadReference {
        /// Offset of the reference operand.
        offset: usize,
    },

    /// A pool index with no value behind it.
    #[error("object pool has no value #{index}")]
    MissingValue {
        /// The index.
        index: usize,
    },
}
