use thiserror::Error;

use crate::ValueKind;

/// A compilation failure.
///
/// Every variant except [`CompileError::NotCompiling`] and
/// [`CompileError::AlreadyCompiling`] aborts the compilation it happened in:
/// no partial stream is ever produced, and every later call on the encoder
/// returns [`CompileError::Aborted`] until the next
/// [`Encoder::compilation_begin`](crate::Encoder::compilation_begin).
///
/// Offsets are cell positions in the stream being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A builder call was made outside of a compilation.
    #[error("no compilation in progress")]
    NotCompiling,

    /// `compilation_begin` was called while a compilation was open.
    #[error("a compilation is already in progress on this encoder")]
    AlreadyCompiling,

    /// An earlier call of this compilation failed.
    #[error("compilation aborted by an earlier error")]
    Aborted,

    /// `compilation_end` found work that was never closed or claimed.
    #[error("unbalanced compilation: {entry} at offset {offset} was never closed or claimed")]
    UnbalancedStack {
        /// What was left over.
        entry: &'static str,
        /// Where it starts.
        offset: usize,
    },

    /// The bookkeeping stack disagrees with the cell stream.
    #[error("expected {expected} at offset {offset}, found {found}")]
    AuxMismatch {
        /// The entry the stream called for.
        expected: &'static str,
        /// The entry actually on top of the stack.
        found: &'static str,
        /// Offset of the record being claimed.
        offset: usize,
    },

    /// A value was claimed but no record precedes the open element.
    #[error("no record left to claim as {kind} value before offset {offset}")]
    NothingToClaim {
        /// The claimed kind.
        kind: ValueKind,
        /// Where the backward walk stopped.
        offset: usize,
    },

    /// The preceding record is not a value of the claimed kind.
    #[error("{kind} value cannot claim {found} at offset {offset}")]
    ValueMismatch {
        /// The claimed kind.
        kind: ValueKind,
        /// The record found instead.
        found: &'static str,
        /// Offset of that record.
        offset: usize,
    },

    /// The preceding record can never be claimed (for example a doctype).
    #[error("{found} at offset {offset} cannot be claimed")]
    UnclaimableRecord {
        /// The cell found.
        found: &'static str,
        /// Its offset.
        offset: usize,
    },

    /// A flatten group left at the top level holds attributes, which only an
    /// element can carry.
    #[error("flatten group at offset {offset} carries attributes but is never claimed by an element")]
    StrayAttributes {
        /// Header of the flatten group.
        offset: usize,
    },

    /// A content call was made while an element or flatten group was open.
    #[error("{construct} is not allowed while the {open} at offset {offset} is open")]
    OpenRecord {
        /// The rejected call.
        construct: &'static str,
        /// The open record.
        open: &'static str,
        /// Where the open record starts.
        offset: usize,
    },

    /// A call that needs an open element or flatten group found none.
    #[error("{construct} requires an open element or flatten group")]
    NoOpenRecord {
        /// The rejected call.
        construct: &'static str,
    },

    /// `fragment_end` was given an index that is not the innermost open
    /// fragment.
    #[error("fragment_end({found}) does not close the innermost open fragment ({expected:?})")]
    FragmentMismatch {
        /// Start of the innermost open fragment, if any.
        expected: Option<usize>,
        /// The index passed in.
        found: usize,
    },

    /// More values than a 2-cell pool index can address.
    #[error("object pool is full ({limit} values)")]
    PoolOverflow {
        /// Maximum number of values per compilation.
        limit: usize,
    },

    /// A record's body does not fit the widest header.
    #[error("record at offset {offset} is {len} cells long, above the {max} cell limit")]
    RecordTooLarge {
        /// Record start.
        offset: usize,
        /// Body length.
        len: usize,
        /// Largest representable length.
        max: usize,
    },
}
