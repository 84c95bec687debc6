//! The encoder's bookkeeping stack.
//!
//! The stack mirrors what the cell stream cannot say on its own yet: which
//! records are still open, which placeholders nobody has claimed, and which
//! values the open element has asked for. Its shape is the encoder's state;
//! a compilation may only end when it is empty.

use quill_names::ElementName;

use crate::ValueKind;

/// A structural record that has begun but not ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenKind {
    Element(ElementName),
    Flatten,
    Fragment,
}

/// A finished record waiting for a parent to claim it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkKind {
    Attribute0,
    Attribute1,
    Ambiguous,
    Text,
    Raw,
    /// A closed fragment. Its `members` unclaimed entries sit right below it.
    Fragment { members: usize },
}

impl MarkKind {
    pub(crate) const fn describe(self) -> &'static str {
        match self {
            Self::Attribute0 => "flag attribute",
            Self::Attribute1 => "attribute",
            Self::Ambiguous => "ambiguous value",
            Self::Text => "text",
            Self::Raw => "raw text",
            Self::Fragment { .. } => "fragment",
        }
    }
}

/// A value the open element asked for with `element_value`, or an inline
/// attribute that needs no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    Value(ValueKind),
    Id(u16),
    Class(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entry {
    Open { kind: OpenKind, start: usize },
    Mark { kind: MarkKind, start: usize },
    Claim(Claim),
}

impl Entry {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::Open {
                kind: OpenKind::Element(_),
                ..
            } => "open element",
            Self::Open {
                kind: OpenKind::Flatten,
                ..
            } => "open flatten group",
            Self::Open {
                kind: OpenKind::Fragment,
                ..
            } => "open fragment",
            Self::Mark { kind, .. } => kind.describe(),
            Self::Claim(_) => "pending element value",
        }
    }

    pub(crate) fn offset(&self) -> Option<usize> {
        match self {
            Self::Open { start, .. } | Self::Mark { start, .. } => Some(*start),
            Self::Claim(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct AuxStack {
    entries: Vec<Entry>,
}

impl AuxStack {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn reset(&mut self, capacity: usize) {
        self.entries.clear();
        self.entries.reserve(capacity);
    }

    pub(crate) const fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<Entry> {
        self.entries.pop()
    }

    pub(crate) fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub(crate) fn remove(&mut self, index: usize) -> Entry {
        self.entries.remove(index)
    }

    /// Index and contents of the innermost open record.
    pub(crate) fn innermost_open(&self) -> Option<(usize, OpenKind, usize)> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, entry)| match *entry {
                Entry::Open { kind, start } => Some((index, kind, start)),
                _ => None,
            })
    }

    /// Pop the pending claims of the innermost open record, last claim first.
    pub(crate) fn pop_claims(&mut self) -> Vec<Claim> {
        let mut claims = Vec::new();
        while let Some(Entry::Claim(claim)) = self.entries.last() {
            claims.push(*claim);
            let _ = self.entries.pop();
        }
        claims
    }
}
