//! Growable storage behind a compilation: the cell buffer and the object pool.

use crate::error::CompileError;
use crate::proto::{self, Tag};

/// Append-only cell storage with random-access backpatching.
#[derive(Debug, Default)]
pub(crate) struct CellBuffer {
    cells: Vec<u8>,
}

impl CellBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Drop all cells, keeping at least `capacity` reserved.
    pub(crate) fn reset(&mut self, capacity: usize) {
        self.cells.clear();
        self.cells.reserve(capacity);
    }

    pub(crate) const fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.cells
    }

    pub(crate) fn get(&self, pos: usize) -> u8 {
        self.cells[pos]
    }

    pub(crate) fn tag_at(&self, pos: usize) -> Option<Tag> {
        self.cells.get(pos).copied().and_then(Tag::from_cell)
    }

    pub(crate) fn push(&mut self, cell: u8) {
        self.cells.push(cell);
    }

    pub(crate) fn push_tag(&mut self, tag: Tag) {
        self.cells.push(tag.cell());
    }

    pub(crate) fn push_varint(&mut self, value: usize) {
        proto::encode_varint(value, &mut self.cells);
    }

    pub(crate) fn push_index(&mut self, index: u16) {
        self.cells.extend_from_slice(&proto::encode_index(index));
    }

    /// Reserve `width` zeroed length cells to be patched later.
    pub(crate) fn push_length_slot(&mut self, width: usize) {
        self.cells.resize(self.cells.len() + width, 0);
    }

    pub(crate) fn set_tag(&mut self, pos: usize, tag: Tag) {
        self.cells[pos] = tag.cell();
    }

    pub(crate) fn patch_length(&mut self, pos: usize, width: usize, len: usize) {
        let encoded = proto::encode_length(len, width);
        self.cells[pos..pos + width].copy_from_slice(&encoded[..width]);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.cells.truncate(len);
    }

    pub(crate) fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.cells)
    }
}

/// Values referenced from the cell stream by a 2-cell index.
#[derive(Debug, Default)]
pub(crate) struct ObjectPool {
    values: Vec<String>,
}

impl ObjectPool {
    /// Number of distinct indices a 2-cell operand can address.
    pub(crate) const LIMIT: usize = u16::MAX as usize + 1;

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn reset(&mut self, capacity: usize) {
        self.values.clear();
        self.values.reserve(capacity);
    }

    pub(crate) const fn len(&self) -> usize {
        self.values.len()
    }

    /// Store `value` and return the index it is addressed by.
    pub(crate) fn push(&mut self, value: String) -> Result<u16, CompileError> {
        let index = u16::try_from(self.values.len()).map_err(|_| CompileError::PoolOverflow {
            limit: Self::LIMIT,
        })?;
        self.values.push(value);
        Ok(index)
    }

    pub(crate) fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.values)
    }
}
