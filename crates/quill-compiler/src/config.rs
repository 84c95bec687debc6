use serde::{Deserialize, Serialize};

/// Initial capacities of an [`Encoder`](crate::Encoder)'s buffers.
///
/// Buffers grow on demand, so these only decide how much is reserved up
/// front at every `compilation_begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Cells reserved for the token stream.
    pub cell_capacity: usize,
    /// Entries reserved for the bookkeeping stack.
    pub stack_capacity: usize,
    /// Values reserved in the object pool.
    pub pool_capacity: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            cell_capacity: 256,
            stack_capacity: 128,
            pool_capacity: 16,
        }
    }
}

impl EncoderConfig {
    /// Set the token stream capacity.
    #[must_use]
    pub const fn with_cell_capacity(mut self, capacity: usize) -> Self {
        self.cell_capacity = capacity;
        self
    }

    /// Set the bookkeeping stack capacity.
    #[must_use]
    pub const fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    /// Set the object pool capacity.
    #[must_use]
    pub const fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }
}
