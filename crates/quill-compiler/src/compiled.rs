use crate::dump::TokenDump;

/// A finished, immutable token stream together with its object pool.
///
/// Produced by [`Encoder::compilation_end`](crate::Encoder::compilation_end).
/// It owns its storage, so it can outlive the encoder and be shared across
/// threads by any number of decoders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledHtml {
    cells: Box<[u8]>,
    pool: Box<[String]>,
}

impl CompiledHtml {
    /// Wrap a stream produced elsewhere.
    ///
    /// Nothing is validated here; decoders report malformed streams when they
    /// reach the offending cell.
    #[must_use]
    pub fn from_parts(cells: Vec<u8>, pool: Vec<String>) -> Self {
        Self {
            cells: cells.into_boxed_slice(),
            pool: pool.into_boxed_slice(),
        }
    }

    /// The token stream.
    #[must_use]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// The object pool.
    #[must_use]
    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    /// The pooled value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&str> {
        self.pool.get(index).map(String::as_str)
    }

    /// Length of the token stream in cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing was compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// A [`Display`](std::fmt::Display) disassembly of the stream.
    #[must_use]
    pub const fn tokens(&self) -> TokenDump<'_> {
        TokenDump::new(self)
    }
}
