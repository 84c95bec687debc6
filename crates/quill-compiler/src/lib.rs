//! Template compiler for Quill.
//!
//! Turns an ordered sequence of tree-building calls (open element, add
//! attribute, add text, close element, ...) into a compact, flat,
//! integer-tagged token stream. The stream is decoded by `quill-dom`, either
//! in one push pass for rendering or lazily through a read-only pseudo-DOM.
//!
//! # Scope
//!
//! This crate implements:
//! - **Token protocol** ([`proto`]): tags, varint offsets, 2/3-cell lengths
//! - **Encoder** ([`Encoder`]): the compilation session, claim resolution by
//!   backward walk, header backpatching and widening
//! - **Compiled stream** ([`CompiledHtml`]): immutable cells plus object pool
//! - **Disassembler** ([`TokenDump`])
//!
//! # Not Yet Implemented
//!
//! - Deduplication of pooled values
//! - Custom (non-catalog) element and attribute names

mod buffer;
mod compiled;
mod config;
mod dump;
mod encoder;
mod error;
/// Token stream protocol shared with the decoders.
pub mod proto;
mod stack;

pub use compiled::CompiledHtml;
pub use config::EncoderConfig;
pub use dump::TokenDump;
pub use encoder::{Encoder, ValueKind};
pub use error::CompileError;
