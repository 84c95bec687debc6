//! Decoders for Quill token streams.
//!
//! A [`CompiledHtml`](quill_compiler::CompiledHtml) is read in one of two
//! ways:
//!
//! - **Push** ([`HtmlPlayer`]): one depth-first pass that drives a
//!   [`Visitor`]. [`HtmlWriter`] is the visitor that produces markup, and
//!   [`render`] wires the two together.
//! - **Pull** ([`Document`]): a lazy, read-only pseudo-DOM. Handles are
//!   positions into the stream; nothing is copied or built up front.
//!
//! Both decoders only read the stream, so any number of them can run over
//! the same compiled value at once.
//!
//! # Example
//!
//! ```
//! use quill_compiler::Encoder;
//! use quill_dom::{Document, Node, render};
//! use quill_names::ElementName;
//!
//! let mut encoder = Encoder::new();
//! let html = encoder
//!     .compile(|e| e.element_text(ElementName::P, "hello"))
//!     .unwrap();
//!
//! assert_eq!(render(&html).unwrap(), "<p>hello</p>");
//!
//! let doc = Document::new(&html);
//! let Some(Node::Element(p)) = doc.nodes().next() else { panic!() };
//! assert_eq!(p.name(), ElementName::P);
//! ```

mod document;
mod error;
mod player;
mod stream;
mod writer;

pub use document::{
    Attribute, AttributeValues, Document, DocumentNodes, Element, ElementAttributes, ElementNodes,
    Node, Text,
};
pub use error::DecodeError;
pub use player::{HtmlPlayer, Visitor};
pub use writer::{HtmlWriter, RenderError, render};
