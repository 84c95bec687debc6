//! Pull decoding: a lazy, read-only pseudo-DOM over a compiled stream.
//!
//! Nothing is materialized. Every handle is a position into the stream, and
//! every cursor decodes only what its `next` call returns. A top-level
//! element is stepped over through its length prefix, so iterating the
//! document never touches an element's internals until one of its own
//! cursors is asked for.
//!
//! Cursors are fresh on every call: `nodes()` and `attributes()` always
//! start over from the beginning.
//!
//! # Panics
//!
//! The pull decoder trusts the stream. A tag that cannot appear where it is
//! found means the stream is corrupt, and the cursor that finds it panics
//! with the decoding error. Open untrusted streams with
//! [`Document::try_new`], which decodes the whole stream once up front.

use std::cell::Cell;

use quill_compiler::CompiledHtml;
use quill_names::{AttributeName, ElementName};

use crate::error::DecodeError;
use crate::player::{HtmlPlayer, Visitor};
use crate::stream::{BodyEntry, NodeEntry, Scanner, TopLevel};

fn decoded<T>(result: Result<T, DecodeError>) -> T {
    result.unwrap_or_else(|error| panic!("corrupt token stream: {error}"))
}

/// Read-only document view over a compiled stream.
#[derive(Debug)]
pub struct Document<'a> {
    html: &'a CompiledHtml,
    reads: Cell<usize>,
}

impl<'a> Document<'a> {
    /// View `html` as a document.
    #[must_use]
    pub const fn new(html: &'a CompiledHtml) -> Self {
        Self {
            html,
            reads: Cell::new(0),
        }
    }

    /// View `html` as a document after checking that all of it decodes.
    /// Cursors of a checked document never panic.
    ///
    /// # Errors
    ///
    /// Returns the first [`DecodeError`] found in the stream.
    pub fn try_new(html: &'a CompiledHtml) -> Result<Self, DecodeError> {
        HtmlPlayer::new(html).play(&mut Checker)?;
        Ok(Self::new(html))
    }

    /// Cursor over the top-level nodes.
    #[must_use]
    pub fn nodes(&self) -> DocumentNodes<'_> {
        DocumentNodes {
            doc: self,
            pos: 0,
            flatten: None,
            peeked: None,
        }
    }

    /// Number of cells decoded so far by all cursors of this document.
    #[must_use]
    pub fn cells_read(&self) -> usize {
        self.reads.get()
    }

    fn scanner(&self) -> Scanner<'_> {
        Scanner::counted(self.html, &self.reads)
    }
}

/// Visits a stream only to surface its decoding errors.
struct Checker;

impl Visitor for Checker {
    type Error = DecodeError;
}

/// A node of the pseudo-DOM.
#[derive(Debug, Clone, Copy)]
pub enum Node<'d> {
    /// `<!DOCTYPE html>`
    Doctype,
    /// An element.
    Element(Element<'d>),
    /// Escaped text.
    Text(Text<'d>),
    /// Raw text.
    Raw(Text<'d>),
}

impl<'d> Node<'d> {
    fn from_entry(doc: &'d Document<'d>, entry: NodeEntry) -> Self {
        match entry {
            NodeEntry::Element(header) => Self::Element(Element {
                doc,
                kind: ElementKind::Record(header),
            }),
            NodeEntry::Ambiguous { name, text } => Self::Element(Element {
                doc,
                kind: ElementKind::Ambiguous { name, text },
            }),
            NodeEntry::Text(index) => Self::Text(Text { doc, index }),
            NodeEntry::Raw(index) => Self::Raw(Text { doc, index }),
        }
    }

    /// The element, if this node is one.
    #[must_use]
    pub const fn as_element(&self) -> Option<&Element<'d>> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// Cursor over a document's top-level nodes.
#[derive(Debug)]
pub struct DocumentNodes<'d> {
    doc: &'d Document<'d>,
    pos: usize,
    /// Next entry of the top-level flatten group being walked.
    flatten: Option<usize>,
    peeked: Option<Node<'d>>,
}

impl<'d> DocumentNodes<'d> {
    /// Whether another node follows.
    ///
    /// # Panics
    ///
    /// Panics if the stream is corrupt.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.advance();
        }
        self.peeked.is_some()
    }

    fn advance(&mut self) -> Option<Node<'d>> {
        let scanner = self.doc.scanner();
        loop {
            if let Some(pos) = self.flatten {
                let (entry, next) = decoded(scanner.entry(pos));
                match entry {
                    BodyEntry::Node(node) => {
                        self.flatten = Some(next);
                        return Some(Node::from_entry(self.doc, node));
                    }
                    BodyEntry::End => self.flatten = None,
                    BodyEntry::Attribute { .. } => {
                        let error = DecodeError::UnexpectedTag {
                            context: "top-level flatten group",
                            found: "attribute reference",
                            offset: pos,
                        };
                        panic!("corrupt token stream: {error}");
                    }
                }
            }

            let (record, next) = decoded(scanner.top_level(self.pos))?;
            self.pos = next;
            match record {
                TopLevel::Doctype => return Some(Node::Doctype),
                TopLevel::Element(header) => {
                    return Some(Node::Element(Element {
                        doc: self.doc,
                        kind: ElementKind::Record(header),
                    }));
                }
                TopLevel::Flatten(body) => self.flatten = Some(body),
            }
        }
    }
}

impl<'d> Iterator for DocumentNodes<'d> {
    type Item = Node<'d>;

    fn next(&mut self) -> Option<Node<'d>> {
        self.peeked.take().or_else(|| self.advance())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    /// Header position of an element record.
    Record(usize),
    /// An ambiguous value taken as an element: no attributes, one text child.
    Ambiguous { name: ElementName, text: usize },
}

/// A lazy element handle.
#[derive(Debug, Clone, Copy)]
pub struct Element<'d> {
    doc: &'d Document<'d>,
    kind: ElementKind,
}

impl<'d> Element<'d> {
    /// The element name.
    ///
    /// # Panics
    ///
    /// Panics if the stream is corrupt.
    #[must_use]
    pub fn name(&self) -> ElementName {
        match self.kind {
            ElementKind::Record(header) => decoded(self.doc.scanner().element_header(header)).0,
            ElementKind::Ambiguous { name, .. } => name,
        }
    }

    /// Cursor over the element's attributes, one per distinct name.
    #[must_use]
    pub fn attributes(&self) -> ElementAttributes<'d> {
        ElementAttributes {
            doc: self.doc,
            state: match self.kind {
                ElementKind::Record(header) => Body::Header(header),
                ElementKind::Ambiguous { .. } => Body::Done,
            },
            start: 0,
            seen: Vec::new(),
        }
    }

    /// The attribute called `name`, if the element has one.
    #[must_use]
    pub fn attribute(&self, name: AttributeName) -> Option<Attribute<'d>> {
        self.attributes().find(|attribute| attribute.name() == name)
    }

    /// Cursor over the element's child nodes.
    #[must_use]
    pub fn nodes(&self) -> ElementNodes<'d> {
        ElementNodes {
            doc: self.doc,
            state: match self.kind {
                ElementKind::Record(header) => Children::Body(Body::Header(header)),
                ElementKind::Ambiguous { text, .. } => Children::Single(text),
            },
        }
    }
}

/// Where a body cursor stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    /// Not started: the header still has to be decoded.
    Header(usize),
    /// At a body entry.
    At(usize),
    Done,
}

impl Body {
    /// Position of the current entry, decoding the header on first use.
    fn entry_pos(self, scanner: Scanner<'_>) -> Option<usize> {
        match self {
            Self::Header(header) => Some(decoded(scanner.element_header(header)).1),
            Self::At(pos) => Some(pos),
            Self::Done => None,
        }
    }
}

/// Cursor over an element's attributes.
///
/// Attributes repeated under one name are reported once, at their first
/// position; [`Attribute::values`] returns all of their values.
#[derive(Debug)]
pub struct ElementAttributes<'d> {
    doc: &'d Document<'d>,
    state: Body,
    /// First body entry, known once the header is decoded.
    start: usize,
    seen: Vec<AttributeName>,
}

impl<'d> Iterator for ElementAttributes<'d> {
    type Item = Attribute<'d>;

    fn next(&mut self) -> Option<Attribute<'d>> {
        let scanner = self.doc.scanner();
        let mut pos = match self.state {
            Body::Header(header) => {
                self.start = decoded(scanner.element_header(header)).1;
                self.start
            }
            Body::At(pos) => pos,
            Body::Done => return None,
        };
        loop {
            let (entry, next) = decoded(scanner.entry(pos));
            let BodyEntry::Attribute { name, .. } = entry else {
                self.state = Body::Done;
                return None;
            };
            pos = next;
            if !self.seen.contains(&name) {
                self.seen.push(name);
                self.state = Body::At(pos);
                return Some(Attribute {
                    doc: self.doc,
                    body: self.start,
                    name,
                });
            }
        }
    }
}

/// An attribute handle.
#[derive(Debug, Clone, Copy)]
pub struct Attribute<'d> {
    doc: &'d Document<'d>,
    /// First body entry of the owning element.
    body: usize,
    name: AttributeName,
}

impl<'d> Attribute<'d> {
    /// The attribute name.
    #[must_use]
    pub const fn name(&self) -> AttributeName {
        self.name
    }

    /// Whether the attribute has at least one value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value().is_some()
    }

    /// The first value.
    #[must_use]
    pub fn value(&self) -> Option<&'d str> {
        self.values().next()
    }

    /// Every value given under this name, in order.
    #[must_use]
    pub fn values(&self) -> AttributeValues<'d> {
        AttributeValues {
            doc: self.doc,
            name: self.name,
            pos: Some(self.body),
        }
    }
}

/// Cursor over the values of one attribute.
#[derive(Debug)]
pub struct AttributeValues<'d> {
    doc: &'d Document<'d>,
    name: AttributeName,
    pos: Option<usize>,
}

impl<'d> Iterator for AttributeValues<'d> {
    type Item = &'d str;

    fn next(&mut self) -> Option<&'d str> {
        let scanner = self.doc.scanner();
        while let Some(pos) = self.pos {
            let (entry, next) = decoded(scanner.entry(pos));
            let BodyEntry::Attribute { name, value } = entry else {
                self.pos = None;
                return None;
            };
            self.pos = Some(next);
            if name == self.name {
                if let Some(index) = value {
                    return Some(decoded(scanner.value(index)));
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Children {
    Body(Body),
    /// The text child of an ambiguous element.
    Single(usize),
}

/// Cursor over an element's child nodes.
#[derive(Debug)]
pub struct ElementNodes<'d> {
    doc: &'d Document<'d>,
    state: Children,
}

impl<'d> Iterator for ElementNodes<'d> {
    type Item = Node<'d>;

    fn next(&mut self) -> Option<Node<'d>> {
        let scanner = self.doc.scanner();
        let body = match self.state {
            Children::Single(index) => {
                self.state = Children::Body(Body::Done);
                return Some(Node::Text(Text { doc: self.doc, index }));
            }
            Children::Body(body) => body,
        };
        let mut pos = body.entry_pos(scanner)?;
        loop {
            let (entry, next) = decoded(scanner.entry(pos));
            match entry {
                BodyEntry::Attribute { .. } => pos = next,
                BodyEntry::Node(node) => {
                    self.state = Children::Body(Body::At(next));
                    return Some(Node::from_entry(self.doc, node));
                }
                BodyEntry::End => {
                    self.state = Children::Body(Body::Done);
                    return None;
                }
            }
        }
    }
}

/// A text handle.
#[derive(Debug, Clone, Copy)]
pub struct Text<'d> {
    doc: &'d Document<'d>,
    index: usize,
}

impl<'d> Text<'d> {
    /// The text.
    ///
    /// # Panics
    ///
    /// Panics if the pool has no value for this node.
    #[must_use]
    pub fn value(&self) -> &'d str {
        decoded(self.doc.scanner().value(self.index))
    }
}
