//! Push decoding: one depth-first pass over a stream, driving a [`Visitor`].

use quill_compiler::CompiledHtml;
use quill_names::{AttributeName, ElementName};
use tracing::trace;

use crate::error::DecodeError;
use crate::stream::{BodyEntry, NodeEntry, Scanner, TopLevel};

/// Callbacks for [`HtmlPlayer::play`], invoked in document order.
///
/// Every callback does nothing by default. For each element the player
/// calls `start_tag`, then one `attribute_start`/`attribute_value`*/
/// `attribute_end` group per distinct attribute name (in order of first
/// appearance, values in order), then `start_tag_end`, the children, and
/// `end_tag`. Flag attributes have no `attribute_value` call.
#[allow(unused_variables)]
pub trait Visitor {
    /// Error type of the visitor. Decoding errors are converted into it.
    type Error: From<DecodeError>;

    /// Before anything else.
    fn document_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// `<!DOCTYPE html>`.
    fn doctype(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// An element opens.
    fn start_tag(&mut self, name: ElementName) -> Result<(), Self::Error> {
        Ok(())
    }

    /// An attribute of the element being opened starts.
    fn attribute_start(&mut self, name: AttributeName) -> Result<(), Self::Error> {
        Ok(())
    }

    /// One value of the current attribute.
    fn attribute_value(&mut self, value: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// The current attribute is complete.
    fn attribute_end(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// All attributes of the element have been reported.
    fn start_tag_end(&mut self, name: ElementName) -> Result<(), Self::Error> {
        Ok(())
    }

    /// A text node, unescaped.
    fn text(&mut self, value: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// A raw text node, to be written verbatim.
    fn raw(&mut self, value: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// An element closes.
    fn end_tag(&mut self, name: ElementName) -> Result<(), Self::Error> {
        Ok(())
    }

    /// After everything else.
    fn document_end(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Plays a compiled stream into a [`Visitor`].
///
/// The stream is immutable, so a player can be run any number of times and
/// several players can read the same stream concurrently.
#[derive(Debug, Clone, Copy)]
pub struct HtmlPlayer<'a> {
    scanner: Scanner<'a>,
}

impl<'a> HtmlPlayer<'a> {
    /// Create a player for `html`.
    #[must_use]
    pub const fn new(html: &'a CompiledHtml) -> Self {
        Self {
            scanner: Scanner::new(html),
        }
    }

    /// Decode the whole stream once, in document order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the visitor, or a [`DecodeError`]
    /// converted into the visitor's error type if the stream is malformed.
    pub fn play<V: Visitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        trace!(cells = self.scanner.len(), "playing document");
        visitor.document_start()?;
        let mut pos = 0;
        while let Some((record, next)) = self.scanner.top_level(pos)? {
            match record {
                TopLevel::Doctype => visitor.doctype()?,
                TopLevel::Element(header) => self.element(header, visitor)?,
                TopLevel::Flatten(body) => self.flatten(body, visitor)?,
            }
            pos = next;
        }
        visitor.document_end()
    }

    fn element<V: Visitor>(&self, header: usize, visitor: &mut V) -> Result<(), V::Error> {
        let (name, mut pos) = self.scanner.element_header(header)?;
        visitor.start_tag(name)?;

        let mut attributes: Vec<(AttributeName, Vec<usize>)> = Vec::new();
        let mut entry = loop {
            let (entry, next) = self.scanner.entry(pos)?;
            let BodyEntry::Attribute { name, value } = entry else {
                break (entry, next);
            };
            match attributes.iter().position(|(seen, _)| *seen == name) {
                Some(index) => attributes[index].1.extend(value),
                None => attributes.push((name, value.into_iter().collect())),
            }
            pos = next;
        };

        for (name, values) in &attributes {
            visitor.attribute_start(*name)?;
            for &index in values {
                visitor.attribute_value(self.scanner.value(index)?)?;
            }
            visitor.attribute_end()?;
        }
        visitor.start_tag_end(name)?;

        loop {
            let (current, next) = entry;
            match current {
                BodyEntry::End => break,
                BodyEntry::Node(node) => self.node(node, visitor)?,
                BodyEntry::Attribute { .. } => {
                    return Err(DecodeError::UnexpectedTag {
                        context: "child nodes",
                        found: "attribute reference",
                        offset: pos,
                    }
                    .into());
                }
            }
            pos = next;
            entry = self.scanner.entry(pos)?;
        }
        visitor.end_tag(name)
    }

    fn flatten<V: Visitor>(&self, mut pos: usize, visitor: &mut V) -> Result<(), V::Error> {
        loop {
            let (entry, next) = self.scanner.entry(pos)?;
            match entry {
                BodyEntry::End => return Ok(()),
                BodyEntry::Node(node) => self.node(node, visitor)?,
                BodyEntry::Attribute { .. } => {
                    return Err(DecodeError::UnexpectedTag {
                        context: "top-level flatten group",
                        found: "attribute reference",
                        offset: pos,
                    }
                    .into());
                }
            }
            pos = next;
        }
    }

    fn node<V: Visitor>(&self, node: NodeEntry, visitor: &mut V) -> Result<(), V::Error> {
        match node {
            NodeEntry::Element(header) => self.element(header, visitor),
            NodeEntry::Ambiguous { name, text } => {
                visitor.start_tag(name)?;
                visitor.start_tag_end(name)?;
                visitor.text(self.scanner.value(text)?)?;
                visitor.end_tag(name)
            }
            NodeEntry::Text(index) => visitor.text(self.scanner.value(index)?),
            NodeEntry::Raw(index) => visitor.raw(self.scanner.value(index)?),
        }
    }
}
