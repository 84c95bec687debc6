//! Cell-level reading shared by the push and pull decoders.

use std::cell::Cell;

use quill_compiler::CompiledHtml;
use quill_compiler::proto::{self, Tag};
use quill_names::{Ambiguous, AttributeName, ElementName};

use crate::error::DecodeError;

type Result<T> = std::result::Result<T, DecodeError>;

/// A record found while scanning the top level of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TopLevel {
    Doctype,
    /// Header position of an unclaimed element.
    Element(usize),
    /// First body entry of an unclaimed flatten group.
    Flatten(usize),
}

/// One decoded entry of an element or flatten body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyEntry {
    Attribute {
        name: AttributeName,
        value: Option<usize>,
    },
    Node(NodeEntry),
    End,
}

/// A child node reference, resolved to what it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeEntry {
    /// Header position of a claimed element.
    Element(usize),
    /// An ambiguous value taken as an element wrapping its text.
    Ambiguous { name: ElementName, text: usize },
    Text(usize),
    Raw(usize),
}

/// Reads cells, optionally counting every cell it touches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scanner<'a> {
    html: &'a CompiledHtml,
    reads: Option<&'a Cell<usize>>,
}

impl<'a> Scanner<'a> {
    pub(crate) const fn new(html: &'a CompiledHtml) -> Self {
        Self { html, reads: None }
    }

    pub(crate) const fn counted(html: &'a CompiledHtml, reads: &'a Cell<usize>) -> Self {
        Self {
            html,
            reads: Some(reads),
        }
    }

    fn count(&self, cells: usize) {
        if let Some(reads) = self.reads {
            reads.set(reads.get() + cells);
        }
    }

    fn cells(&self) -> &'a [u8] {
        self.html.cells()
    }

    pub(crate) fn len(&self) -> usize {
        self.html.len()
    }

    fn cell(&self, pos: usize) -> Result<u8> {
        let cell = *self
            .cells()
            .get(pos)
            .ok_or(DecodeError::Truncated { offset: pos })?;
        self.count(1);
        Ok(cell)
    }

    pub(crate) fn tag(&self, pos: usize) -> Result<Tag> {
        let cell = self.cell(pos)?;
        Tag::from_cell(cell).ok_or(DecodeError::UnexpectedTag {
            context: "tag position",
            found: proto::cell_name(cell),
            offset: pos,
        })
    }

    fn expect(&self, pos: usize, expected: Tag, context: &'static str) -> Result<()> {
        let tag = self.tag(pos)?;
        if tag == expected {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedTag {
                context,
                found: tag.into(),
                offset: pos,
            })
        }
    }

    fn length(&self, pos: usize, width: usize) -> Result<usize> {
        let len = proto::decode_length(self.cells(), pos, width).ok_or(DecodeError::Truncated {
            offset: self.len(),
        })?;
        self.count(width);
        Ok(len)
    }

    fn varint(&self, pos: usize) -> Result<(usize, usize)> {
        let (value, next) = proto::decode_varint(self.cells(), pos).ok_or(DecodeError::Truncated {
            offset: self.len(),
        })?;
        self.count(next - pos);
        Ok((value, next))
    }

    fn index(&self, pos: usize) -> Result<usize> {
        let index = proto::decode_index(self.cells(), pos).ok_or(DecodeError::Truncated {
            offset: self.len(),
        })?;
        self.count(2);
        Ok(index)
    }

    pub(crate) fn value(&self, index: usize) -> Result<&'a str> {
        self.html.value(index).ok_or(DecodeError::MissingValue { index })
    }

    /// Header width and total size of the structural record at `pos`.
    fn record_size(&self, tag: Tag, pos: usize) -> Result<(usize, usize)> {
        let width = tag.header_width().unwrap_or(2);
        let len = self.length(pos + 1, width)?;
        Ok((width, 1 + width + len))
    }

    /// Find the next top-level record at or after `pos`, skipping claimed
    /// records in one step each. Returns the record and where the scan
    /// resumes.
    pub(crate) fn top_level(&self, mut pos: usize) -> Result<Option<(TopLevel, usize)>> {
        while pos < self.len() {
            let tag = self.tag(pos)?;
            match tag {
                Tag::Doctype => return Ok(Some((TopLevel::Doctype, pos + 1))),
                Tag::Element | Tag::Element3 => {
                    let (_, size) = self.record_size(tag, pos)?;
                    return Ok(Some((TopLevel::Element(pos), pos + size)));
                }
                Tag::Flatten | Tag::Flatten3 => {
                    let (width, size) = self.record_size(tag, pos)?;
                    return Ok(Some((TopLevel::Flatten(pos + 1 + width), pos + size)));
                }
                Tag::Length2 | Tag::Length3 => {
                    let (_, size) = self.record_size(tag, pos)?;
                    pos += size;
                }
                Tag::Marked3 | Tag::Marked4 | Tag::Marked5 => {
                    pos += tag.placeholder_size().unwrap_or(1);
                }
                _ => {
                    return Err(DecodeError::UnexpectedTag {
                        context: "top level",
                        found: tag.into(),
                        offset: pos,
                    });
                }
            }
        }
        Ok(None)
    }

    /// Decode an element header and return its name and first body entry.
    pub(crate) fn element_header(&self, header: usize) -> Result<(ElementName, usize)> {
        let tag = self.tag(header)?;
        let width = match tag {
            Tag::Element | Tag::Length2 => 2,
            Tag::Element3 | Tag::Length3 => 3,
            _ => {
                return Err(DecodeError::UnexpectedTag {
                    context: "element header",
                    found: tag.into(),
                    offset: header,
                });
            }
        };
        let name_pos = header + 1 + width;
        self.expect(name_pos, Tag::StandardName, "element header")?;
        let name = self.element_name(name_pos + 1)?;
        Ok((name, name_pos + 2))
    }

    fn element_name(&self, pos: usize) -> Result<ElementName> {
        let ordinal = self.cell(pos)?;
        ElementName::from_repr(ordinal).ok_or(DecodeError::UnknownName {
            catalog: "element",
            ordinal,
            offset: pos,
        })
    }

    fn attribute_name(&self, pos: usize) -> Result<AttributeName> {
        let ordinal = self.cell(pos)?;
        AttributeName::from_repr(ordinal).ok_or(DecodeError::UnknownName {
            catalog: "attribute",
            ordinal,
            offset: pos,
        })
    }

    fn ambiguous_name(&self, pos: usize) -> Result<Ambiguous> {
        let ordinal = self.cell(pos)?;
        Ambiguous::from_repr(ordinal).ok_or(DecodeError::UnknownName {
            catalog: "ambiguous",
            ordinal,
            offset: pos,
        })
    }

    /// Decode the body entry at `pos` and return it with the position of the
    /// next entry. `END` does not advance.
    pub(crate) fn entry(&self, pos: usize) -> Result<(BodyEntry, usize)> {
        let tag = self.tag(pos)?;
        match tag {
            Tag::End => Ok((BodyEntry::End, pos)),
            Tag::AttributeId | Tag::AttributeClass => {
                let index = self.index(pos + 1)?;
                let name = if tag == Tag::AttributeId {
                    AttributeName::Id
                } else {
                    AttributeName::Class
                };
                Ok((
                    BodyEntry::Attribute {
                        name,
                        value: Some(index),
                    },
                    pos + 3,
                ))
            }
            _ if tag.is_reference() => {
                let operand = pos + 1;
                let (distance, next) = self.varint(operand)?;
                let target = operand
                    .checked_sub(distance)
                    .ok_or(DecodeError::BadReference { offset: operand })?;
                Ok((self.resolve(tag, target, pos)?, next))
            }
            _ => Err(DecodeError::UnexpectedTag {
                context: "element body",
                found: tag.into(),
                offset: pos,
            }),
        }
    }

    /// Resolve the reference at `from` to the record at `target`.
    fn resolve(&self, tag: Tag, target: usize, from: usize) -> Result<BodyEntry> {
        let entry = match tag {
            Tag::Attribute0 => {
                self.expect(target, Tag::Marked3, "flag attribute")?;
                BodyEntry::Attribute {
                    name: self.attribute_name(target + 1)?,
                    value: None,
                }
            }
            Tag::Attribute1 => {
                self.expect(target, Tag::Marked5, "attribute")?;
                BodyEntry::Attribute {
                    name: self.attribute_name(target + 1)?,
                    value: Some(self.index(target + 2)?),
                }
            }
            Tag::Ambiguous1 => {
                self.expect(target, Tag::Marked5, "ambiguous attribute")?;
                BodyEntry::Attribute {
                    name: self.ambiguous_name(target + 1)?.attribute_name(),
                    value: Some(self.index(target + 2)?),
                }
            }
            Tag::AmbiguousElement => {
                self.expect(target, Tag::Marked5, "ambiguous element")?;
                BodyEntry::Node(NodeEntry::Ambiguous {
                    name: self.ambiguous_name(target + 1)?.element_name(),
                    text: self.index(target + 2)?,
                })
            }
            Tag::Text | Tag::Raw => {
                self.expect(target, Tag::Marked4, "text")?;
                let index = self.index(target + 1)?;
                BodyEntry::Node(if tag == Tag::Text {
                    NodeEntry::Text(index)
                } else {
                    NodeEntry::Raw(index)
                })
            }
            _ => {
                let header = self.tag(target)?;
                if !matches!(header, Tag::Length2 | Tag::Length3) {
                    return Err(DecodeError::UnexpectedTag {
                        context: "child element",
                        found: header.into(),
                        offset: target,
                    });
                }
                // A claimed record ends before anything that references it.
                let (_, size) = self.record_size(header, target)?;
                if target + size > from {
                    return Err(DecodeError::BadReference { offset: from + 1 });
                }
                BodyEntry::Node(NodeEntry::Element(target))
            }
        };
        Ok(entry)
    }
}
