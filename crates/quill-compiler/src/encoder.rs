//! The compilation session.
//!
//! Builder calls arrive depth-first and in post-order: a node's attributes and
//! children are compiled *before* the node itself is opened. Each compiled
//! value is left in the stream as a record, and the element that owns it
//! later claims it with [`Encoder::element_value`]. When the element closes,
//! its claims are resolved by walking the stream backwards from the element's
//! start, one record per claim, and the element body is written as a list of
//! references to the claimed records.
//!
//! Claimed records stay where they are; only their header tag is rewritten
//! to a skip-only `LENGTH2`/`LENGTH3` so that a forward reader steps over
//! them in one jump.

use quill_names::{Ambiguous, AttributeName, ElementName};
use strum_macros::Display;
use tracing::{debug, trace, warn};

use crate::buffer::{CellBuffer, ObjectPool};
use crate::compiled::CompiledHtml;
use crate::config::EncoderConfig;
use crate::error::CompileError;
use crate::proto::{self, FRAGMENT_HEADER, MAX_LENGTH2, MAX_LENGTH3, Tag};
use crate::stack::{AuxStack, Claim, Entry, MarkKind, OpenKind};

type Result<T> = std::result::Result<T, CompileError>;

/// What an [`Encoder::element_value`] call claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// An attribute placeholder, or an ambiguous value taken as an attribute.
    Attribute,
    /// An element, a flatten group, or an ambiguous value taken as an element.
    Element,
    /// A closed fragment; every top-level value inside it is spliced in.
    Fragment,
    /// A text or raw text placeholder.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Compiling,
    Aborted,
}

/// What a backward claim step accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Want {
    Value(ValueKind),
    /// Any top-level value of a fragment being spliced.
    Member,
}

impl Want {
    const fn kind(self) -> ValueKind {
        match self {
            Self::Value(kind) => kind,
            Self::Member => ValueKind::Fragment,
        }
    }

    const fn takes_element(self) -> bool {
        matches!(self, Self::Value(ValueKind::Element) | Self::Member)
    }

    const fn takes_fragment(self) -> bool {
        matches!(self, Self::Value(ValueKind::Fragment) | Self::Member)
    }
}

/// A resolved element body entry. Positions are absolute record starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Attribute0(usize),
    Attribute1(usize),
    Ambiguous1(usize),
    Id(u16),
    Class(u16),
    Element(usize),
    AmbiguousElement(usize),
    Text(usize),
    Raw(usize),
}

impl Link {
    const fn is_attribute(self) -> bool {
        matches!(
            self,
            Self::Attribute0(_) | Self::Attribute1(_) | Self::Ambiguous1(_) | Self::Id(_) | Self::Class(_)
        )
    }

    fn from_reference(tag: Tag, target: usize) -> Option<Self> {
        Some(match tag {
            Tag::Attribute0 => Self::Attribute0(target),
            Tag::Attribute1 => Self::Attribute1(target),
            Tag::Ambiguous1 => Self::Ambiguous1(target),
            Tag::Element => Self::Element(target),
            Tag::AmbiguousElement => Self::AmbiguousElement(target),
            Tag::Text => Self::Text(target),
            Tag::Raw => Self::Raw(target),
            _ => return None,
        })
    }
}

/// A reusable compilation session.
///
/// One encoder runs one compilation at a time; its buffers are recycled by
/// every [`compilation_begin`](Self::compilation_begin). Any failing call
/// aborts the running compilation.
///
/// ```
/// use quill_compiler::{Encoder, ValueKind};
/// use quill_names::{AttributeName, ElementName};
///
/// let mut encoder = Encoder::new();
/// let html = encoder.compile(|e| {
///     e.attribute(AttributeName::Lang, "pt-BR")?;
///     e.element_begin(ElementName::Html)?;
///     e.element_value(ValueKind::Attribute)?;
///     e.element_end()
/// })?;
/// assert_eq!(html.len(), 15);
/// # Ok::<(), quill_compiler::CompileError>(())
/// ```
#[derive(Debug)]
pub struct Encoder {
    config: EncoderConfig,
    cells: CellBuffer,
    pool: ObjectPool,
    stack: AuxStack,
    state: State,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Create an encoder with the default [`EncoderConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EncoderConfig::default())
    }

    /// Create an encoder with explicit buffer capacities.
    #[must_use]
    pub fn with_config(config: EncoderConfig) -> Self {
        Self {
            config,
            cells: CellBuffer::with_capacity(config.cell_capacity),
            pool: ObjectPool::with_capacity(config.pool_capacity),
            stack: AuxStack::with_capacity(config.stack_capacity),
            state: State::Idle,
        }
    }

    /// The configuration this encoder was created with.
    #[must_use]
    pub const fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Whether a compilation is open.
    #[must_use]
    pub fn is_compiling(&self) -> bool {
        self.state == State::Compiling
    }

    /// Run a whole compilation: begin, `build`, end.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by `build` or by the final balance
    /// check. The compilation is aborted in either case.
    pub fn compile<F>(&mut self, build: F) -> Result<CompiledHtml>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.compilation_begin()?;
        if let Err(error) = build(self) {
            self.abort(&error);
            return Err(error);
        }
        self.compilation_end()
    }

    /// Start a compilation, discarding whatever the previous one left behind.
    ///
    /// # Errors
    ///
    /// [`CompileError::AlreadyCompiling`] if a compilation is open.
    pub fn compilation_begin(&mut self) -> Result<()> {
        if self.state == State::Compiling {
            return Err(CompileError::AlreadyCompiling);
        }
        self.cells.reset(self.config.cell_capacity);
        self.pool.reset(self.config.pool_capacity);
        self.stack.reset(self.config.stack_capacity);
        self.state = State::Compiling;
        debug!("compilation started");
        Ok(())
    }

    /// Finish the compilation and hand out the frozen stream.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnbalancedStack`] if a record is still open or a
    /// value was never claimed, and [`CompileError::StrayAttributes`] if an
    /// unclaimed flatten group holds attributes.
    pub fn compilation_end(&mut self) -> Result<CompiledHtml> {
        self.step(|this| {
            if let Some(entry) = this.stack.last() {
                return Err(CompileError::UnbalancedStack {
                    entry: entry.describe(),
                    offset: entry.offset().unwrap_or(this.cells.len()),
                });
            }
            this.check_top_level()?;
            let html = CompiledHtml::from_parts(this.cells.take(), this.pool.take());
            this.state = State::Idle;
            debug!(cells = html.len(), values = html.pool().len(), "compilation finished");
            Ok(html)
        })
    }

    /// Compile `<!DOCTYPE html>`.
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group.
    pub fn doctype(&mut self) -> Result<()> {
        self.step(|this| {
            this.require_content_position("doctype")?;
            this.cells.push_tag(Tag::Doctype);
            Ok(())
        })
    }

    /// Compile an attribute value, to be claimed with
    /// [`ValueKind::Attribute`].
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group, or when the object pool
    /// is full.
    pub fn attribute(&mut self, name: AttributeName, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.step(|this| {
            this.require_content_position("attribute")?;
            let index = this.pool.push(value)?;
            let start = this.cells.len();
            this.cells.push_tag(Tag::Marked5);
            this.cells.push(name as u8);
            this.cells.push_index(index);
            this.cells.push_tag(Tag::Internal5);
            this.push_mark(MarkKind::Attribute1, start);
            Ok(())
        })
    }

    /// Compile a valueless attribute such as `required`, to be claimed with
    /// [`ValueKind::Attribute`].
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group.
    pub fn attribute_flag(&mut self, name: AttributeName) -> Result<()> {
        self.step(|this| {
            this.require_content_position("attribute")?;
            let start = this.cells.len();
            this.cells.push_tag(Tag::Marked3);
            this.cells.push(name as u8);
            this.cells.push_tag(Tag::Internal3);
            this.push_mark(MarkKind::Attribute0, start);
            Ok(())
        })
    }

    /// Compile a name that is both an attribute and an element.
    ///
    /// Claimed with [`ValueKind::Attribute`] it becomes `name="value"`;
    /// claimed with [`ValueKind::Element`] (or spliced from a fragment) it
    /// becomes `<name>value</name>`.
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group, or when the object pool
    /// is full.
    pub fn ambiguous(&mut self, name: Ambiguous, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.step(|this| {
            this.require_content_position("ambiguous value")?;
            let index = this.pool.push(value)?;
            let start = this.cells.len();
            this.cells.push_tag(Tag::Marked5);
            this.cells.push(name as u8);
            this.cells.push_index(index);
            this.cells.push_tag(Tag::Internal5);
            this.push_mark(MarkKind::Ambiguous, start);
            Ok(())
        })
    }

    /// Compile escaped text, to be claimed with [`ValueKind::Text`].
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group, or when the object pool
    /// is full.
    pub fn text(&mut self, value: impl Into<String>) -> Result<()> {
        self.text_placeholder(MarkKind::Text, value.into())
    }

    /// Compile text written without escaping, to be claimed with
    /// [`ValueKind::Text`].
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group, or when the object pool
    /// is full.
    pub fn raw(&mut self, value: impl Into<String>) -> Result<()> {
        self.text_placeholder(MarkKind::Raw, value.into())
    }

    fn text_placeholder(&mut self, kind: MarkKind, value: String) -> Result<()> {
        self.step(|this| {
            this.require_content_position(kind.describe())?;
            let index = this.pool.push(value)?;
            let start = this.cells.len();
            this.cells.push_tag(Tag::Marked4);
            this.cells.push_index(index);
            this.cells.push_tag(Tag::Internal4);
            this.push_mark(kind, start);
            Ok(())
        })
    }

    /// Open an element. Its values must already be compiled; claim them with
    /// [`element_value`](Self::element_value) and close it with
    /// [`element_end`](Self::element_end).
    ///
    /// # Errors
    ///
    /// Fails inside another open element or flatten group.
    pub fn element_begin(&mut self, name: ElementName) -> Result<()> {
        self.step(|this| {
            this.require_content_position("element")?;
            let start = this.cells.len();
            this.cells.push_tag(Tag::Element);
            this.cells.push_length_slot(2);
            this.cells.push_tag(Tag::StandardName);
            this.cells.push(name as u8);
            this.stack.push(Entry::Open {
                kind: OpenKind::Element(name),
                start,
            });
            trace!(%name, start, "element opened");
            Ok(())
        })
    }

    /// Open a flatten group: a wrapper whose claimed values are spliced into
    /// whichever element later claims the group. Closed by
    /// [`element_end`](Self::element_end).
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group.
    pub fn flatten_begin(&mut self) -> Result<()> {
        self.step(|this| {
            this.require_content_position("flatten group")?;
            let start = this.cells.len();
            this.cells.push_tag(Tag::Flatten);
            this.cells.push_length_slot(2);
            this.stack.push(Entry::Open {
                kind: OpenKind::Flatten,
                start,
            });
            trace!(start, "flatten opened");
            Ok(())
        })
    }

    /// Claim one previously compiled value for the open element.
    ///
    /// Claims are matched when the element closes: the last claim takes the
    /// record right before the element, the one before it the record before
    /// that, and so on.
    ///
    /// # Errors
    ///
    /// Fails when no element or flatten group is open.
    pub fn element_value(&mut self, kind: ValueKind) -> Result<()> {
        self.step(|this| {
            this.require_open_record("element value")?;
            this.stack.push(Entry::Claim(Claim::Value(kind)));
            Ok(())
        })
    }

    /// Give the open element an `id` supplied at render time. The value is
    /// stored inline in the element body.
    ///
    /// # Errors
    ///
    /// Fails when no element or flatten group is open, or when the object
    /// pool is full.
    pub fn element_id(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.step(|this| {
            this.require_open_record("element id")?;
            let index = this.pool.push(value)?;
            this.stack.push(Entry::Claim(Claim::Id(index)));
            Ok(())
        })
    }

    /// Give the open element a `class` supplied at render time.
    ///
    /// # Errors
    ///
    /// Fails when no element or flatten group is open, or when the object
    /// pool is full.
    pub fn element_class(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.step(|this| {
            this.require_open_record("element class")?;
            let index = this.pool.push(value)?;
            this.stack.push(Entry::Claim(Claim::Class(index)));
            Ok(())
        })
    }

    /// Close the open element or flatten group, resolving its claims.
    ///
    /// # Errors
    ///
    /// Fails when nothing is open, when a claim finds no record or a record
    /// of the wrong kind, or when the body does not fit a 3-cell header.
    pub fn element_end(&mut self) -> Result<()> {
        self.step(|this| {
            let claims = this.stack.pop_claims();
            let (kind, start) = match this.stack.pop() {
                Some(Entry::Open {
                    kind: kind @ (OpenKind::Element(_) | OpenKind::Flatten),
                    start,
                }) => (kind, start),
                _ => {
                    return Err(CompileError::NoOpenRecord {
                        construct: "element end",
                    });
                }
            };

            let floor = this.fragment_floor();
            let mut cursor = start;
            let mut links = Vec::with_capacity(claims.len());
            for claim in claims {
                match claim {
                    Claim::Id(index) => links.push(Link::Id(index)),
                    Claim::Class(index) => links.push(Link::Class(index)),
                    Claim::Value(value) => {
                        this.claim(Want::Value(value), &mut cursor, floor, &mut links)?;
                    }
                }
            }
            links.reverse();

            this.write_record(kind, start, cursor, &links)
        })
    }

    /// Compile `<name>text</name>`.
    ///
    /// # Errors
    ///
    /// See [`text`](Self::text) and [`element_begin`](Self::element_begin).
    pub fn element_text(&mut self, name: ElementName, text: impl Into<String>) -> Result<()> {
        self.text(text)?;
        self.element_begin(name)?;
        self.element_value(ValueKind::Text)?;
        self.element_end()
    }

    /// Open a fragment and return its start offset, the index
    /// [`fragment_end`](Self::fragment_end) expects.
    ///
    /// Everything compiled until the fragment ends belongs to it. The values
    /// left unclaimed at its top level are spliced, in order, into the
    /// element that claims the fragment with [`ValueKind::Fragment`].
    ///
    /// # Errors
    ///
    /// Fails inside an open element or flatten group.
    pub fn fragment_begin(&mut self) -> Result<usize> {
        self.step(|this| {
            this.require_content_position("fragment")?;
            let start = this.cells.len();
            this.cells.push_tag(Tag::Fragment);
            this.cells.push_length_slot(3);
            this.stack.push(Entry::Open {
                kind: OpenKind::Fragment,
                start,
            });
            trace!(start, "fragment opened");
            Ok(start)
        })
    }

    /// Close the fragment that starts at `index`.
    ///
    /// # Errors
    ///
    /// [`CompileError::FragmentMismatch`] if `index` is not the innermost
    /// open record.
    pub fn fragment_end(&mut self, index: usize) -> Result<()> {
        self.step(|this| {
            let position = match this.stack.innermost_open() {
                Some((position, OpenKind::Fragment, start)) if start == index => position,
                open => {
                    return Err(CompileError::FragmentMismatch {
                        expected: open.map(|(_, _, start)| start),
                        found: index,
                    });
                }
            };
            let members = this.stack.len() - position - 1;

            let end = this.cells.len();
            this.cells.push_tag(Tag::End);
            this.cells.push_varint(end - index);
            this.cells.push_tag(Tag::Internal);
            let len = this.cells.len() - (index + FRAGMENT_HEADER);
            if len > MAX_LENGTH3 {
                return Err(CompileError::RecordTooLarge {
                    offset: index,
                    len,
                    max: MAX_LENGTH3,
                });
            }
            this.cells.patch_length(index + 1, 3, len);

            let _ = this.stack.remove(position);
            this.push_mark(MarkKind::Fragment { members }, index);
            trace!(start = index, len, members, "fragment closed");
            Ok(())
        })
    }

    /// Compile a fragment: [`fragment_begin`](Self::fragment_begin), `build`,
    /// [`fragment_end`](Self::fragment_end).
    ///
    /// # Errors
    ///
    /// Returns the first error raised by `build` or by the fragment calls.
    pub fn fragment<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let index = self.fragment_begin()?;
        if let Err(error) = build(self) {
            self.abort(&error);
            return Err(error);
        }
        self.fragment_end(index)
    }

    fn step<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        match self.state {
            State::Idle => return Err(CompileError::NotCompiling),
            State::Aborted => return Err(CompileError::Aborted),
            State::Compiling => {}
        }
        let result = op(self);
        if let Err(error) = &result {
            self.abort(error);
        }
        result
    }

    fn abort(&mut self, error: &CompileError) {
        if self.state == State::Compiling {
            warn!(%error, "compilation aborted");
            self.state = State::Aborted;
        }
    }

    fn push_mark(&mut self, kind: MarkKind, start: usize) {
        self.stack.push(Entry::Mark { kind, start });
    }

    /// Content may only be compiled at the top level or inside a fragment.
    fn require_content_position(&self, construct: &'static str) -> Result<()> {
        match self.stack.innermost_open() {
            Some((_, kind @ (OpenKind::Element(_) | OpenKind::Flatten), start)) => {
                Err(CompileError::OpenRecord {
                    construct,
                    open: match kind {
                        OpenKind::Flatten => "flatten group",
                        _ => "element",
                    },
                    offset: start,
                })
            }
            _ => Ok(()),
        }
    }

    /// Claims may only be made while an element or flatten group is the
    /// innermost open record and nothing was compiled since it opened.
    fn require_open_record(&self, construct: &'static str) -> Result<()> {
        match self.stack.last() {
            Some(Entry::Claim(_) | Entry::Open {
                kind: OpenKind::Element(_) | OpenKind::Flatten,
                ..
            }) => Ok(()),
            _ => Err(CompileError::NoOpenRecord { construct }),
        }
    }

    /// First cell a backward claim walk may reach.
    fn fragment_floor(&self) -> usize {
        match self.stack.innermost_open() {
            Some((_, OpenKind::Fragment, start)) => start + FRAGMENT_HEADER,
            _ => 0,
        }
    }

    /// Claim the record that ends right before `cursor` and move `cursor` to
    /// the first cell of its span. Links are appended last-first.
    fn claim(&mut self, want: Want, cursor: &mut usize, floor: usize, links: &mut Vec<Link>) -> Result<()> {
        let offset = *cursor;
        if offset <= floor {
            return Err(CompileError::NothingToClaim {
                kind: want.kind(),
                offset,
            });
        }

        let last = self.cells.get(offset - 1);
        match Tag::from_cell(last) {
            Some(tag @ (Tag::Internal3 | Tag::Internal4 | Tag::Internal5)) => {
                let size = tag.placeholder_size().unwrap_or(0);
                let start = offset - size;
                let kind = self.pop_mark(start)?;
                links.push(Self::placeholder_link(want, kind, start)?);
                *cursor = start;
            }
            Some(Tag::Internal) => {
                let (span_start, end) = self.span_of(offset)?;
                let header = self.find_header(span_start, end)?;
                let tag = self.cells.tag_at(header);
                match tag {
                    Some(Tag::Element | Tag::Element3) if want.takes_element() => {
                        links.push(Link::Element(header));
                    }
                    Some(tag @ (Tag::Flatten | Tag::Flatten3)) if want.takes_element() => {
                        let spliced = self.flatten_links(header, tag)?;
                        links.extend(spliced.into_iter().rev());
                    }
                    Some(Tag::Fragment) if want.takes_fragment() => {
                        self.splice_fragment(header, end, links)?;
                    }
                    _ => {
                        return Err(CompileError::ValueMismatch {
                            kind: want.kind(),
                            found: proto::cell_name(self.cells.get(header)),
                            offset: header,
                        });
                    }
                }
                if let Some(claimed) = tag.and_then(Tag::claimed) {
                    self.cells.set_tag(header, claimed);
                }
                trace!(header, span_start, "record claimed");
                *cursor = span_start;
            }
            _ => {
                return Err(CompileError::UnclaimableRecord {
                    found: proto::cell_name(last),
                    offset: offset - 1,
                });
            }
        }
        Ok(())
    }

    fn placeholder_link(want: Want, kind: MarkKind, start: usize) -> Result<Link> {
        let link = match (want, kind) {
            (Want::Value(ValueKind::Attribute) | Want::Member, MarkKind::Attribute0) => Link::Attribute0(start),
            (Want::Value(ValueKind::Attribute) | Want::Member, MarkKind::Attribute1) => Link::Attribute1(start),
            (Want::Value(ValueKind::Attribute), MarkKind::Ambiguous) => Link::Ambiguous1(start),
            (Want::Value(ValueKind::Element) | Want::Member, MarkKind::Ambiguous) => Link::AmbiguousElement(start),
            (Want::Value(ValueKind::Text) | Want::Member, MarkKind::Text) => Link::Text(start),
            (Want::Value(ValueKind::Text) | Want::Member, MarkKind::Raw) => Link::Raw(start),
            _ => {
                return Err(CompileError::ValueMismatch {
                    kind: want.kind(),
                    found: kind.describe(),
                    offset: start,
                });
            }
        };
        Ok(link)
    }

    /// Pop the placeholder mark that must sit on top of the stack for the
    /// record at `start`.
    fn pop_mark(&mut self, start: usize) -> Result<MarkKind> {
        match self.stack.pop() {
            Some(Entry::Mark { kind, start: marked }) if marked == start && !matches!(kind, MarkKind::Fragment { .. }) => {
                Ok(kind)
            }
            other => Err(CompileError::AuxMismatch {
                expected: "placeholder",
                found: other.as_ref().map_or("nothing", Entry::describe),
                offset: start,
            }),
        }
    }

    /// For a structural record whose `INTERNAL` is at `offset - 1`, return
    /// the start of its span and the position of its `END`.
    fn span_of(&self, offset: usize) -> Result<(usize, usize)> {
        let cells = self.cells.as_slice();
        let corrupt = || CompileError::UnclaimableRecord {
            found: proto::cell_name(cells[offset - 1]),
            offset: offset - 1,
        };
        let (back, operand) = proto::decode_varint_back(cells, offset - 1).ok_or_else(corrupt)?;
        let end = operand.checked_sub(1).ok_or_else(corrupt)?;
        if self.cells.tag_at(end) != Some(Tag::End) {
            return Err(corrupt());
        }
        let span_start = end.checked_sub(back).ok_or_else(corrupt)?;
        Ok((span_start, end))
    }

    /// Walk forward from `span_start` over already claimed records until the
    /// record's own header.
    fn find_header(&self, span_start: usize, end: usize) -> Result<usize> {
        let cells = self.cells.as_slice();
        let mut pos = span_start;
        while pos < end {
            let tag = self.cells.tag_at(pos);
            match tag {
                Some(Tag::Element | Tag::Element3 | Tag::Flatten | Tag::Flatten3 | Tag::Fragment) => return Ok(pos),
                Some(skip @ (Tag::Length2 | Tag::Length3)) => {
                    let width = skip.header_width().unwrap_or(0);
                    let len = proto::decode_length(cells, pos + 1, width).unwrap_or(0);
                    pos += 1 + width + len;
                }
                Some(marked @ (Tag::Marked3 | Tag::Marked4 | Tag::Marked5)) => {
                    pos += marked.placeholder_size().unwrap_or(1);
                }
                _ => break,
            }
        }
        Err(CompileError::UnclaimableRecord {
            found: proto::cell_name(cells.get(pos).copied().unwrap_or(0)),
            offset: pos,
        })
    }

    /// Walk the finished top level. A flatten group nobody claimed is read
    /// as a run of sibling nodes, so it must not hold attributes.
    fn check_top_level(&self) -> Result<()> {
        let cells = self.cells.as_slice();
        let mut pos = 0;
        while pos < cells.len() {
            let tag = self.cells.tag_at(pos);
            let width = match tag {
                Some(Tag::Doctype) => {
                    pos += 1;
                    continue;
                }
                Some(tag @ (Tag::Flatten | Tag::Flatten3)) => {
                    if self.flatten_links(pos, tag)?.iter().any(|link| link.is_attribute()) {
                        return Err(CompileError::StrayAttributes { offset: pos });
                    }
                    tag.header_width()
                }
                Some(tag) => tag.header_width(),
                None => None,
            };
            let len = width.and_then(|width| proto::decode_length(cells, pos + 1, width).map(|len| 1 + width + len));
            let Some(size) = len else {
                return Err(CompileError::UnclaimableRecord {
                    found: proto::cell_name(cells[pos]),
                    offset: pos,
                });
            };
            pos += size;
        }
        Ok(())
    }

    /// The links of a closed flatten group, in document order.
    fn flatten_links(&self, header: usize, tag: Tag) -> Result<Vec<Link>> {
        let cells = self.cells.as_slice();
        let mut pos = header + 1 + tag.header_width().unwrap_or(2);
        let mut links = Vec::new();
        loop {
            let corrupt = CompileError::UnclaimableRecord {
                found: proto::cell_name(cells.get(pos).copied().unwrap_or(0)),
                offset: pos,
            };
            match self.cells.tag_at(pos) {
                Some(Tag::End) => return Ok(links),
                Some(inline @ (Tag::AttributeId | Tag::AttributeClass)) => {
                    let index = proto::decode_index(cells, pos + 1).ok_or(corrupt)? as u16;
                    links.push(if inline == Tag::AttributeId {
                        Link::Id(index)
                    } else {
                        Link::Class(index)
                    });
                    pos += 3;
                }
                Some(reference) if reference.is_reference() => {
                    let operand = pos + 1;
                    let (distance, next) = proto::decode_varint(cells, operand).ok_or(corrupt.clone())?;
                    let target = operand.checked_sub(distance).ok_or(corrupt.clone())?;
                    links.push(Link::from_reference(reference, target).ok_or(corrupt)?);
                    pos = next;
                }
                _ => return Err(corrupt),
            }
        }
    }

    /// Splice every top-level value of the closed fragment at `header`.
    fn splice_fragment(&mut self, header: usize, end: usize, links: &mut Vec<Link>) -> Result<()> {
        let members = match self.stack.pop() {
            Some(Entry::Mark {
                kind: MarkKind::Fragment { members },
                start,
            }) if start == header => members,
            other => {
                return Err(CompileError::AuxMismatch {
                    expected: "fragment",
                    found: other.as_ref().map_or("nothing", Entry::describe),
                    offset: header,
                });
            }
        };

        let before = self.stack.len();
        let floor = header + FRAGMENT_HEADER;
        let mut cursor = end;
        while cursor > floor {
            self.claim(Want::Member, &mut cursor, floor, links)?;
        }
        if before - self.stack.len() != members {
            return Err(CompileError::AuxMismatch {
                expected: "fragment member",
                found: self.stack.last().map_or("nothing", Entry::describe),
                offset: header,
            });
        }
        Ok(())
    }

    /// Write the final record for a closed element or flatten group, widening
    /// the header when the body outgrows two length cells.
    fn write_record(&mut self, kind: OpenKind, start: usize, span_start: usize, links: &[Link]) -> Result<()> {
        let (narrow, wide) = match kind {
            OpenKind::Element(_) => (Tag::Element, Tag::Element3),
            _ => (Tag::Flatten, Tag::Flatten3),
        };
        let ordered: Vec<Link> = links
            .iter()
            .filter(|link| link.is_attribute())
            .chain(links.iter().filter(|link| !link.is_attribute()))
            .copied()
            .collect();

        let mut width = 2;
        loop {
            self.cells.truncate(start);
            self.cells.push_tag(if width == 2 { narrow } else { wide });
            self.cells.push_length_slot(width);
            if let OpenKind::Element(name) = kind {
                self.cells.push_tag(Tag::StandardName);
                self.cells.push(name as u8);
            }
            for link in &ordered {
                self.write_link(*link);
            }
            let end = self.cells.len();
            self.cells.push_tag(Tag::End);
            self.cells.push_varint(end - span_start);
            self.cells.push_tag(Tag::Internal);

            let len = self.cells.len() - (start + 1 + width);
            let max = if width == 2 { MAX_LENGTH2 } else { MAX_LENGTH3 };
            if len <= max {
                self.cells.patch_length(start + 1, width, len);
                trace!(start, len, links = ordered.len(), "record closed");
                return Ok(());
            }
            if width == 3 {
                return Err(CompileError::RecordTooLarge {
                    offset: start,
                    len,
                    max: MAX_LENGTH3,
                });
            }
            width = 3;
        }
    }

    fn write_link(&mut self, link: Link) {
        let (tag, target) = match link {
            Link::Id(index) | Link::Class(index) => {
                self.cells.push_tag(if matches!(link, Link::Id(_)) {
                    Tag::AttributeId
                } else {
                    Tag::AttributeClass
                });
                self.cells.push_index(index);
                return;
            }
            Link::Attribute0(target) => (Tag::Attribute0, target),
            Link::Attribute1(target) => (Tag::Attribute1, target),
            Link::Ambiguous1(target) => (Tag::Ambiguous1, target),
            Link::Element(target) => (Tag::Element, target),
            Link::AmbiguousElement(target) => (Tag::AmbiguousElement, target),
            Link::Text(target) => (Tag::Text, target),
            Link::Raw(target) => (Tag::Raw, target),
        };
        self.cells.push_tag(tag);
        let operand = self.cells.len();
        self.cells.push_varint(operand - target);
    }
}
