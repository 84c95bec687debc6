//! Human-readable disassembly of a token stream.

use std::fmt;

use crate::compiled::CompiledHtml;
use crate::proto::{self, Tag};

/// Disassembles a [`CompiledHtml`] one token per line, indenting record
/// bodies. Obtained from [`CompiledHtml::tokens`].
///
/// ```text
///     0 MARKED5 ordinal=31 value=#0 "pt-BR"
///     5 ELEMENT len=7
///     8   STANDARD_NAME html
///    10   ATTRIBUTE1 -> 0
///    12   END <- 0
///    14   INTERNAL
/// ```
///
/// Malformed cells are printed as `??` and skipped one at a time, so a dump
/// never fails on a corrupt stream.
#[derive(Debug, Clone, Copy)]
pub struct TokenDump<'a> {
    html: &'a CompiledHtml,
}

impl<'a> TokenDump<'a> {
    pub(crate) const fn new(html: &'a CompiledHtml) -> Self {
        Self { html }
    }

    fn cells(&self) -> &'a [u8] {
        self.html.cells()
    }

    fn line(f: &mut fmt::Formatter<'_>, pos: usize, depth: usize) -> fmt::Result {
        write!(f, "{pos:>5} {:indent$}", "", indent = depth * 2)
    }

    fn value(&self, pos: usize) -> (usize, &'a str) {
        let index = proto::decode_index(self.cells(), pos).unwrap_or(usize::MAX);
        (index, self.html.value(index).unwrap_or("<missing>"))
    }

    /// Print the record at `pos` and return where the next one starts.
    fn record(&self, f: &mut fmt::Formatter<'_>, pos: usize, depth: usize) -> Result<usize, fmt::Error> {
        let cells = self.cells();
        let cell = cells[pos];
        Self::line(f, pos, depth)?;
        let Some(tag) = Tag::from_cell(cell) else {
            writeln!(f, "?? {cell:#04x}")?;
            return Ok(pos + 1);
        };
        match tag {
            Tag::Marked3 => {
                let ordinal = cells.get(pos + 1).copied().unwrap_or(0);
                writeln!(f, "{tag} ordinal={ordinal}")?;
                Ok(pos + 3)
            }
            Tag::Marked4 => {
                let (index, value) = self.value(pos + 1);
                writeln!(f, "{tag} value=#{index} {value:?}")?;
                Ok(pos + 4)
            }
            Tag::Marked5 => {
                let ordinal = cells.get(pos + 1).copied().unwrap_or(0);
                let (index, value) = self.value(pos + 2);
                writeln!(f, "{tag} ordinal={ordinal} value=#{index} {value:?}")?;
                Ok(pos + 5)
            }
            _ => match tag.header_width() {
                Some(width) => self.structural(f, tag, pos, width, depth),
                None => {
                    writeln!(f, "{tag} ??")?;
                    Ok(pos + 1)
                }
            },
        }
    }

    fn structural(
        &self,
        f: &mut fmt::Formatter<'_>,
        tag: Tag,
        pos: usize,
        width: usize,
        depth: usize,
    ) -> Result<usize, fmt::Error> {
        let cells = self.cells();
        let Some(len) = proto::decode_length(cells, pos + 1, width) else {
            writeln!(f, "{tag} <truncated>")?;
            return Ok(cells.len());
        };
        writeln!(f, "{tag} len={len}")?;

        let body = pos + 1 + width;
        let first = cells.get(body).copied().and_then(Tag::from_cell);
        let holds_records = tag == Tag::Fragment
            || matches!(
                first,
                Some(Tag::Marked3 | Tag::Marked4 | Tag::Marked5 | Tag::Length2 | Tag::Length3)
            );

        let mut cursor = body;
        while cursor < cells.len() {
            let Some(inner) = Tag::from_cell(cells[cursor]) else {
                cursor = self.record(f, cursor, depth + 1)?;
                continue;
            };
            if inner == Tag::End {
                break;
            }
            if holds_records {
                cursor = self.record(f, cursor, depth + 1)?;
            } else {
                cursor = self.entry(f, inner, cursor, depth + 1)?;
            }
        }

        if cursor >= cells.len() {
            return Ok(cursor);
        }
        Self::line(f, cursor, depth + 1)?;
        match proto::decode_varint(cells, cursor + 1) {
            Some((back, next)) => {
                writeln!(f, "END <- {}", cursor.saturating_sub(back))?;
                if cells.get(next) == Some(&Tag::Internal.cell()) {
                    Self::line(f, next, depth + 1)?;
                    writeln!(f, "{}", Tag::Internal)?;
                    Ok(next + 1)
                } else {
                    Ok(next)
                }
            }
            None => {
                writeln!(f, "END <truncated>")?;
                Ok(cells.len())
            }
        }
    }

    /// Print one element or flatten body entry.
    fn entry(&self, f: &mut fmt::Formatter<'_>, tag: Tag, pos: usize, depth: usize) -> Result<usize, fmt::Error> {
        let cells = self.cells();
        Self::line(f, pos, depth)?;
        match tag {
            Tag::StandardName => {
                let ordinal = cells.get(pos + 1).copied().unwrap_or(0);
                match quill_names::ElementName::from_repr(ordinal) {
                    Some(name) => writeln!(f, "{tag} {name}")?,
                    None => writeln!(f, "{tag} ordinal={ordinal}")?,
                }
                Ok(pos + 2)
            }
            Tag::AttributeId | Tag::AttributeClass => {
                let (index, value) = self.value(pos + 1);
                writeln!(f, "{tag} value=#{index} {value:?}")?;
                Ok(pos + 3)
            }
            _ if tag.is_reference() => match proto::decode_varint(cells, pos + 1) {
                Some((distance, next)) => {
                    writeln!(f, "{tag} -> {}", (pos + 1).saturating_sub(distance))?;
                    Ok(next)
                }
                None => {
                    writeln!(f, "{tag} <truncated>")?;
                    Ok(cells.len())
                }
            },
            _ => {
                writeln!(f, "{tag} ??")?;
                Ok(pos + 1)
            }
        }
    }
}

impl fmt::Display for TokenDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pos = 0;
        while pos < self.cells().len() {
            pos = self.record(f, pos, 0)?;
        }
        Ok(())
    }
}
