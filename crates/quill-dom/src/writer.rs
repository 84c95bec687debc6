//! Markup serialization through the push decoder.

use std::fmt::{self, Write as _};

use quill_compiler::CompiledHtml;
use quill_names::{AttributeName, ElementName};
use thiserror::Error;

use crate::error::DecodeError;
use crate::player::{HtmlPlayer, Visitor};

/// Failure while rendering a stream to markup.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The stream is malformed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The output sink failed.
    #[error("failed to write markup")]
    Write(#[from] fmt::Error),
}

/// A [`Visitor`] that writes compact HTML.
///
/// No whitespace is added. Text and attribute values are escaped; raw text
/// is written as is. Void elements get no end tag. Multiple values of one
/// attribute are joined by a space.
#[derive(Debug)]
pub struct HtmlWriter<W> {
    out: W,
    values: usize,
}

impl<W: fmt::Write> HtmlWriter<W> {
    /// Write into `out`.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self { out, values: 0 }
    }

    /// Recover the sink.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn escaped(&mut self, value: &str, quote: bool) -> fmt::Result {
        let mut rest = value;
        while let Some(index) = rest.find(|c| matches!(c, '&' | '<' | '>') || (quote && c == '"')) {
            self.out.write_str(&rest[..index])?;
            self.out.write_str(match rest.as_bytes()[index] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                _ => "&quot;",
            })?;
            rest = &rest[index + 1..];
        }
        self.out.write_str(rest)
    }
}

impl<W: fmt::Write> Visitor for HtmlWriter<W> {
    type Error = RenderError;

    fn doctype(&mut self) -> Result<(), RenderError> {
        Ok(self.out.write_str("<!DOCTYPE html>")?)
    }

    fn start_tag(&mut self, name: ElementName) -> Result<(), RenderError> {
        Ok(write!(self.out, "<{name}")?)
    }

    fn attribute_start(&mut self, name: AttributeName) -> Result<(), RenderError> {
        self.values = 0;
        Ok(write!(self.out, " {name}")?)
    }

    fn attribute_value(&mut self, value: &str) -> Result<(), RenderError> {
        self.out.write_str(if self.values == 0 { "=\"" } else { " " })?;
        self.values += 1;
        Ok(self.escaped(value, true)?)
    }

    fn attribute_end(&mut self) -> Result<(), RenderError> {
        if self.values > 0 {
            self.out.write_char('"')?;
        }
        Ok(())
    }

    fn start_tag_end(&mut self, _name: ElementName) -> Result<(), RenderError> {
        Ok(self.out.write_char('>')?)
    }

    fn text(&mut self, value: &str) -> Result<(), RenderError> {
        Ok(self.escaped(value, false)?)
    }

    fn raw(&mut self, value: &str) -> Result<(), RenderError> {
        Ok(self.out.write_str(value)?)
    }

    fn end_tag(&mut self, name: ElementName) -> Result<(), RenderError> {
        if !name.is_void() {
            write!(self.out, "</{name}>")?;
        }
        Ok(())
    }
}

/// Render a compiled stream to a markup string.
///
/// # Errors
///
/// [`RenderError::Decode`] if the stream is malformed.
pub fn render(html: &CompiledHtml) -> Result<String, RenderError> {
    let mut writer = HtmlWriter::new(String::with_capacity(html.len() * 2));
    HtmlPlayer::new(html).play(&mut writer)?;
    Ok(writer.into_inner())
}
