//! Closed name catalogs for the Quill template compiler.
//!
//! Every element and attribute name that can appear in a compiled template is
//! an enumerant of a closed catalog. The compiler never stores names as
//! strings: it stores the enumerant's ordinal in a single cell, so every
//! catalog here is `#[repr(u8)]` and must stay below 256 entries.
//!
//! # Scope
//!
//! - [`ElementName`]: HTML and inline SVG element names
//! - [`AttributeName`]: HTML and SVG attribute names
//! - [`Ambiguous`]: names that are both an attribute and an element
//!   (`title`, `form`, `label`, `clip-path`/`clipPath`)
//!
//! # Not Yet Implemented
//!
//! - The full WHATWG element/attribute index (this is a representative subset)
//! - Custom elements and `data-*` attributes

use strum_macros::{Display, EnumCount, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// An element name.
///
/// The ordinal (`name as u8`) is what the compiler writes after a
/// `STANDARD_NAME` tag; [`ElementName::from_repr`] reverses it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    FromRepr,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum ElementName {
    /// `<a>`
    A,
    /// `<abbr>`
    Abbr,
    /// `<address>`
    Address,
    /// `<area>` (void)
    Area,
    /// `<article>`
    Article,
    /// `<aside>`
    Aside,
    /// `<b>`
    B,
    /// `<base>` (void)
    Base,
    /// `<blockquote>`
    Blockquote,
    /// `<body>`
    Body,
    /// `<br>` (void)
    Br,
    /// `<button>`
    Button,
    /// `<caption>`
    Caption,
    /// SVG `<clipPath>`
    #[strum(to_string = "clipPath")]
    ClipPath,
    /// `<code>`
    Code,
    /// `<col>` (void)
    Col,
    /// `<dd>`
    Dd,
    /// SVG `<defs>`
    Defs,
    /// `<details>`
    Details,
    /// `<div>`
    Div,
    /// `<dl>`
    Dl,
    /// `<dt>`
    Dt,
    /// `<em>`
    Em,
    /// `<embed>` (void)
    Embed,
    /// `<fieldset>`
    Fieldset,
    /// `<figure>`
    Figure,
    /// `<footer>`
    Footer,
    /// `<form>`
    Form,
    /// SVG `<g>`
    G,
    /// `<h1>`
    H1,
    /// `<h2>`
    H2,
    /// `<h3>`
    H3,
    /// `<h4>`
    H4,
    /// `<h5>`
    H5,
    /// `<h6>`
    H6,
    /// `<head>`
    Head,
    /// `<header>`
    Header,
    /// `<hr>` (void)
    Hr,
    /// `<html>`
    Html,
    /// `<i>`
    I,
    /// `<img>` (void)
    Img,
    /// `<input>` (void)
    Input,
    /// `<label>`
    Label,
    /// `<legend>`
    Legend,
    /// `<li>`
    Li,
    /// `<link>` (void)
    Link,
    /// `<main>`
    Main,
    /// `<meta>` (void)
    Meta,
    /// `<nav>`
    Nav,
    /// `<ol>`
    Ol,
    /// `<optgroup>`
    Optgroup,
    /// `<p>`
    P,
    /// SVG `<path>`
    Path,
    /// `<pre>`
    Pre,
    /// `<script>`
    Script,
    /// `<section>`
    Section,
    /// `<select>`
    Select,
    /// `<small>`
    Small,
    /// `<source>` (void)
    Source,
    /// `<span>`
    Span,
    /// `<strong>`
    Strong,
    /// `<style>`
    Style,
    /// `<sub>`
    Sub,
    /// `<summary>`
    Summary,
    /// `<sup>`
    Sup,
    /// `<svg>`
    Svg,
    /// `<table>`
    Table,
    /// `<tbody>`
    Tbody,
    /// `<td>`
    Td,
    /// `<template>`
    Template,
    /// `<textarea>`
    Textarea,
    /// `<tfoot>`
    Tfoot,
    /// `<th>`
    Th,
    /// `<thead>`
    Thead,
    /// `<title>`
    Title,
    /// `<tr>`
    Tr,
    /// `<track>` (void)
    Track,
    /// `<u>`
    U,
    /// `<ul>`
    Ul,
    /// `<wbr>` (void)
    Wbr,
}

impl ElementName {
    /// Whether the element is a void element: it has a start tag only and
    /// never any children.
    ///
    /// [§ 13.1.2 Elements](https://html.spec.whatwg.org/multipage/syntax.html#void-elements)
    #[must_use]
    pub const fn is_void(self) -> bool {
        matches!(
            self,
            Self::Area
                | Self::Base
                | Self::Br
                | Self::Col
                | Self::Embed
                | Self::Hr
                | Self::Img
                | Self::Input
                | Self::Link
                | Self::Meta
                | Self::Source
                | Self::Track
                | Self::Wbr
        )
    }
}

/// An attribute name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    FromRepr,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum AttributeName {
    /// `accept`
    Accept,
    /// `accept-charset`
    AcceptCharset,
    /// `action`
    Action,
    /// `alt`
    Alt,
    /// `aria-hidden`
    AriaHidden,
    /// `aria-label`
    AriaLabel,
    /// `async`
    Async,
    /// `autocomplete`
    Autocomplete,
    /// `autofocus`
    Autofocus,
    /// `charset`
    Charset,
    /// `checked`
    Checked,
    /// `class`
    Class,
    /// SVG `clip-path`
    ClipPath,
    /// `cols`
    Cols,
    /// `colspan`
    Colspan,
    /// `content`
    Content,
    /// SVG `d`
    D,
    /// `defer`
    Defer,
    /// `dir`
    Dir,
    /// `disabled`
    Disabled,
    /// `download`
    Download,
    /// `enctype`
    Enctype,
    /// SVG `fill`
    Fill,
    /// `for`
    For,
    /// `form`
    Form,
    /// `height`
    Height,
    /// `hidden`
    Hidden,
    /// `href`
    Href,
    /// `http-equiv`
    HttpEquiv,
    /// `id`
    Id,
    /// `label`
    Label,
    /// `lang`
    Lang,
    /// `list`
    List,
    /// `max`
    Max,
    /// `maxlength`
    Maxlength,
    /// `method`
    Method,
    /// `min`
    Min,
    /// `multiple`
    Multiple,
    /// `name`
    Name,
    /// `novalidate`
    Novalidate,
    /// `placeholder`
    Placeholder,
    /// `readonly`
    Readonly,
    /// `rel`
    Rel,
    /// `required`
    Required,
    /// `role`
    Role,
    /// `rows`
    Rows,
    /// `rowspan`
    Rowspan,
    /// `selected`
    Selected,
    /// `size`
    Size,
    /// `src`
    Src,
    /// `step`
    Step,
    /// `style`
    Style,
    /// `tabindex`
    Tabindex,
    /// `target`
    Target,
    /// `title`
    Title,
    /// `type`
    Type,
    /// `value`
    Value,
    /// SVG `viewBox`
    #[strum(to_string = "viewBox")]
    ViewBox,
    /// `width`
    Width,
    /// `xmlns`
    Xmlns,
}

/// A name that is both an attribute and an element.
///
/// `title("x")` is the `title` attribute when it is claimed as an attribute
/// value and a `<title>x</title>` element when it is claimed as a child node.
/// The catalog only records the pairing; which side wins is decided by the
/// compiler from how the value is claimed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    FromRepr,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum Ambiguous {
    /// `clip-path` attribute / `<clipPath>` element
    ClipPath,
    /// `form` attribute / `<form>` element
    Form,
    /// `label` attribute / `<label>` element
    Label,
    /// `title` attribute / `<title>` element
    Title,
}

impl Ambiguous {
    /// The attribute interpretation.
    #[must_use]
    pub const fn attribute_name(self) -> AttributeName {
        match self {
            Self::ClipPath => AttributeName::ClipPath,
            Self::Form => AttributeName::Form,
            Self::Label => AttributeName::Label,
            Self::Title => AttributeName::Title,
        }
    }

    /// The element interpretation.
    #[must_use]
    pub const fn element_name(self) -> ElementName {
        match self {
            Self::ClipPath => ElementName::ClipPath,
            Self::Form => ElementName::Form,
            Self::Label => ElementName::Label,
            Self::Title => ElementName::Title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn test_catalogs_fit_in_a_cell() {
        assert!(ElementName::COUNT <= 256);
        assert!(AttributeName::COUNT <= 256);
        assert!(Ambiguous::COUNT <= 256);
    }

    #[test]
    fn test_ordinal_round_trip() {
        for name in ElementName::iter() {
            assert_eq!(ElementName::from_repr(name as u8), Some(name));
        }
        for name in AttributeName::iter() {
            assert_eq!(AttributeName::from_repr(name as u8), Some(name));
        }
    }

    #[test]
    fn test_display_uses_markup_spelling() {
        assert_eq!(ElementName::Html.to_string(), "html");
        assert_eq!(ElementName::H1.to_string(), "h1");
        assert_eq!(ElementName::ClipPath.to_string(), "clipPath");
        assert_eq!(AttributeName::AcceptCharset.to_string(), "accept-charset");
        assert_eq!(AttributeName::HttpEquiv.to_string(), "http-equiv");
        assert_eq!(AttributeName::ViewBox.to_string(), "viewBox");
        assert_eq!(AttributeName::Tabindex.to_string(), "tabindex");
    }

    #[test]
    fn test_parse_from_markup_spelling() {
        assert_eq!(ElementName::from_str("div"), Ok(ElementName::Div));
        assert_eq!(AttributeName::from_str("clip-path"), Ok(AttributeName::ClipPath));
        assert_eq!(Ambiguous::from_str("title"), Ok(Ambiguous::Title));
        assert!(ElementName::from_str("blink").is_err());
    }

    #[test]
    fn test_void_elements() {
        assert!(ElementName::Br.is_void());
        assert!(ElementName::Input.is_void());
        assert!(!ElementName::Div.is_void());
        assert!(!ElementName::Script.is_void());
    }

    #[test]
    fn test_ambiguous_pairs_share_spelling() {
        for name in Ambiguous::iter() {
            let attribute = name.attribute_name().to_string();
            let element = name.element_name().to_string();
            assert_eq!(attribute.replace('-', "").to_lowercase(), element.to_lowercase());
        }
    }
}
