//! Tests for the encoder: exact token layouts, claim resolution and the
//! failure modes of a compilation session.

use quill_compiler::proto::{self, Tag};
use quill_compiler::{CompileError, CompiledHtml, Encoder, ValueKind};
use quill_names::{Ambiguous, AttributeName, ElementName};

const AMBIGUOUS_ELEMENT: u8 = Tag::AmbiguousElement.cell();
const AMBIGUOUS1: u8 = Tag::Ambiguous1.cell();
const ATTRIBUTE0: u8 = Tag::Attribute0.cell();
const ATTRIBUTE1: u8 = Tag::Attribute1.cell();
const ATTRIBUTE_ID: u8 = Tag::AttributeId.cell();
const DOCTYPE: u8 = Tag::Doctype.cell();
const ELEMENT: u8 = Tag::Element.cell();
const END: u8 = Tag::End.cell();
const INTERNAL: u8 = Tag::Internal.cell();
const INTERNAL3: u8 = Tag::Internal3.cell();
const INTERNAL4: u8 = Tag::Internal4.cell();
const INTERNAL5: u8 = Tag::Internal5.cell();
const LENGTH2: u8 = Tag::Length2.cell();
const LENGTH3: u8 = Tag::Length3.cell();
const MARKED3: u8 = Tag::Marked3.cell();
const MARKED4: u8 = Tag::Marked4.cell();
const MARKED5: u8 = Tag::Marked5.cell();
const SN: u8 = Tag::StandardName.cell();
const TEXT: u8 = Tag::Text.cell();

const BODY: u8 = ElementName::Body as u8;
const EM: u8 = ElementName::Em as u8;
const FORM: u8 = ElementName::Form as u8;
const HEAD: u8 = ElementName::Head as u8;
const HTML: u8 = ElementName::Html as u8;
const INPUT: u8 = ElementName::Input as u8;
const LABEL: u8 = ElementName::Label as u8;
const P: u8 = ElementName::P as u8;

/// Helper to run a whole compilation on a fresh encoder.
fn compile<F>(build: F) -> CompiledHtml
where
    F: FnOnce(&mut Encoder) -> Result<(), CompileError>,
{
    Encoder::new().compile(build).unwrap()
}

/// Helper for compilations expected to fail.
fn compile_err<F>(build: F) -> CompileError
where
    F: FnOnce(&mut Encoder) -> Result<(), CompileError>,
{
    Encoder::new().compile(build).unwrap_err()
}

fn empty(e: &mut Encoder, name: ElementName) -> Result<(), CompileError> {
    e.element_begin(name)?;
    e.element_end()
}

// ========== layouts ==========

#[test]
fn test_childless_element() {
    let html = compile(|e| empty(e, ElementName::Html));
    assert_eq!(html.cells(), &[ELEMENT, 5, 0, SN, HTML, END, 5, INTERNAL]);
    assert!(html.pool().is_empty());
}

#[test]
fn test_single_attribute() {
    let html = compile(|e| {
        e.attribute(AttributeName::Lang, "pt-BR")?;
        e.element_begin(ElementName::Html)?;
        e.element_value(ValueKind::Attribute)?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            MARKED5,
            AttributeName::Lang as u8,
            0,
            0,
            INTERNAL5,
            ELEMENT,
            7,
            0,
            SN,
            HTML,
            ATTRIBUTE1,
            11,
            END,
            12,
            INTERNAL,
        ]
    );
    assert_eq!(html.pool(), &["pt-BR".to_string()]);
}

#[test]
fn test_two_attributes_keep_argument_order() {
    let html = compile(|e| {
        e.attribute(AttributeName::Class, "a")?;
        e.attribute(AttributeName::Lang, "b")?;
        e.element_begin(ElementName::Html)?;
        e.element_value(ValueKind::Attribute)?;
        e.element_value(ValueKind::Attribute)?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            MARKED5,
            AttributeName::Class as u8,
            0,
            0,
            INTERNAL5,
            MARKED5,
            AttributeName::Lang as u8,
            1,
            0,
            INTERNAL5,
            ELEMENT,
            9,
            0,
            SN,
            HTML,
            ATTRIBUTE1,
            16,
            ATTRIBUTE1,
            13,
            END,
            19,
            INTERNAL,
        ]
    );
}

#[test]
fn test_flag_attribute() {
    let html = compile(|e| {
        e.attribute_flag(AttributeName::Required)?;
        e.element_begin(ElementName::Input)?;
        e.element_value(ValueKind::Attribute)?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            MARKED3,
            AttributeName::Required as u8,
            INTERNAL3,
            ELEMENT,
            7,
            0,
            SN,
            INPUT,
            ATTRIBUTE0,
            9,
            END,
            10,
            INTERNAL,
        ]
    );
}

#[test]
fn test_child_element_is_claimed() {
    let html = compile(|e| {
        empty(e, ElementName::Head)?;
        e.element_begin(ElementName::Html)?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            LENGTH2, 5, 0, SN, HEAD, END, 5, INTERNAL, //
            ELEMENT, 7, 0, SN, HTML, ELEMENT, 14, END, 15, INTERNAL,
        ]
    );
}

#[test]
fn test_doctype_precedes_root() {
    let html = compile(|e| {
        e.doctype()?;
        empty(e, ElementName::Html)
    });
    assert_eq!(html.cells(), &[DOCTYPE, ELEMENT, 5, 0, SN, HTML, END, 5, INTERNAL]);
}

#[test]
fn test_text_child() {
    let html = compile(|e| e.element_text(ElementName::P, "hello"));
    assert_eq!(
        html.cells(),
        &[MARKED4, 0, 0, INTERNAL4, ELEMENT, 7, 0, SN, P, TEXT, 10, END, 11, INTERNAL]
    );
    assert_eq!(html.value(0), Some("hello"));
}

#[test]
fn test_external_id_precedes_child_nodes() {
    let html = compile(|e| {
        e.element_begin(ElementName::Body)?;
        e.element_id("inner")?;
        e.element_end()?;
        e.element_begin(ElementName::Html)?;
        e.element_value(ValueKind::Element)?;
        e.element_id("outer")?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            LENGTH2, 8, 0, SN, BODY, ATTRIBUTE_ID, 0, 0, END, 8, INTERNAL, //
            ELEMENT, 10, 0, SN, HTML, ATTRIBUTE_ID, 1, 0, ELEMENT, 20, END, 21, INTERNAL,
        ]
    );
}

#[test]
fn test_flatten_splices_into_parent() {
    let html = compile(|e| {
        empty(e, ElementName::Label)?;
        empty(e, ElementName::Input)?;
        e.flatten_begin()?;
        e.element_value(ValueKind::Element)?;
        e.element_value(ValueKind::Element)?;
        e.element_end()?;
        e.element_begin(ElementName::Form)?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            LENGTH2, 5, 0, SN, LABEL, END, 5, INTERNAL, //
            LENGTH2, 5, 0, SN, INPUT, END, 5, INTERNAL, //
            LENGTH2, 7, 0, ELEMENT, 20, ELEMENT, 14, END, 23, INTERNAL, //
            ELEMENT, 9, 0, SN, FORM, ELEMENT, 32, ELEMENT, 26, END, 35, INTERNAL,
        ]
    );
}

#[test]
fn test_ambiguous_taken_as_element() {
    let html = compile(|e| {
        e.ambiguous(Ambiguous::Title, "Home")?;
        e.element_begin(ElementName::Head)?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            MARKED5,
            Ambiguous::Title as u8,
            0,
            0,
            INTERNAL5,
            ELEMENT,
            7,
            0,
            SN,
            HEAD,
            AMBIGUOUS_ELEMENT,
            11,
            END,
            12,
            INTERNAL,
        ]
    );
}

#[test]
fn test_ambiguous_taken_as_attribute() {
    let html = compile(|e| {
        e.ambiguous(Ambiguous::Title, "Home")?;
        e.element_begin(ElementName::A)?;
        e.element_value(ValueKind::Attribute)?;
        e.element_end()
    });

    assert_eq!(html.cells()[10], AMBIGUOUS1);
    assert_eq!(html.cells()[5], ELEMENT);
}

#[test]
fn test_fragment_members_are_spliced() {
    let html = compile(|e| {
        e.fragment(|e| {
            e.text("a")?;
            e.element_text(ElementName::Em, "b")
        })?;
        e.element_begin(ElementName::P)?;
        e.element_value(ValueKind::Fragment)?;
        e.element_end()
    });

    assert_eq!(
        html.cells(),
        &[
            LENGTH3, 21, 0, 0, //
            MARKED4, 0, 0, INTERNAL4, //
            MARKED4, 1, 0, INTERNAL4, //
            LENGTH2, 7, 0, SN, EM, TEXT, 10, END, 11, INTERNAL, //
            END, 22, INTERNAL, //
            ELEMENT, 9, 0, SN, P, TEXT, 27, ELEMENT, 21, END, 34, INTERNAL,
        ]
    );
}

#[test]
fn test_fragment_ambiguous_member_is_an_element() {
    let html = compile(|e| {
        e.fragment(|e| e.ambiguous(Ambiguous::Title, "t"))?;
        e.element_begin(ElementName::Head)?;
        e.element_value(ValueKind::Fragment)?;
        e.element_end()
    });

    // fragment header (4) + placeholder (5) + END/INTERNAL (3), then HEAD
    assert_eq!(html.cells()[12], ELEMENT);
    assert_eq!(html.cells()[17], AMBIGUOUS_ELEMENT);
}

#[test]
fn test_nested_fragment() {
    let html = compile(|e| {
        e.fragment(|e| {
            e.text("a")?;
            e.fragment(|e| e.text("b"))?;
            e.text("c")
        })?;
        e.element_begin(ElementName::P)?;
        e.element_value(ValueKind::Fragment)?;
        e.element_end()
    });

    let cells = html.cells();
    let body = cells.len() - 14;
    assert_eq!(&cells[body..body + 5], &[ELEMENT, 11, 0, SN, P]);
    let texts: Vec<usize> = [body + 6, body + 8, body + 10]
        .iter()
        .map(|&operand| operand - proto::decode_varint(cells, operand).unwrap().0)
        .collect();
    let values: Vec<&str> = texts
        .iter()
        .map(|&target| html.value(proto::decode_index(cells, target + 1).unwrap()).unwrap())
        .collect();
    assert_eq!(values, ["a", "b", "c"]);
}

#[test]
fn test_wide_header() {
    const CHILDREN: usize = 20_000;
    let html = compile(|e| {
        for index in 0..CHILDREN {
            e.text(index.to_string())?;
        }
        e.element_begin(ElementName::Div)?;
        for _ in 0..CHILDREN {
            e.element_value(ValueKind::Text)?;
        }
        e.element_end()
    });

    let cells = html.cells();
    let start = CHILDREN * 4;
    assert_eq!(cells[start], Tag::Element3.cell());
    let len = proto::decode_length(cells, start + 1, 3).unwrap();
    assert!(len > proto::MAX_LENGTH2);
    assert_eq!(start + 4 + len, cells.len());
    assert_eq!(cells[start + 4], SN);
}

#[test]
fn test_claimed_wide_header_becomes_length3() {
    const CHILDREN: usize = 20_000;
    let html = compile(|e| {
        for _ in 0..CHILDREN {
            e.text("x")?;
        }
        e.element_begin(ElementName::Div)?;
        for _ in 0..CHILDREN {
            e.element_value(ValueKind::Text)?;
        }
        e.element_end()?;
        e.element_begin(ElementName::Body)?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });

    assert_eq!(html.cells()[CHILDREN * 4], LENGTH3);
}

#[test]
fn test_element_text_matches_manual_calls() {
    let short = compile(|e| e.element_text(ElementName::P, "x"));
    let manual = compile(|e| {
        e.text("x")?;
        e.element_begin(ElementName::P)?;
        e.element_value(ValueKind::Text)?;
        e.element_end()
    });
    assert_eq!(short, manual);
}

#[test]
fn test_top_level_flatten_is_allowed() {
    let html = compile(|e| {
        empty(e, ElementName::P)?;
        e.flatten_begin()?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });
    assert_eq!(html.cells()[8], Tag::Flatten.cell());
}

// ========== sessions ==========

#[test]
fn test_sessions_are_isolated() {
    let mut encoder = Encoder::new();
    let first = encoder
        .compile(|e| {
            e.attribute(AttributeName::Lang, "en")?;
            e.element_begin(ElementName::Html)?;
            e.element_value(ValueKind::Attribute)?;
            e.element_end()
        })
        .unwrap();
    let second = encoder.compile(|e| e.element_text(ElementName::P, "x")).unwrap();

    assert_eq!(second, compile(|e| e.element_text(ElementName::P, "x")));
    assert_eq!(second.pool(), &["x".to_string()]);
    assert_eq!(first.pool(), &["en".to_string()]);
}

#[test]
fn test_begin_twice() {
    let mut encoder = Encoder::new();
    encoder.compilation_begin().unwrap();
    assert_eq!(encoder.compilation_begin(), Err(CompileError::AlreadyCompiling));
    assert!(encoder.is_compiling());
}

#[test]
fn test_calls_outside_a_session() {
    let mut encoder = Encoder::new();
    assert_eq!(encoder.text("x"), Err(CompileError::NotCompiling));
    assert_eq!(encoder.compilation_end(), Err(CompileError::NotCompiling));
}

#[test]
fn test_error_aborts_session_until_next_begin() {
    let mut encoder = Encoder::new();
    encoder.compilation_begin().unwrap();
    assert_eq!(
        encoder.element_value(ValueKind::Text),
        Err(CompileError::NoOpenRecord {
            construct: "element value"
        })
    );
    assert_eq!(encoder.text("x"), Err(CompileError::Aborted));
    assert_eq!(encoder.compilation_end(), Err(CompileError::Aborted));

    encoder.compilation_begin().unwrap();
    encoder.element_text(ElementName::P, "x").unwrap();
    assert!(encoder.compilation_end().is_ok());
}

// ========== structural errors ==========

#[test]
fn test_unclaimed_text() {
    let error = compile_err(|e| e.text("orphan"));
    assert_eq!(
        error,
        CompileError::UnbalancedStack {
            entry: "text",
            offset: 0
        }
    );
}

#[test]
fn test_unclosed_element() {
    let error = compile_err(|e| e.element_begin(ElementName::Div));
    assert_eq!(
        error,
        CompileError::UnbalancedStack {
            entry: "open element",
            offset: 0
        }
    );
}

#[test]
fn test_nothing_to_claim() {
    let error = compile_err(|e| {
        e.element_begin(ElementName::Div)?;
        e.element_value(ValueKind::Text)?;
        e.element_end()
    });
    assert_eq!(
        error,
        CompileError::NothingToClaim {
            kind: ValueKind::Text,
            offset: 0
        }
    );
}

#[test]
fn test_value_kind_mismatch() {
    let error = compile_err(|e| {
        e.text("x")?;
        e.element_begin(ElementName::Div)?;
        e.element_value(ValueKind::Attribute)?;
        e.element_end()
    });
    assert_eq!(
        error,
        CompileError::ValueMismatch {
            kind: ValueKind::Attribute,
            found: "text",
            offset: 0
        }
    );
}

#[test]
fn test_element_claimed_as_text() {
    let error = compile_err(|e| {
        empty(e, ElementName::Br)?;
        e.element_begin(ElementName::P)?;
        e.element_value(ValueKind::Text)?;
        e.element_end()
    });
    assert_eq!(
        error,
        CompileError::ValueMismatch {
            kind: ValueKind::Text,
            found: "ELEMENT",
            offset: 0
        }
    );
}

#[test]
fn test_doctype_cannot_be_claimed() {
    let error = compile_err(|e| {
        e.doctype()?;
        e.element_begin(ElementName::Html)?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });
    assert_eq!(
        error,
        CompileError::UnclaimableRecord {
            found: "DOCTYPE",
            offset: 0
        }
    );
}

#[test]
fn test_content_inside_open_element() {
    let error = compile_err(|e| {
        e.element_begin(ElementName::Div)?;
        e.text("x")
    });
    assert_eq!(
        error,
        CompileError::OpenRecord {
            construct: "text",
            open: "element",
            offset: 0
        }
    );
}

#[test]
fn test_claims_do_not_cross_fragment_start() {
    let error = compile_err(|e| {
        e.text("outside")?;
        e.fragment(|e| {
            e.element_begin(ElementName::P)?;
            e.element_value(ValueKind::Text)?;
            e.element_end()
        })
    });
    assert_eq!(
        error,
        CompileError::NothingToClaim {
            kind: ValueKind::Text,
            offset: 8
        }
    );
}

#[test]
fn test_fragment_end_with_wrong_index() {
    let error = compile_err(|e| {
        let index = e.fragment_begin()?;
        e.fragment_end(index + 1)
    });
    assert_eq!(
        error,
        CompileError::FragmentMismatch {
            expected: Some(0),
            found: 1
        }
    );
}

#[test]
fn test_fragment_end_without_fragment() {
    let error = compile_err(|e| e.fragment_end(0));
    assert_eq!(
        error,
        CompileError::FragmentMismatch {
            expected: None,
            found: 0
        }
    );
}

#[test]
fn test_pool_overflow() {
    let error = compile_err(|e| {
        for _ in 0..=u16::MAX as usize + 1 {
            e.text("x")?;
        }
        Ok(())
    });
    assert_eq!(error, CompileError::PoolOverflow { limit: 65_536 });
}

#[test]
fn test_unclaimed_flatten_with_attribute() {
    let error = compile_err(|e| {
        e.attribute(AttributeName::Lang, "en")?;
        empty(e, ElementName::P)?;
        e.flatten_begin()?;
        e.element_value(ValueKind::Attribute)?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });
    // Five placeholder cells and eight for the empty <p>.
    assert_eq!(error, CompileError::StrayAttributes { offset: 13 });
}

#[test]
fn test_unclaimed_flatten_with_inline_id() {
    let error = compile_err(|e| {
        e.flatten_begin()?;
        e.element_id("x")?;
        e.element_end()
    });
    assert_eq!(error, CompileError::StrayAttributes { offset: 0 });
}

#[test]
fn test_unclaimed_flatten_inherits_nested_attributes() {
    let error = compile_err(|e| {
        e.flatten_begin()?;
        e.element_class("inner")?;
        e.element_end()?;
        e.flatten_begin()?;
        e.element_value(ValueKind::Element)?;
        e.element_end()
    });
    assert!(matches!(error, CompileError::StrayAttributes { .. }));
}

#[test]
fn test_claimed_flatten_with_attributes_compiles() {
    let mut encoder = Encoder::new();
    let html = encoder
        .compile(|e| {
            e.attribute(AttributeName::Lang, "en")?;
            e.flatten_begin()?;
            e.element_value(ValueKind::Attribute)?;
            e.element_id("x")?;
            e.element_end()?;
            e.element_begin(ElementName::P)?;
            e.element_value(ValueKind::Element)?;
            e.element_end()
        })
        .unwrap();
    assert!(!html.is_empty());
    assert!(!encoder.is_compiling());
}

// ========== disassembly ==========

#[test]
fn test_token_dump() {
    let html = compile(|e| {
        e.attribute(AttributeName::Lang, "pt-BR")?;
        e.element_begin(ElementName::Html)?;
        e.element_value(ValueKind::Attribute)?;
        e.element_end()
    });
    let dump = html.tokens().to_string();

    assert!(dump.contains("MARKED5"), "{dump}");
    assert!(dump.contains("\"pt-BR\""), "{dump}");
    assert!(dump.contains("ELEMENT len=7"), "{dump}");
    assert!(dump.contains("STANDARD_NAME html"), "{dump}");
    assert!(dump.contains("ATTRIBUTE1 -> 0"), "{dump}");
    assert!(dump.contains("END <- 0"), "{dump}");
    assert_eq!(dump.lines().count(), 6);
}

#[test]
fn test_token_dump_survives_garbage() {
    let html = CompiledHtml::from_parts(vec![0, 0xFF, ELEMENT], Vec::new());
    let dump = html.tokens().to_string();
    assert!(dump.contains("??"));
}
