//! Quill CLI
//!
//! Compiles a JSON template description and shows what the compiler made of
//! it: the disassembled token stream, the rendered markup and the pseudo-DOM
//! tree read back from the stream.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use quill_compiler::{CompiledHtml, Encoder, EncoderConfig, ValueKind};
use quill_dom::{Document, Element, Node, render};
use quill_names::{Ambiguous, AttributeName, ElementName};
use serde::Deserialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Quill: compile a template description into a flat HTML token stream
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"TEMPLATE FORMAT:
    {"config": {"cell_capacity": 1024}, "nodes": [NODE, ...]}

    NODE is one of
      {"doctype": true}
      {"element": "div", "attributes": [["class", "x"]], "flags": ["hidden"],
       "id": "main", "class": "wide", "children": [NODE, ...]}
      {"text": "..."}
      {"raw": "..."}
      {"ambiguous": "title", "value": "...", "as": "element" | "attribute"}
      {"flatten": [NODE, ...]}
      {"fragment": [NODE, ...]}

EXAMPLES:
    # Show everything
    quill page.json

    # Only the token stream
    quill --tokens page.json

    # Inline template
    quill --json '{"nodes": [{"element": "p", "children": [{"text": "hi"}]}]}'

    # Trace the encoder
    RUST_LOG=quill_compiler=trace quill page.json
"#)]
struct Cli {
    /// Path to a JSON template description
    #[arg(value_name = "FILE")]
    path: Option<PathBuf>,

    /// Inline JSON template description
    #[arg(long, value_name = "JSON", conflicts_with = "path")]
    json: Option<String>,

    /// Print the disassembled token stream
    #[arg(short = 't', long)]
    tokens: bool,

    /// Print the rendered markup
    #[arg(short = 'H', long)]
    html: bool,

    /// Print the pseudo-DOM tree
    #[arg(short = 'd', long)]
    dom: bool,

    /// Initial cell buffer capacity, overriding the template's config
    #[arg(long, value_name = "CELLS")]
    capacity: Option<usize>,
}

/// A whole template file.
#[derive(Debug, Deserialize)]
struct Template {
    #[serde(default)]
    config: EncoderConfig,
    nodes: Vec<TemplateNode>,
}

/// How an ambiguous value is claimed by its parent.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClaimAs {
    #[default]
    Element,
    Attribute,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TemplateNode {
    Doctype {
        #[allow(dead_code)]
        doctype: bool,
    },
    Element {
        element: String,
        #[serde(default)]
        attributes: Vec<(String, String)>,
        #[serde(default)]
        flags: Vec<String>,
        id: Option<String>,
        class: Option<String>,
        #[serde(default)]
        children: Vec<TemplateNode>,
    },
    Text {
        text: String,
    },
    Raw {
        raw: String,
    },
    Ambiguous {
        ambiguous: String,
        value: String,
        #[serde(rename = "as", default)]
        claim: ClaimAs,
    },
    Flatten {
        flatten: Vec<TemplateNode>,
    },
    Fragment {
        fragment: Vec<TemplateNode>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let source = load_source(&cli)?;
    let mut template: Template =
        serde_json::from_str(&source).context("Invalid template description")?;
    if let Some(capacity) = cli.capacity {
        template.config = template.config.with_cell_capacity(capacity);
    }

    let html = compile(&template)?;
    debug!(cells = html.len(), values = html.pool().len(), "template compiled");

    let all = !(cli.tokens || cli.html || cli.dom);
    if all || cli.tokens {
        heading("Token Stream");
        print!("{}", html.tokens());
    }
    if all || cli.html {
        heading("HTML");
        println!("{}", render(&html).context("Compiled stream does not decode")?);
    }
    if all || cli.dom {
        heading("Pseudo-DOM");
        let doc = Document::try_new(&html).context("Compiled stream does not decode")?;
        for node in doc.nodes() {
            print_node(node, 0);
        }
    }
    Ok(())
}

/// Load the template text from CLI arguments
fn load_source(cli: &Cli) -> Result<String> {
    if let Some(ref json) = cli.json {
        Ok(json.clone())
    } else if let Some(ref path) = cli.path {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    } else {
        bail!("A template file or --json is required")
    }
}

fn heading(title: &str) {
    println!("{}", format!("=== {title} ===").bold().cyan());
}

fn compile(template: &Template) -> Result<CompiledHtml> {
    let mut encoder = Encoder::with_config(template.config);
    encoder.compilation_begin()?;
    for node in &template.nodes {
        let _ = compile_node(&mut encoder, node)?;
    }
    encoder
        .compilation_end()
        .context("Template does not compile")
}

/// Compile one node and return how its parent claims it. A doctype cannot
/// be claimed.
fn compile_node(e: &mut Encoder, node: &TemplateNode) -> Result<Option<ValueKind>> {
    let kind = match node {
        TemplateNode::Doctype { .. } => {
            e.doctype()?;
            return Ok(None);
        }
        TemplateNode::Text { text } => {
            e.text(text.as_str())?;
            ValueKind::Text
        }
        TemplateNode::Raw { raw } => {
            e.raw(raw.as_str())?;
            ValueKind::Text
        }
        TemplateNode::Ambiguous {
            ambiguous,
            value,
            claim,
        } => {
            let name: Ambiguous = ambiguous
                .parse()
                .with_context(|| format!("Unknown ambiguous name `{ambiguous}`"))?;
            e.ambiguous(name, value.as_str())?;
            match claim {
                ClaimAs::Element => ValueKind::Element,
                ClaimAs::Attribute => ValueKind::Attribute,
            }
        }
        TemplateNode::Element {
            element,
            attributes,
            flags,
            id,
            class,
            children,
        } => {
            let name: ElementName = element
                .parse()
                .with_context(|| format!("Unknown element `{element}`"))?;
            for (attribute, value) in attributes {
                e.attribute(attribute_name(attribute)?, value.as_str())?;
            }
            for flag in flags {
                e.attribute_flag(attribute_name(flag)?)?;
            }
            let kinds = compile_children(e, children)?;

            e.element_begin(name)?;
            for _ in 0..attributes.len() + flags.len() {
                e.element_value(ValueKind::Attribute)?;
            }
            for kind in kinds {
                e.element_value(kind)?;
            }
            if let Some(id) = id {
                e.element_id(id.as_str())?;
            }
            if let Some(class) = class {
                e.element_class(class.as_str())?;
            }
            e.element_end()?;
            ValueKind::Element
        }
        TemplateNode::Flatten { flatten } => {
            let kinds = compile_children(e, flatten)?;
            e.flatten_begin()?;
            for kind in kinds {
                e.element_value(kind)?;
            }
            e.element_end()?;
            ValueKind::Element
        }
        TemplateNode::Fragment { fragment } => {
            let index = e.fragment_begin()?;
            for member in fragment {
                if compile_node(e, member)?.is_none() {
                    bail!("A doctype cannot be a fragment member");
                }
            }
            e.fragment_end(index)?;
            ValueKind::Fragment
        }
    };
    Ok(Some(kind))
}

fn compile_children(e: &mut Encoder, children: &[TemplateNode]) -> Result<Vec<ValueKind>> {
    children
        .iter()
        .map(|child| {
            compile_node(e, child)?.context("A doctype can only appear at the top level")
        })
        .collect()
}

fn attribute_name(name: &str) -> Result<AttributeName> {
    name.parse()
        .with_context(|| format!("Unknown attribute `{name}`"))
}

fn print_node(node: Node<'_>, indent: usize) {
    let prefix = "  ".repeat(indent);
    match node {
        Node::Doctype => println!("{prefix}{}", "<!DOCTYPE html>".dimmed()),
        Node::Text(text) => {
            let display = text.value().replace('\n', "\\n").replace(' ', "\u{00B7}");
            println!("{prefix}\"{display}\"");
        }
        Node::Raw(text) => println!("{prefix}{} {:?}", "raw".yellow(), text.value()),
        Node::Element(element) => print_element(&element, indent),
    }
}

fn print_element(element: &Element<'_>, indent: usize) {
    let prefix = "  ".repeat(indent);
    let attributes: Vec<String> = element
        .attributes()
        .map(|attribute| {
            let values: Vec<&str> = attribute.values().collect();
            if values.is_empty() {
                attribute.name().to_string()
            } else {
                format!("{}=\"{}\"", attribute.name(), values.join(" "))
            }
        })
        .collect();
    let name = element.name().green().to_string();
    if attributes.is_empty() {
        println!("{prefix}<{name}>");
    } else {
        println!("{prefix}<{name} {}>", attributes.join(" "));
    }
    for child in element.nodes() {
        print_node(child, indent + 1);
    }
}
