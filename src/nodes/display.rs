//! Textual tree dumps.
//!
//! [`to_display_string`] renders a node and its descendants as an
//! indented, bracketed outline: variant name, optional identity tag and
//! position, then every declared field. A node encountered twice in one
//! dump prints a recursion marker instead of re-expanding, which keeps the
//! dump finite even over trees damaged by buggy edits.

use std::collections::HashSet;
use std::sync::Arc;

use super::{ArgumentsNode, Field, Node, NodeKind, NodeSeq};

/// Hard ceiling on how much of a single scalar field is shown.
const FIELD_CHARACTERS_LIMIT: usize = 160;

/// Options for [`to_display_string`].
#[derive(Debug, Clone)]
pub struct DisplayOptions {
    /// Include a per-node identity tag with the variant name.
    pub ids: bool,
    /// Include line/column positions.
    pub positions: bool,
    /// Include derived fields (the Arguments convenience sequence).
    pub derived: bool,
    /// Indentation unit.
    pub indent: String,
    /// Maximum depth to expand; 0 means unlimited.
    pub max_depth: usize,
    /// Target wrap column for scalar values.
    pub max_width: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            ids: false,
            positions: false,
            derived: false,
            indent: "   ".to_string(),
            max_depth: 0,
            max_width: 80,
        }
    }
}

/// Renders the tree rooted at `node` according to `options`.
pub fn to_display_string(node: &Arc<Node>, options: &DisplayOptions) -> String {
    let mut out = String::new();
    let mut done = HashSet::new();
    write_node(node, &mut out, &mut done, "", 1, options);
    out
}

/// One-line shorthand for a node, used in signature rendering.
pub fn brief(node: &Arc<Node>) -> String {
    match &node.kind {
        NodeKind::Const { value } | NodeKind::NameConstant { value } => value.to_string(),
        NodeKind::Name { name } | NodeKind::AssignName { name } => name.clone(),
        _ => node.kind_name().to_string(),
    }
}

enum FieldValue {
    Scalar(String),
    Node(Arc<Node>),
    Seq(NodeSeq),
}

fn write_scalar(text: &str, out: &mut String, cur_indent: &str, options: &DisplayOptions) -> bool {
    let limit = options
        .max_width
        .saturating_sub(cur_indent.len())
        .clamp(1, FIELD_CHARACTERS_LIMIT);
    if text.len() > limit {
        let cut: String = text.chars().take(limit).collect();
        out.push_str(&cut);
        out.push_str("...");
    } else {
        out.push_str(text);
    }
    false
}

fn write_seq(
    seq: &NodeSeq,
    out: &mut String,
    done: &mut HashSet<usize>,
    cur_indent: &str,
    depth: usize,
    options: &DisplayOptions,
) -> bool {
    let inner_indent = format!("{}{}", cur_indent, options.indent);
    out.push('[');
    let broken = match seq.len() {
        0 => false,
        1 => write_node(&seq[0], out, done, &inner_indent, depth, options),
        2 => {
            let first = write_node(&seq[0], out, done, &inner_indent, depth, options);
            if first {
                out.push_str(",\n");
                out.push_str(&inner_indent);
            } else {
                out.push_str(", ");
            }
            write_node(&seq[1], out, done, &inner_indent, depth, options) || first
        }
        _ => {
            out.push('\n');
            out.push_str(&inner_indent);
            for child in &seq[..seq.len() - 1] {
                write_node(child, out, done, &inner_indent, depth, options);
                out.push_str(",\n");
                out.push_str(&inner_indent);
            }
            write_node(&seq[seq.len() - 1], out, done, &inner_indent, depth, options);
            true
        }
    };
    out.push(']');
    broken
}

fn write_node(
    node: &Arc<Node>,
    out: &mut String,
    done: &mut HashSet<usize>,
    cur_indent: &str,
    depth: usize,
    options: &DisplayOptions,
) -> bool {
    // The Empty singleton recurs by design and never expands.
    if node.is_empty() {
        out.push_str("Empty");
        return false;
    }
    let identity = Arc::as_ptr(node) as usize;
    if !done.insert(identity) {
        out.push_str(&format!(
            "<Recursion on {} with id=0x{:x}>",
            node.kind_name(),
            identity
        ));
        return false;
    }
    if options.max_depth > 0 && depth > options.max_depth {
        out.push_str("...");
        return false;
    }
    let depth = depth + 1;
    let inner_indent = format!("{}{}", cur_indent, options.indent);

    if options.ids {
        out.push_str(&format!("{}<0x{:x}>(", node.kind_name(), identity));
    } else {
        out.push_str(&format!("{}(", node.kind_name()));
    }

    let fields = gather_fields(node, options);
    match fields.len() {
        0 => {
            out.push(')');
            false
        }
        1 => {
            let (name, value) = fields.into_iter().next().expect("one field");
            out.push_str(&format!("{}=", name));
            let broken = write_value(&value, out, done, &inner_indent, depth, options);
            out.push(')');
            broken
        }
        n => {
            out.push('\n');
            out.push_str(&inner_indent);
            for (index, (name, value)) in fields.into_iter().enumerate() {
                out.push_str(&format!("{}=", name));
                write_value(&value, out, done, &inner_indent, depth, options);
                if index + 1 < n {
                    out.push_str(",\n");
                    out.push_str(&inner_indent);
                }
            }
            out.push(')');
            true
        }
    }
}

fn write_value(
    value: &FieldValue,
    out: &mut String,
    done: &mut HashSet<usize>,
    cur_indent: &str,
    depth: usize,
    options: &DisplayOptions,
) -> bool {
    match value {
        FieldValue::Scalar(text) => write_scalar(text, out, cur_indent, options),
        FieldValue::Node(node) => write_node(node, out, done, cur_indent, depth, options),
        FieldValue::Seq(seq) => write_seq(seq, out, done, cur_indent, depth, options),
    }
}

fn gather_fields(node: &Arc<Node>, options: &DisplayOptions) -> Vec<(&'static str, FieldValue)> {
    let mut fields: Vec<(&'static str, FieldValue)> = Vec::new();
    if options.positions {
        let (line, column) = match node.position {
            Some(p) => (p.line.to_string(), p.column.to_string()),
            None => ("None".to_string(), "None".to_string()),
        };
        fields.push(("lineno", FieldValue::Scalar(line)));
        fields.push(("col_offset", FieldValue::Scalar(column)));
    }
    for (name, value) in node.scalar_fields() {
        fields.push((name, FieldValue::Scalar(value)));
    }
    let names = node.child_field_names();
    let children = node.children();
    debug_assert_eq!(names.len(), children.len());
    for (name, child) in names.iter().copied().zip(children) {
        fields.push((
            name,
            match child {
                Field::Node(n) => FieldValue::Node(n),
                Field::Seq(s) => FieldValue::Seq(s),
            },
        ));
    }
    if options.derived {
        if let NodeKind::Arguments(args) = &node.kind {
            fields.push((
                "positional_and_keyword",
                FieldValue::Scalar(summarize_derived(args)),
            ));
        }
    }
    fields
}

fn summarize_derived(args: &ArgumentsNode) -> String {
    let names: Vec<String> = args
        .positional_and_keyword()
        .iter()
        .map(brief)
        .collect();
    format!("[{}]", names.join(", "))
}
