//! The generic raw parse tree.
//!
//! The upstream parser produces kinded nodes with line/column metadata and
//! named fields; nothing here knows about the canonical node set. The
//! rebuilder dispatches on [`RawNode::kind`] and reads fields through the
//! typed accessors, which turn shape mismatches into malformed-tree
//! building errors rather than panics, since raw trees may also be
//! assembled programmatically.

use crate::errors::{ArborError, ErrorKind};
use crate::nodes::Position;

/// One node of the raw tree: a kind name, an optional source position and
/// an ordered list of named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub kind: String,
    pub position: Option<Position>,
    pub fields: Vec<(String, RawField)>,
}

/// A raw field value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Node(Box<RawNode>),
    Nodes(Vec<RawNode>),
    Text(String),
    OptText(Option<String>),
    Int(i64),
    Float(f64),
    Flag(bool),
    Texts(Vec<String>),
    /// An optional slot that holds nothing.
    Absent,
}

impl RawNode {
    pub fn new(kind: impl Into<String>, position: Option<Position>) -> Self {
        Self {
            kind: kind.into(),
            position,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: RawField) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn field(&self, name: &str) -> Option<&RawField> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn mismatch(&self, name: &str, expected: &str) -> ArborError {
        ArborError::bare(ErrorKind::MalformedTree {
            detail: format!(
                "{} node has no {} field {:?}",
                self.kind, expected, name
            ),
        })
    }

    /// A mandatory single-node field.
    pub fn child(&self, name: &str) -> Result<&RawNode, ArborError> {
        match self.field(name) {
            Some(RawField::Node(node)) => Ok(node),
            _ => Err(self.mismatch(name, "node")),
        }
    }

    /// An optional single-node field; `Absent`, a missing entry, or an
    /// `Empty`-kinded node all read as `None`.
    pub fn opt_child(&self, name: &str) -> Option<&RawNode> {
        match self.field(name) {
            Some(RawField::Node(node)) if node.kind != "Empty" => Some(node),
            _ => None,
        }
    }

    /// A mandatory node-sequence field.
    pub fn seq(&self, name: &str) -> Result<&[RawNode], ArborError> {
        match self.field(name) {
            Some(RawField::Nodes(nodes)) => Ok(nodes),
            _ => Err(self.mismatch(name, "sequence")),
        }
    }

    /// A node-sequence field that may be missing entirely.
    pub fn opt_seq(&self, name: &str) -> &[RawNode] {
        match self.field(name) {
            Some(RawField::Nodes(nodes)) => nodes,
            _ => &[],
        }
    }

    /// A mandatory string field.
    pub fn text(&self, name: &str) -> Result<&str, ArborError> {
        match self.field(name) {
            Some(RawField::Text(text)) => Ok(text),
            Some(RawField::OptText(Some(text))) => Ok(text),
            _ => Err(self.mismatch(name, "text")),
        }
    }

    /// An optional string field.
    pub fn opt_text(&self, name: &str) -> Option<&str> {
        match self.field(name) {
            Some(RawField::Text(text)) => Some(text),
            Some(RawField::OptText(Some(text))) => Some(text),
            _ => None,
        }
    }

    /// An optional integer field.
    pub fn opt_int(&self, name: &str) -> Option<i64> {
        match self.field(name) {
            Some(RawField::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// An optional float field.
    pub fn opt_float(&self, name: &str) -> Option<f64> {
        match self.field(name) {
            Some(RawField::Float(value)) => Some(*value),
            _ => None,
        }
    }

    /// A boolean field, defaulting to `false` when missing.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.field(name), Some(RawField::Flag(true)))
    }

    /// A mandatory list-of-strings field.
    pub fn texts(&self, name: &str) -> Result<&[String], ArborError> {
        match self.field(name) {
            Some(RawField::Texts(texts)) => Ok(texts),
            _ => Err(self.mismatch(name, "name list")),
        }
    }
}
