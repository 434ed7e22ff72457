//! Arbor: a typed Python syntax-tree toolkit.
//!
//! Source text is parsed into a generic raw tree, rebuilt into canonical
//! typed nodes, and then navigated or edited through a persistent zipper
//! cursor. Scope and line-range questions are answered structurally from
//! tree shape. Nodes are immutable once built; edits produce new nodes
//! and leave every old cursor valid.

pub use crate::errors::{ArborError, ErrorCategory, ErrorKind};
pub use crate::nodes::{
    empty, seq, Context, Dialect, Field, LiteralValue, Node, NodeKind, NodeSeq, Position,
};
pub use crate::tree::Tree;
pub use crate::zipper::{Focus, Zipper};

pub mod builder;
pub mod errors;
pub mod nodes;
pub mod parse;
pub mod ranges;
pub mod raw;
pub mod rebuild;
pub mod scope;
pub mod tree;
pub mod zipper;
