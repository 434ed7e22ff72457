//! Line-range resolution.
//!
//! Which source lines does a node's block span for a queried line? The
//! answer is computed structurally from child positions, never stored.
//! Compound statements with an alternate branch share one rule; try
//! blocks partition the queried line across handlers; modules and
//! definitions always answer with their full span.

use std::sync::Arc;

use crate::nodes::{Node, NodeKind, NodeSeq};

/// First line of the node's own text. Definitions skip their decorator
/// lines; modules start at line zero.
pub fn from_line(node: &Arc<Node>) -> u32 {
    match &node.kind {
        NodeKind::Module(_) => 0,
        NodeKind::FunctionDef { decorators, .. }
        | NodeKind::AsyncFunctionDef { decorators, .. } => {
            let mut line = node.line().unwrap_or(0);
            if let NodeKind::Decorators { nodes } = &decorators.kind {
                for decorator in nodes.iter() {
                    line += to_line(decorator) - decorator.line().unwrap_or(0) + 1;
                }
            }
            line
        }
        _ => node.line().unwrap_or(0),
    }
}

/// Last line of the node's text, found by descending last children.
pub fn to_line(node: &Arc<Node>) -> u32 {
    let mut last = node.clone();
    while let Some(child) = last.last_child() {
        last = child;
    }
    last.line().or_else(|| node.line()).unwrap_or(0)
}

/// Last line of the header that opens a node's block (the line a colon
/// would sit on for single-line headers).
pub fn block_start_to_line(node: &Arc<Node>) -> u32 {
    match &node.kind {
        NodeKind::If { test, .. } | NodeKind::While { test, .. } => to_line(test),
        NodeKind::For { iter, .. } | NodeKind::AsyncFor { iter, .. } => to_line(iter),
        NodeKind::With { items, .. } | NodeKind::AsyncWith { items, .. } => match items.last() {
            Some(item) => match &item.kind {
                NodeKind::WithItem { context_expr, .. } => to_line(context_expr),
                _ => to_line(item),
            },
            None => from_line(node),
        },
        NodeKind::FunctionDef { args, .. } | NodeKind::AsyncFunctionDef { args, .. } => {
            to_line(args)
        }
        NodeKind::ClassDef { bases, .. } => match bases.last() {
            Some(base) => to_line(base),
            None => from_line(node),
        },
        NodeKind::ExceptHandler { etype, name, .. } => {
            if !name.is_empty() {
                to_line(name)
            } else if !etype.is_empty() {
                to_line(etype)
            } else {
                node.line().unwrap_or(0)
            }
        }
        _ => from_line(node),
    }
}

/// The inclusive line span of the block containing `line` within `node`.
pub fn block_range(node: &Arc<Node>, line: u32) -> (u32, u32) {
    match &node.kind {
        // A module has no sub-block structure at this level.
        NodeKind::Module(_) => (0, to_line(node)),
        NodeKind::FunctionDef { .. }
        | NodeKind::AsyncFunctionDef { .. }
        | NodeKind::ClassDef { .. } => (from_line(node), to_line(node)),
        NodeKind::If { body, orelse, .. } => {
            let body_start = from_line(&body[0]);
            if line == body_start {
                return (line, line);
            }
            let body_end = to_line(&body[body.len() - 1]);
            if line <= body_end {
                return (line, body_end);
            }
            elsed_block_range(node, line, orelse, Some(body_start - 1))
        }
        NodeKind::While { orelse, .. }
        | NodeKind::For { orelse, .. }
        | NodeKind::AsyncFor { orelse, .. } => elsed_block_range(node, line, orelse, None),
        NodeKind::TryExcept {
            handlers, orelse, ..
        } => {
            let mut last = None;
            for handler in handlers.iter() {
                if let NodeKind::ExceptHandler { etype, body, .. } = &handler.kind {
                    if !etype.is_empty() && line == from_line(etype) {
                        return (line, line);
                    }
                    if !body.is_empty()
                        && from_line(&body[0]) <= line
                        && line <= to_line(&body[body.len() - 1])
                    {
                        return (line, to_line(&body[body.len() - 1]));
                    }
                    if last.is_none() && !body.is_empty() {
                        last = Some(from_line(&body[0]) - 1);
                    }
                }
            }
            elsed_block_range(node, line, orelse, last)
        }
        NodeKind::TryFinally { body, finalbody } => {
            // The collapsed try/except/finally form nests a try-except as
            // the sole body statement on the same line.
            if let Some(child) = body.first() {
                if matches!(child.kind, NodeKind::TryExcept { .. })
                    && from_line(child) == from_line(node)
                    && line > from_line(node)
                    && line <= to_line(child)
                {
                    return block_range(child, line);
                }
            }
            elsed_block_range(node, line, finalbody, None)
        }
        _ => (line, to_line(node)),
    }
}

/// Shared rule for compound statements with an optional alternate branch:
/// the node's own first line answers with a single-line range; a line at
/// or past the branch runs to the branch's end; a line before it stops
/// one line short of the branch start.
fn elsed_block_range(
    node: &Arc<Node>,
    line: u32,
    orelse: &NodeSeq,
    last: Option<u32>,
) -> (u32, u32) {
    if line == from_line(node) {
        return (line, line);
    }
    if let Some(first) = orelse.first() {
        if line >= from_line(first) {
            return (line, to_line(&orelse[orelse.len() - 1]));
        }
        return (line, from_line(first) - 1);
    }
    (line, last.unwrap_or_else(|| to_line(node)))
}
