//! Lexical scope resolution.
//!
//! Scope is never stored on nodes; it is recomputed from tree shape by
//! walking parent links. The walk is expressed over the [`Ancestry`] seam
//! so it runs identically from a tree location and from a zipper cursor.
//!
//! The subtle cases live in [`scope_by_parent`]: parameter defaults and
//! annotations evaluate in the scope *enclosing* the function, the first
//! generator clause's iterable evaluates outside its comprehension, and
//! decorators evaluate in the scope surrounding the decorated definition.

use std::sync::Arc;

use crate::nodes::{Dialect, Node, NodeKind};

/// Parent-walking handle: a current node plus the means to reach its
/// structural parent.
pub trait Ancestry: Clone {
    fn node(&self) -> &Arc<Node>;
    fn parent(&self) -> Option<Self>;
}

/// True for the kinds that introduce a new lexical scope. List
/// comprehensions only do so under Python 3.
pub fn introduces_scope(node: &Arc<Node>, dialect: Dialect) -> bool {
    match node.kind {
        NodeKind::Module(_)
        | NodeKind::FunctionDef { .. }
        | NodeKind::AsyncFunctionDef { .. }
        | NodeKind::ClassDef { .. }
        | NodeKind::Lambda { .. }
        | NodeKind::GeneratorExp { .. }
        | NodeKind::DictComp { .. }
        | NodeKind::SetComp { .. } => true,
        NodeKind::ListComp { .. } => dialect == Dialect::Python3,
        _ => false,
    }
}

/// Resolves the scope of a location: the location itself when its node
/// introduces a scope, otherwise the nearest qualifying ancestor, with
/// the special parent-position rules applied first.
pub fn enclosing_scope<L: Ancestry>(location: &L, dialect: Dialect) -> Option<L> {
    let node = location.node().clone();
    // Decorators run at definition time in the surrounding scope, so they
    // skip both the wrapper and the definition it decorates.
    if let NodeKind::Decorators { .. } = node.kind {
        let definition = location.parent()?;
        let outer = definition.parent()?;
        return enclosing_scope(&outer, dialect);
    }
    if introduces_scope(&node, dialect) {
        return Some(location.clone());
    }
    let parent = location.parent()?;
    if let Some(special) = scope_by_parent(&parent, &node, dialect) {
        return Some(special);
    }
    enclosing_scope(&parent, dialect)
}

/// The parent-position special cases. Returns `None` when no special rule
/// applies and the default parent walk should decide.
fn scope_by_parent<L: Ancestry>(parent: &L, node: &Arc<Node>, dialect: Dialect) -> Option<L> {
    match &parent.node().kind {
        NodeKind::Arguments(args) => {
            let mut params = args.positional_and_keyword();
            params.extend(args.keyword_only.iter().cloned());
            let is_default = params.iter().any(|param| match &param.kind {
                NodeKind::Parameter { default, .. } => Arc::ptr_eq(default, node),
                _ => false,
            });
            let is_annotation = dialect == Dialect::Python3 && {
                params.push(args.vararg.clone());
                params.push(args.kwarg.clone());
                params.iter().any(|param| match &param.kind {
                    NodeKind::Parameter { annotation, .. } => Arc::ptr_eq(annotation, node),
                    _ => false,
                })
            };
            if is_default || is_annotation {
                let function = parent.parent()?;
                let outer = function.parent()?;
                return enclosing_scope(&outer, dialect);
            }
            None
        }
        NodeKind::FunctionDef { returns, .. } | NodeKind::AsyncFunctionDef { returns, .. } => {
            // The return annotation evaluates outside the function.
            if dialect == Dialect::Python3 && Arc::ptr_eq(returns, node) {
                let outer = parent.parent()?;
                return enclosing_scope(&outer, dialect);
            }
            None
        }
        NodeKind::Parameter {
            default,
            annotation,
            ..
        } => {
            if Arc::ptr_eq(default, node) || Arc::ptr_eq(annotation, node) {
                let arguments = parent.parent()?;
                let function = arguments.parent()?;
                let outer = function.parent()?;
                return enclosing_scope(&outer, dialect);
            }
            None
        }
        NodeKind::Comprehension { iter, .. } => {
            let owner = parent.parent()?;
            let first_clause = match &owner.node().kind {
                NodeKind::ListComp { generators, .. }
                | NodeKind::SetComp { generators, .. }
                | NodeKind::DictComp { generators, .. }
                | NodeKind::GeneratorExp { generators, .. } => generators.first().cloned(),
                _ => None,
            };
            // The outermost iterable is evaluated eagerly in the scope
            // enclosing the comprehension; inner clauses are not.
            if let Some(first) = first_clause {
                if Arc::ptr_eq(&first, parent.node()) && Arc::ptr_eq(iter, node) {
                    let outer = owner.parent()?;
                    return enclosing_scope(&outer, dialect);
                }
            }
            if dialect == Dialect::Python2 {
                if let NodeKind::ListComp { .. } = owner.node().kind {
                    let outer = owner.parent()?;
                    return enclosing_scope(&outer, dialect);
                }
            }
            None
        }
        _ => None,
    }
}

/// The node which introduces the given location as a name binding; the
/// binding node of a loop target is the loop itself, of a parameter the
/// parameter list's function, and so on up through nesting containers.
pub fn assign_type<L: Ancestry>(location: &L) -> L {
    match location.node().kind {
        NodeKind::AssignName { .. }
        | NodeKind::DelName { .. }
        | NodeKind::AssignAttr { .. }
        | NodeKind::DelAttr { .. }
        | NodeKind::Starred { .. }
        | NodeKind::WithItem { .. }
        | NodeKind::Parameter { .. }
        | NodeKind::List { .. }
        | NodeKind::Set { .. }
        | NodeKind::Tuple { .. }
        | NodeKind::Dict { .. } => match location.parent() {
            Some(parent) => assign_type(&parent),
            None => location.clone(),
        },
        _ => location.clone(),
    }
}
