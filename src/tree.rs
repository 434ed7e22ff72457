//! Built trees and the parent relation.
//!
//! A [`Tree`] owns the root node of one rebuilt module together with the
//! parent index: a non-owning lookup from node identity to the unique
//! ancestor holding it in a child field. The index is computed in one walk
//! after rebuilding; nodes never carry back-pointers themselves, so the
//! ownership graph stays acyclic.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ArborError, ErrorKind};
use crate::nodes::{Dialect, Field, ModuleNode, Node, NodeKind};
use crate::scope::{self, Ancestry};
use crate::zipper::{Focus, Zipper};

#[derive(Debug)]
pub struct Tree {
    root: Arc<Node>,
    dialect: Dialect,
    parents: HashMap<usize, Arc<Node>>,
}

fn identity(node: &Arc<Node>) -> usize {
    Arc::as_ptr(node) as usize
}

impl Tree {
    /// Indexes parents for every node reachable from `root`. The Empty
    /// singleton is shared across positions and is never indexed.
    pub fn new(root: Arc<Node>, dialect: Dialect) -> Self {
        let mut parents = HashMap::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            for field in node.children() {
                match field {
                    Field::Node(child) => {
                        if !child.is_empty() {
                            parents.insert(identity(&child), node.clone());
                            stack.push(child);
                        }
                    }
                    Field::Seq(children) => {
                        for child in children.iter() {
                            if !child.is_empty() {
                                parents.insert(identity(child), node.clone());
                                stack.push(child.clone());
                            }
                        }
                    }
                }
            }
        }
        Self {
            root,
            dialect,
            parents,
        }
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The root's module payload, when the tree is a built module.
    pub fn module(&self) -> Option<&ModuleNode> {
        match &self.root.kind {
            NodeKind::Module(module) => Some(module),
            _ => None,
        }
    }

    /// The structural parent of `node`, or `None` for the root and for
    /// the Empty sentinel.
    pub fn parent_of(&self, node: &Arc<Node>) -> Option<&Arc<Node>> {
        self.parents.get(&identity(node))
    }

    /// Ancestors of `node`, nearest first.
    pub fn ancestors<'t>(&'t self, node: &Arc<Node>) -> impl Iterator<Item = &'t Arc<Node>> + 't {
        let mut current = self.parent_of(node);
        std::iter::from_fn(move || {
            let parent = current?;
            current = self.parent_of(parent);
            Some(parent)
        })
    }

    /// A zipper cursor at the root.
    pub fn cursor(&self) -> Zipper {
        Zipper::new(Focus::Node(self.root.clone()))
    }

    /// A location handle for the resolvers.
    pub fn locate(&self, node: &Arc<Node>) -> TreeLoc<'_> {
        TreeLoc {
            tree: self,
            node: node.clone(),
        }
    }

    /// The nearest node introducing the lexical scope `node` lives in.
    pub fn scope_of(&self, node: &Arc<Node>) -> Option<Arc<Node>> {
        scope::enclosing_scope(&self.locate(node), self.dialect).map(|loc| loc.node)
    }

    /// The statement `node` belongs to (or the module itself).
    pub fn statement_of(&self, node: &Arc<Node>) -> Option<Arc<Node>> {
        let mut current = node.clone();
        loop {
            if current.is_statement() || matches!(current.kind, NodeKind::Module(_)) {
                return Some(current);
            }
            current = self.parent_of(&current)?.clone();
        }
    }

    /// The nearest enclosing frame: function, lambda, class or module.
    pub fn frame_of(&self, node: &Arc<Node>) -> Option<Arc<Node>> {
        let mut current = node.clone();
        loop {
            if is_frame(&current) {
                return Some(current);
            }
            current = self.parent_of(&current)?.clone();
        }
    }

    /// The node which introduces `node` as a name binding; for instance
    /// the binding node of a for-loop target is the loop itself.
    pub fn assign_type(&self, node: &Arc<Node>) -> Arc<Node> {
        scope::assign_type(&self.locate(node)).node
    }

    /// Dotted name of a module, class, function or lambda, built from the
    /// enclosing frames.
    pub fn qualified_name(&self, node: &Arc<Node>) -> Result<String, ArborError> {
        let name = match &node.kind {
            NodeKind::Module(module) => module.name.clone(),
            NodeKind::ClassDef { name, .. }
            | NodeKind::FunctionDef { name, .. }
            | NodeKind::AsyncFunctionDef { name, .. }
            | NodeKind::Lambda { name, .. } => name.clone(),
            _ => {
                return Err(ArborError::bare(ErrorKind::NotSupported {
                    capability: "qualified name".to_string(),
                }))
            }
        };
        match self.parent_of(node) {
            None => Ok(name),
            Some(parent) => {
                let frame = self
                    .frame_of(parent)
                    .expect("a parented node always has an enclosing frame");
                Ok(format!("{}.{}", self.qualified_name(&frame)?, name))
            }
        }
    }
}

fn is_frame(node: &Arc<Node>) -> bool {
    matches!(
        node.kind,
        NodeKind::Module(_)
            | NodeKind::FunctionDef { .. }
            | NodeKind::AsyncFunctionDef { .. }
            | NodeKind::ClassDef { .. }
            | NodeKind::Lambda { .. }
    )
}

/// A node plus the tree it belongs to; the parent-walking handle used by
/// the scope resolver.
pub struct TreeLoc<'t> {
    pub tree: &'t Tree,
    pub node: Arc<Node>,
}

impl Clone for TreeLoc<'_> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            node: self.node.clone(),
        }
    }
}

impl Ancestry for TreeLoc<'_> {
    fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn parent(&self) -> Option<Self> {
        self.tree.parent_of(&self.node).map(|parent| TreeLoc {
            tree: self.tree,
            node: parent.clone(),
        })
    }
}
