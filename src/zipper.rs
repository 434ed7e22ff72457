//! A persistent cursor over the node tree.
//!
//! The zipper keeps a focus (a node or a run of siblings) plus an
//! immutable path of frames recording left siblings, right siblings and
//! the ancestor chain. Movement is pure: every operation returns a new
//! cursor or `None` and never touches the underlying nodes. Edits stay
//! local to the cursor holding them; walking `up()` from an edited focus
//! re-synthesizes just the spine that changed, leaving every old node
//! valid, so holding an older cursor is a free snapshot.
//!
//! The design follows the Clojure zipper: singly-linked persistent
//! vectors for the sibling lists, a dirty flag per frame so an unedited
//! `up()` is a constant-time pop.

use std::sync::Arc;

use im::Vector;

use crate::nodes::{seq, Dialect, Field, Node, NodeKind, NodeSeq};
use crate::scope::{self, Ancestry};

/// The zipper's current subject: one node, or one sibling sequence drawn
/// from a child field.
#[derive(Debug, Clone)]
pub enum Focus {
    Node(Arc<Node>),
    Seq(NodeSeq),
}

impl Focus {
    pub fn node(&self) -> Option<&Arc<Node>> {
        match self {
            Focus::Node(node) => Some(node),
            Focus::Seq(_) => None,
        }
    }

    fn children(&self) -> Vec<Focus> {
        match self {
            Focus::Node(node) => node
                .children()
                .into_iter()
                .map(|field| match field {
                    Field::Node(child) => Focus::Node(child),
                    Field::Seq(children) => Focus::Seq(children),
                })
                .collect(),
            Focus::Seq(children) => children.iter().cloned().map(Focus::Node).collect(),
        }
    }

    fn has_children(&self) -> bool {
        match self {
            Focus::Node(node) => !node.children().is_empty(),
            Focus::Seq(children) => !children.is_empty(),
        }
    }

    fn to_field(&self) -> Field {
        match self {
            Focus::Node(node) => Field::Node(node.clone()),
            Focus::Seq(children) => Field::Seq(children.clone()),
        }
    }

    fn is_empty_node(&self) -> bool {
        matches!(self, Focus::Node(node) if node.is_empty())
    }

    /// Identity, not structural equality.
    fn same(a: &Focus, b: &Focus) -> bool {
        match (a, b) {
            (Focus::Node(x), Focus::Node(y)) => Arc::ptr_eq(x, y),
            (Focus::Seq(x), Focus::Seq(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct PathFrame {
    /// Siblings to the left of the focus, nearest first.
    left: Vector<Focus>,
    /// Siblings to the right of the focus, nearest first.
    right: Vector<Focus>,
    /// Ancestor foci, nearest first.
    parents: Vector<Focus>,
    parent_path: Option<Arc<PathFrame>>,
    /// Whether this focus or one of its siblings was replaced since the
    /// last ancestor reconstruction.
    changed: bool,
}

impl PathFrame {
    fn with_changed(&self) -> Arc<PathFrame> {
        Arc::new(PathFrame {
            changed: true,
            ..self.clone()
        })
    }
}

#[derive(Debug, Clone)]
pub struct Zipper {
    focus: Focus,
    path: Option<Arc<PathFrame>>,
}

impl Zipper {
    pub fn new(focus: Focus) -> Self {
        Self { focus, path: None }
    }

    pub fn from_node(node: Arc<Node>) -> Self {
        Self::new(Focus::Node(node))
    }

    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    /// The focused node, when the focus is not a sibling sequence.
    pub fn node(&self) -> Option<&Arc<Node>> {
        self.focus.node()
    }

    /// Whether edits below this cursor are waiting to be committed by
    /// `up()`.
    pub fn is_dirty(&self) -> bool {
        self.path.as_ref().map(|p| p.changed).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    /// The sibling directly to the left. Constant time.
    pub fn left(&self) -> Option<Zipper> {
        let path = self.path.as_ref()?;
        let mut left = path.left.clone();
        let focus = left.pop_front()?;
        let mut right = path.right.clone();
        right.push_front(self.focus.clone());
        Some(Zipper {
            focus,
            path: Some(Arc::new(PathFrame {
                left,
                right,
                parents: path.parents.clone(),
                parent_path: path.parent_path.clone(),
                changed: path.changed,
            })),
        })
    }

    /// The sibling directly to the right. Constant time.
    pub fn right(&self) -> Option<Zipper> {
        let path = self.path.as_ref()?;
        let mut right = path.right.clone();
        let focus = right.pop_front()?;
        let mut left = path.left.clone();
        left.push_front(self.focus.clone());
        Some(Zipper {
            focus,
            path: Some(Arc::new(PathFrame {
                left,
                right,
                parents: path.parents.clone(),
                parent_path: path.parent_path.clone(),
                changed: path.changed,
            })),
        })
    }

    /// The leftmost sibling; linear in the number of left siblings.
    pub fn leftmost(&self) -> Option<Zipper> {
        let path = self.path.as_ref()?;
        let mut left = path.left.clone();
        let focus = left.pop_back()?;
        let mut right = path.right.clone();
        right.push_front(self.focus.clone());
        for sibling in left.iter() {
            right.push_front(sibling.clone());
        }
        Some(Zipper {
            focus,
            path: Some(Arc::new(PathFrame {
                left: Vector::new(),
                right,
                parents: path.parents.clone(),
                parent_path: path.parent_path.clone(),
                changed: path.changed,
            })),
        })
    }

    /// The rightmost sibling; linear in the number of right siblings.
    pub fn rightmost(&self) -> Option<Zipper> {
        let path = self.path.as_ref()?;
        let mut right = path.right.clone();
        let focus = right.pop_back()?;
        let mut left = path.left.clone();
        left.push_front(self.focus.clone());
        for sibling in right.iter() {
            left.push_front(sibling.clone());
        }
        Some(Zipper {
            focus,
            path: Some(Arc::new(PathFrame {
                left,
                right: Vector::new(),
                parents: path.parents.clone(),
                parent_path: path.parent_path.clone(),
                changed: path.changed,
            })),
        })
    }

    /// The first child of the focus. Constant time; `None` when the
    /// focus has no children.
    pub fn down(&self) -> Option<Zipper> {
        let mut children = self.focus.children().into_iter();
        let first = children.next()?;
        let mut right = Vector::new();
        for child in children {
            right.push_back(child);
        }
        let mut parents = match &self.path {
            Some(path) => path.parents.clone(),
            None => Vector::new(),
        };
        parents.push_front(self.focus.clone());
        Some(Zipper {
            focus: first,
            path: Some(Arc::new(PathFrame {
                left: Vector::new(),
                right,
                parents,
                parent_path: self.path.clone(),
                changed: false,
            })),
        })
    }

    /// The parent of the focus. Constant time when nothing below was
    /// edited; otherwise the sibling row is re-synthesized into a fresh
    /// ancestor and the dirty flag propagates upward.
    pub fn up(&self) -> Option<Zipper> {
        let path = self.path.as_ref()?;
        let parent_focus = path.parents.front()?.clone();
        if !path.changed {
            return Some(Zipper {
                focus: parent_focus,
                path: path.parent_path.clone(),
            });
        }
        let mut row: Vec<Focus> = path.left.iter().cloned().collect();
        row.reverse();
        row.push(self.focus.clone());
        row.extend(path.right.iter().cloned());
        let focus = match parent_focus {
            Focus::Node(parent) => {
                let fields: Vec<Field> = row.iter().map(Focus::to_field).collect();
                Focus::Node(Arc::new(parent.with_children(fields)))
            }
            Focus::Seq(_) => {
                let nodes: Vec<Arc<Node>> = row
                    .into_iter()
                    .map(|focus| match focus {
                        Focus::Node(node) => node,
                        Focus::Seq(_) => {
                            panic!("sequence focus nested directly inside a sequence")
                        }
                    })
                    .collect();
                Focus::Seq(seq(nodes))
            }
        };
        Some(Zipper {
            focus,
            path: path.parent_path.as_ref().map(|p| p.with_changed()),
        })
    }

    /// The root of the tree this cursor was opened on, with all pending
    /// edits committed along the way.
    pub fn root(&self) -> Zipper {
        let mut location = self.clone();
        while let Some(parent) = location.up() {
            location = parent;
        }
        location
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Replaces the focus and marks the path dirty. The previous focus
    /// stays valid and unchanged.
    pub fn replace(&self, new_focus: Focus) -> Zipper {
        Zipper {
            focus: new_focus,
            path: self.path.as_ref().map(|p| p.with_changed()),
        }
    }

    pub fn replace_node(&self, node: Arc<Node>) -> Zipper {
        self.replace(Focus::Node(node))
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    /// The most recent ancestor two cursors share, compared by identity.
    /// The Empty sentinel is one shared object and is skipped; it can
    /// never be an ancestor. The result derives from `self`, so edits on
    /// `other` are not included. `None` for cursors over different trees.
    pub fn common_ancestor(&self, other: &Zipper) -> Option<Zipper> {
        let chain = |cursor: &Zipper| -> Vec<Focus> {
            let mut links = vec![cursor.focus.clone()];
            if let Some(path) = &cursor.path {
                links.extend(path.parents.iter().cloned());
            }
            links.reverse();
            links
        };
        let ours = chain(self);
        let theirs = chain(other);
        let mut ancestor = None;
        for (a, b) in ours.iter().zip(theirs.iter()) {
            if Focus::same(a, b) && !a.is_empty_node() {
                ancestor = Some(a.clone());
            } else {
                break;
            }
        }
        let ancestor = ancestor?;
        let mut location = self.clone();
        while !Focus::same(&location.focus, &ancestor) {
            location = location.up()?;
        }
        Some(location)
    }

    /// Iterates over the children of the focus.
    pub fn children(&self) -> Children {
        Children { next: self.down() }
    }

    /// Descendants of the focus in prefix order. See [`Preorder::send`]
    /// for traversal-with-rewrite.
    pub fn preorder_descendants<F>(&self, skip: F) -> Preorder<F>
    where
        F: Fn(&Zipper) -> bool,
    {
        Preorder {
            start: Some(Zipper::new(self.focus.clone())),
            current: None,
            skip,
            done: false,
        }
    }

    /// Descendants of the focus in postfix order.
    pub fn postorder_descendants<F>(&self, skip: F) -> Postorder<F>
    where
        F: Fn(&Zipper) -> bool,
    {
        Postorder {
            start: Some(Zipper::new(self.focus.clone())),
            current: None,
            skip,
            done: false,
        }
    }

    // ------------------------------------------------------------------
    // Ancestor queries
    // ------------------------------------------------------------------

    /// The nearest ancestor (or self) in statement position.
    pub fn statement(&self) -> Option<Zipper> {
        let mut location = self.clone();
        loop {
            if let Focus::Node(node) = &location.focus {
                if node.is_statement() || matches!(node.kind, NodeKind::Module(_)) {
                    return Some(location);
                }
            }
            location = location.up()?;
        }
    }

    /// The nearest enclosing frame: function, lambda, class or module.
    pub fn frame(&self) -> Option<Zipper> {
        let mut location = self.clone();
        loop {
            if let Focus::Node(node) = &location.focus {
                if matches!(
                    node.kind,
                    NodeKind::Module(_)
                        | NodeKind::FunctionDef { .. }
                        | NodeKind::AsyncFunctionDef { .. }
                        | NodeKind::ClassDef { .. }
                        | NodeKind::Lambda { .. }
                ) {
                    return Some(location);
                }
            }
            location = location.up()?;
        }
    }

    /// The nearest node introducing this cursor's lexical scope.
    pub fn scope(&self, dialect: Dialect) -> Option<Zipper> {
        self.focus.node()?;
        scope::enclosing_scope(self, dialect)
    }
}

impl Ancestry for Zipper {
    fn node(&self) -> &Arc<Node> {
        match &self.focus {
            Focus::Node(node) => node,
            Focus::Seq(_) => panic!("scope resolution requires a node focus"),
        }
    }

    fn parent(&self) -> Option<Self> {
        let mut location = self.up()?;
        while matches!(location.focus, Focus::Seq(_)) {
            location = location.up()?;
        }
        Some(location)
    }
}

/// Iterator over child cursors, restartable per call to
/// [`Zipper::children`].
pub struct Children {
    next: Option<Zipper>,
}

impl Iterator for Children {
    type Item = Zipper;

    fn next(&mut self) -> Option<Zipper> {
        let current = self.next.take()?;
        self.next = current.right();
        Some(current)
    }
}

/// Prefix-order descendant traversal with skip and substitution support.
pub struct Preorder<F> {
    start: Option<Zipper>,
    current: Option<Zipper>,
    skip: F,
    done: bool,
}

impl<F: Fn(&Zipper) -> bool> Preorder<F> {
    fn right_or_up(mut location: Zipper) -> Option<Zipper> {
        if let Some(right) = location.right() {
            return Some(right);
        }
        loop {
            location = location.up()?;
            if let Some(right) = location.right() {
                return Some(right);
            }
        }
    }

    /// Substitutes `replacement` for the cursor most recently yielded and
    /// continues the traversal from it, returning the next cursor. This
    /// is the one-pass traverse-and-rewrite hook: the replacement's
    /// subtree is what gets descended into.
    pub fn send(&mut self, replacement: Zipper) -> Option<Zipper> {
        if self.current.is_some() {
            self.current = Some(replacement);
        }
        self.next()
    }
}

impl<F: Fn(&Zipper) -> bool> Iterator for Preorder<F> {
    type Item = Zipper;

    fn next(&mut self) -> Option<Zipper> {
        if self.done {
            return None;
        }
        let mut location = match self.start.take() {
            Some(start) => start,
            None => {
                let current = self.current.take()?;
                let moved = match current.down() {
                    Some(down) => Some(down),
                    None => Self::right_or_up(current),
                };
                match moved {
                    Some(location) => location,
                    None => {
                        self.done = true;
                        return None;
                    }
                }
            }
        };
        loop {
            if !(self.skip)(&location) {
                self.current = Some(location.clone());
                return Some(location);
            }
            // A skipped subtree is not descended into.
            location = match Self::right_or_up(location) {
                Some(next) => next,
                None => {
                    self.done = true;
                    return None;
                }
            };
        }
    }
}

/// Postfix-order descendant traversal with skip and substitution support.
pub struct Postorder<F> {
    start: Option<Zipper>,
    current: Option<Zipper>,
    skip: F,
    done: bool,
}

impl<F: Fn(&Zipper) -> bool> Postorder<F> {
    fn descend(&self, mut location: Zipper) -> Zipper {
        while location.focus.has_children() && !(self.skip)(&location) {
            match location.down() {
                Some(down) => location = down,
                None => break,
            }
        }
        location
    }

    fn successor(&self, location: Zipper) -> Option<Zipper> {
        if let Some(right) = location.right() {
            return Some(self.descend(right));
        }
        location.up()
    }

    /// See [`Preorder::send`].
    pub fn send(&mut self, replacement: Zipper) -> Option<Zipper> {
        if self.current.is_some() {
            self.current = Some(replacement);
        }
        self.next()
    }
}

impl<F: Fn(&Zipper) -> bool> Iterator for Postorder<F> {
    type Item = Zipper;

    fn next(&mut self) -> Option<Zipper> {
        if self.done {
            return None;
        }
        let mut location = match self.start.take() {
            Some(start) => self.descend(start),
            None => {
                let current = self.current.take()?;
                match self.successor(current) {
                    Some(location) => location,
                    None => {
                        self.done = true;
                        return None;
                    }
                }
            }
        };
        loop {
            if !(self.skip)(&location) {
                self.current = Some(location.clone());
                return Some(location);
            }
            location = match self.successor(location) {
                Some(next) => next,
                None => {
                    self.done = true;
                    return None;
                }
            };
        }
    }
}
