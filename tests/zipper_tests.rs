// Zipper: movement, purity of edits, ancestor relations, traversals.

use std::sync::Arc;

use indoc::indoc;

use arbor::builder;
use arbor::nodes::{empty, Node, NodeKind};
use arbor::zipper::{Focus, Zipper};
use arbor::Tree;

fn build(code: &str) -> Tree {
    builder::parse(code).expect("source builds")
}

fn kind_names(cursors: Vec<Zipper>) -> Vec<&'static str> {
    cursors
        .into_iter()
        .filter_map(|cursor| cursor.node().map(|node| node.kind_name()))
        .collect()
}

#[test]
fn movement_between_siblings() {
    let tree = build("a = 1\nb = 2\nc = 3\n");
    let body = tree.cursor().down().expect("module has a body");
    assert!(matches!(body.focus(), Focus::Seq(_)));

    let first = body.down().expect("body has statements");
    assert!(first.left().is_none());
    let second = first.right().expect("second statement");
    let third = second.right().expect("third statement");
    assert!(third.right().is_none());

    let back = third.left().expect("left from third");
    assert!(Arc::ptr_eq(back.node().unwrap(), second.node().unwrap()));

    let leftmost = third.leftmost().expect("leftmost from third");
    assert!(Arc::ptr_eq(leftmost.node().unwrap(), first.node().unwrap()));
    assert!(leftmost.left().is_none());

    let rightmost = first.rightmost().expect("rightmost from first");
    assert!(Arc::ptr_eq(rightmost.node().unwrap(), third.node().unwrap()));
    assert!(rightmost.right().is_none());

    // Order is preserved after the jump.
    let middle = rightmost.left().expect("left from rightmost");
    assert!(Arc::ptr_eq(middle.node().unwrap(), second.node().unwrap()));
}

#[test]
fn down_and_up_are_inverse_on_unedited_paths() {
    let tree = build("x = 1\n");
    let cursor = tree.cursor();
    let down = cursor.down().expect("module has children");
    let up = down.up().expect("up from the body");
    assert!(Arc::ptr_eq(up.node().unwrap(), tree.root()));
    assert!(up.up().is_none());

    let leaf = cursor
        .down()
        .and_then(|c| c.down())
        .and_then(|c| c.down())
        .expect("assignment targets");
    let back = leaf.up().expect("up from targets");
    assert!(Arc::ptr_eq(
        back.node().unwrap(),
        &tree.module().unwrap().body[0]
    ));
}

#[test]
fn movement_off_the_tree_returns_none_not_errors() {
    let tree = build("x = 1\n");
    let cursor = tree.cursor();
    assert!(cursor.left().is_none());
    assert!(cursor.right().is_none());
    assert!(cursor.up().is_none());
    assert!(cursor.leftmost().is_none());
    assert!(cursor.rightmost().is_none());

    let pass = Zipper::from_node(Node::new(NodeKind::Pass, None));
    assert!(pass.down().is_none());
}

#[test]
fn replace_is_pure_and_rebuilds_only_the_spine() {
    let tree = build("a = 1\nb = 2\n");
    let original_first = tree.module().unwrap().body[0].clone();
    let original_second = tree.module().unwrap().body[1].clone();

    let second = tree
        .cursor()
        .down()
        .and_then(|c| c.down())
        .and_then(|c| c.right())
        .expect("second statement");
    let edited = second.replace_node(Node::new(NodeKind::Pass, None));
    assert!(edited.is_dirty());

    let new_root = edited.root();
    let new_module = new_root.node().expect("rebuilt module");
    let NodeKind::Module(module) = &new_module.kind else {
        panic!("rebuilt root is not a module");
    };
    assert!(matches!(module.body[1].kind, NodeKind::Pass));
    // Unchanged siblings are shared, not copied.
    assert!(Arc::ptr_eq(&module.body[0], &original_first));
    assert!(!Arc::ptr_eq(new_module, tree.root()));

    // The original tree is untouched; the old cursor still sees it.
    assert!(matches!(
        tree.module().unwrap().body[1].kind,
        NodeKind::Assign { .. }
    ));
    assert!(Arc::ptr_eq(&tree.module().unwrap().body[1], &original_second));
    let unedited_root = second.root();
    assert!(Arc::ptr_eq(unedited_root.node().unwrap(), tree.root()));
}

#[test]
fn clean_up_is_identity_even_after_sibling_moves() {
    let tree = build("a = 1\nb = 2\n");
    let first = tree
        .cursor()
        .down()
        .and_then(|c| c.down())
        .expect("first statement");
    let wandered = first
        .right()
        .and_then(|c| c.left())
        .and_then(|c| c.right())
        .expect("wandering between siblings");
    let body = wandered.up().expect("up to the body");
    assert!(matches!(body.focus(), Focus::Seq(_)));
    let root = body.up().expect("up to the module");
    assert!(Arc::ptr_eq(root.node().unwrap(), tree.root()));
}

#[test]
fn common_ancestor_of_two_statements_is_the_body_sequence() {
    let tree = build("a = 1\nb = 2\n");
    let first = tree
        .cursor()
        .down()
        .and_then(|c| c.down())
        .expect("first statement");
    let second = first.right().expect("second statement");
    let ancestor = first.common_ancestor(&second).expect("shared ancestor");
    assert!(matches!(ancestor.focus(), Focus::Seq(_)));

    let deep_first = first.down().expect("into the first statement");
    let ancestor = deep_first.common_ancestor(&second).expect("shared ancestor");
    assert!(matches!(ancestor.focus(), Focus::Seq(_)));
}

#[test]
fn common_ancestor_rejects_unrelated_trees_and_empty() {
    let left = build("a = 1\n");
    let right = build("a = 1\n");
    let a = left.cursor().down().unwrap();
    let b = right.cursor().down().unwrap();
    assert!(a.common_ancestor(&b).is_none());

    // Two occurrences of the Empty singleton never count as shared.
    let one = Zipper::new(Focus::Node(empty()));
    let other = Zipper::new(Focus::Node(empty()));
    assert!(one.common_ancestor(&other).is_none());
}

#[test]
fn children_iterator_is_restartable() {
    let tree = build("def f(a):\n    pass\n");
    let cursor = tree.cursor();
    let first_pass: Vec<_> = cursor.children().collect();
    let second_pass: Vec<_> = cursor.children().collect();
    assert_eq!(first_pass.len(), 1);
    assert_eq!(second_pass.len(), 1);

    let func = cursor
        .down()
        .and_then(|c| c.down())
        .expect("function definition");
    // decorators, args, body, returns
    assert_eq!(func.children().count(), 4);
}

#[test]
fn preorder_visits_nodes_in_prefix_order() {
    let tree = build("x = 1\n");
    let cursors: Vec<_> = tree.cursor().preorder_descendants(|_| false).collect();
    assert_eq!(
        kind_names(cursors),
        vec!["Module", "Assign", "AssignName", "Const"]
    );
}

#[test]
fn postorder_visits_nodes_in_postfix_order() {
    let tree = build("x = 1\n");
    let cursors: Vec<_> = tree.cursor().postorder_descendants(|_| false).collect();
    assert_eq!(
        kind_names(cursors),
        vec!["AssignName", "Const", "Assign", "Module"]
    );
}

#[test]
fn skipped_subtrees_are_not_entered() {
    let tree = build(indoc! {"
        def f():
            hidden = 1
        visible = 2
    "});
    let skip = |cursor: &Zipper| {
        matches!(
            cursor.node().map(|n| &n.kind),
            Some(NodeKind::FunctionDef { .. })
        )
    };
    let names = kind_names(tree.cursor().preorder_descendants(skip).collect());
    assert!(!names.contains(&"FunctionDef"));
    assert!(names.contains(&"Assign"));

    let post = kind_names(tree.cursor().postorder_descendants(skip).collect());
    assert!(!post.contains(&"FunctionDef"));
    assert!(post.contains(&"Assign"));
}

#[test]
fn preorder_send_substitutes_mid_traversal() {
    let tree = build("def f():\n    pass\nx = 1\n");
    let mut traversal = tree.cursor().preorder_descendants(|_| false);
    let mut last = None;
    let mut cursor = traversal.next();
    while let Some(current) = cursor {
        if matches!(
            current.node().map(|n| &n.kind),
            Some(NodeKind::FunctionDef { .. })
        ) {
            let replaced = current.replace_node(Node::new(NodeKind::Pass, None));
            last = Some(replaced.clone());
            cursor = traversal.send(replaced);
        } else {
            last = Some(current.clone());
            cursor = traversal.next();
        }
    }
    let root = last.expect("traversal yielded cursors").root();
    let NodeKind::Module(module) = &root.node().expect("module focus").kind else {
        panic!("rebuilt root is not a module");
    };
    assert!(matches!(module.body[0].kind, NodeKind::Pass));
    assert!(matches!(module.body[1].kind, NodeKind::Assign { .. }));
    // The original tree still holds the function.
    assert!(matches!(
        tree.module().unwrap().body[0].kind,
        NodeKind::FunctionDef { .. }
    ));
}

#[test]
fn statement_and_frame_ancestors() {
    let tree = build("def f():\n    return value\n");
    let mut target = None;
    for cursor in tree.cursor().preorder_descendants(|_| false) {
        if matches!(
            cursor.node().map(|n| &n.kind),
            Some(NodeKind::Name { .. })
        ) {
            target = Some(cursor);
        }
    }
    let value = target.expect("name cursor");
    let stmt = value.statement().expect("statement ancestor");
    assert!(matches!(
        stmt.node().map(|n| &n.kind),
        Some(NodeKind::Return { .. })
    ));
    let frame = value.frame().expect("frame ancestor");
    assert!(matches!(
        frame.node().map(|n| &n.kind),
        Some(NodeKind::FunctionDef { .. })
    ));
}
