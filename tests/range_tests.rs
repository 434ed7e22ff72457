// Line-range resolution over compound statements. The fixtures keep a
// leading blank line so statements start on line 2, matching the way the
// expected values were originally worked out.

use std::sync::Arc;

use indoc::indoc;

use arbor::builder;
use arbor::nodes::{Node, NodeKind};
use arbor::ranges::{block_range, block_start_to_line, from_line, to_line};
use arbor::Tree;

fn build(code: &str) -> Tree {
    builder::parse(code).expect("source builds")
}

fn body(tree: &Tree) -> Vec<Arc<Node>> {
    tree.module().expect("module root").body.to_vec()
}

#[test]
fn if_elif_else_shapes() {
    let tree = build(indoc! {"

        if 0:
            print()

        if True:
            print()
        else:
            pass

        if '':
            print()
        elif []:
            raise

        if 1:
            print()
        elif True:
            print()
        elif func():
            pass
        else:
            raise
    "});
    let stmts = body(&tree);
    assert_eq!(stmts.len(), 4);
    for stmt in &stmts {
        assert!(matches!(stmt.kind, NodeKind::If { .. }));
    }
    let NodeKind::If { orelse, .. } = &stmts[0].kind else {
        unreachable!();
    };
    assert!(orelse.is_empty());
    let NodeKind::If { orelse, .. } = &stmts[1].kind else {
        unreachable!();
    };
    assert!(matches!(orelse[0].kind, NodeKind::Pass));
    let NodeKind::If { orelse, .. } = &stmts[2].kind else {
        unreachable!();
    };
    assert!(matches!(orelse[0].kind, NodeKind::If { .. }));
    let NodeKind::If { orelse, .. } = &stmts[3].kind else {
        unreachable!();
    };
    let NodeKind::If { orelse: nested, .. } = &orelse[0].kind else {
        panic!("expected a nested elif chain");
    };
    assert!(matches!(nested[0].kind, NodeKind::If { .. }));
}

#[test]
fn if_block_ranges() {
    let tree = build(indoc! {"

        if 0:
            print()

        if True:
            print()
        else:
            pass
    "});
    let stmts = body(&tree);
    assert_eq!(block_range(tree.root(), 1), (0, 8));
    let if_else = &stmts[1];
    assert_eq!(block_range(if_else, 5), (5, 6));
    assert_eq!(block_range(if_else, 6), (6, 6));
    let NodeKind::If { orelse, .. } = &if_else.kind else {
        unreachable!();
    };
    assert_eq!(block_range(&orelse[0], 7), (7, 8));
    assert_eq!(block_range(&orelse[0], 8), (8, 8));
}

#[test]
fn while_and_for_block_ranges() {
    let tree = build(indoc! {"

        while cond:
            print()
        else:
            done()
    "});
    let while_node = &body(&tree)[0];
    assert_eq!(block_range(while_node, 2), (2, 2));
    assert_eq!(block_range(while_node, 3), (3, 4));
    assert_eq!(block_range(while_node, 4), (4, 4));
    assert_eq!(block_range(while_node, 5), (5, 5));

    let tree = build(indoc! {"

        for x in xs:
            print(x)
    "});
    let for_node = &body(&tree)[0];
    assert_eq!(block_range(for_node, 2), (2, 2));
    assert_eq!(block_range(for_node, 3), (3, 3));
}

#[test]
fn try_except_block_ranges() {
    let tree = build(indoc! {"

        try:
            print('pouet')
        except IOError:
            pass
        except UnicodeError:
            print()
        else:
            print()
    "});
    let try_node = &body(&tree)[0];
    assert!(matches!(try_node.kind, NodeKind::TryExcept { .. }));
    assert_eq!(block_range(try_node, 1), (1, 8));
    assert_eq!(block_range(try_node, 2), (2, 2));
    assert_eq!(block_range(try_node, 3), (3, 8));
    assert_eq!(block_range(try_node, 4), (4, 4));
    assert_eq!(block_range(try_node, 5), (5, 5));
    assert_eq!(block_range(try_node, 6), (6, 6));
    assert_eq!(block_range(try_node, 7), (7, 7));
    assert_eq!(block_range(try_node, 8), (8, 8));
}

#[test]
fn try_finally_block_ranges() {
    let tree = build(indoc! {"

        try:
            print('pouet')
        finally:
            print('pouet')
    "});
    let try_node = &body(&tree)[0];
    assert!(matches!(try_node.kind, NodeKind::TryFinally { .. }));
    assert_eq!(block_range(try_node, 1), (1, 4));
    assert_eq!(block_range(try_node, 2), (2, 2));
    assert_eq!(block_range(try_node, 3), (3, 4));
    assert_eq!(block_range(try_node, 4), (4, 4));
}

#[test]
fn collapsed_try_except_finally_delegates_to_the_inner_block() {
    let tree = build(indoc! {"

        try:
            print('pouet')
        except Exception:
            print('oops')
        finally:
            print('pouet')
    "});
    let try_node = &body(&tree)[0];
    assert!(matches!(try_node.kind, NodeKind::TryFinally { .. }));
    assert_eq!(block_range(try_node, 1), (1, 6));
    assert_eq!(block_range(try_node, 2), (2, 2));
    assert_eq!(block_range(try_node, 3), (3, 4));
    assert_eq!(block_range(try_node, 4), (4, 4));
    assert_eq!(block_range(try_node, 5), (5, 5));
    assert_eq!(block_range(try_node, 6), (6, 6));
}

#[test]
fn module_ranges_ignore_the_queried_line() {
    let tree = build("x = 1\ny = 2\n");
    assert_eq!(block_range(tree.root(), 1), (0, 2));
    assert_eq!(block_range(tree.root(), 2), (0, 2));
    assert_eq!(from_line(tree.root()), 0);
    assert_eq!(to_line(tree.root()), 2);
}

#[test]
fn definitions_answer_with_their_full_span() {
    let tree = build(indoc! {"
        def f(a):
            x = 1
            return x
    "});
    let func = &body(&tree)[0];
    assert_eq!(block_range(func, 1), (1, 3));
    assert_eq!(block_range(func, 2), (1, 3));
    assert_eq!(to_line(func), 3);
    assert_eq!(block_start_to_line(func), 1);
}

#[test]
fn decorators_shift_a_definition_start_line() {
    let tree = build(indoc! {"
        @decorator
        def f():
            return 1
    "});
    let func = &body(&tree)[0];
    assert_eq!(func.line(), Some(1));
    assert_eq!(from_line(func), 2);
    assert_eq!(block_range(func, 2), (2, 3));
}

#[test]
fn simple_statements_use_their_own_span() {
    let tree = build("x = (1 +\n     2)\n");
    let assign = &body(&tree)[0];
    assert_eq!(block_range(assign, 1), (1, 2));
    assert_eq!(to_line(assign), 2);
}

#[test]
fn block_start_lines_follow_the_header() {
    let tree = build(indoc! {"
        while (a and
               b):
            pass
    "});
    let while_node = &body(&tree)[0];
    assert_eq!(block_start_to_line(while_node), 2);
}
