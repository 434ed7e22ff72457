// Scope resolution: the default parent walk and every parent-position
// special case, over tree locations and zipper cursors alike.

use std::sync::Arc;

use indoc::indoc;

use arbor::builder;
use arbor::nodes::{Dialect, Field, Node, NodeKind};
use arbor::parse::parse_module;
use arbor::rebuild::Rebuilder;
use arbor::Tree;

fn build(code: &str) -> Tree {
    builder::parse(code).expect("source builds")
}

fn build_with_dialect(code: &str, dialect: Dialect) -> Tree {
    let raw = parse_module(code).expect("source parses");
    let mut rebuilder = Rebuilder::new(dialect);
    let module = rebuilder
        .module(&raw, "m", None, false, None, None)
        .expect("raw tree rebuilds");
    Tree::new(module, dialect)
}

fn find(tree: &Tree, pred: impl Fn(&Arc<Node>) -> bool) -> Arc<Node> {
    let mut stack = vec![tree.root().clone()];
    while let Some(node) = stack.pop() {
        if pred(&node) {
            return node;
        }
        for field in node.children() {
            match field {
                Field::Node(child) => {
                    if !child.is_empty() {
                        stack.push(child);
                    }
                }
                Field::Seq(children) => stack.extend(children.iter().cloned()),
            }
        }
    }
    panic!("no matching node in tree");
}

fn named(tree: &Tree, name: &str) -> Arc<Node> {
    find(tree, |n| {
        matches!(&n.kind, NodeKind::Name { name: found } if found == name)
    })
}

fn scope_is_module(tree: &Tree, node: &Arc<Node>) {
    let scope = tree.scope_of(node).expect("scope resolves");
    assert!(
        Arc::ptr_eq(&scope, tree.root()),
        "expected module scope, got {}",
        scope.kind_name()
    );
}

#[test]
fn parameter_defaults_resolve_outside_the_function() {
    let tree = build("def test(a=b):\n    pass\n");
    let default = named(&tree, "b");
    scope_is_module(&tree, &default);
}

#[test]
fn names_in_a_function_body_resolve_to_the_function() {
    let tree = build("def test(a=b):\n    return c\n");
    let inner = named(&tree, "c");
    let scope = tree.scope_of(&inner).expect("scope resolves");
    assert!(matches!(&scope.kind, NodeKind::FunctionDef { name, .. } if name == "test"));
}

#[test]
fn parameter_annotations_resolve_outside_the_function() {
    let tree = build("def f(x: anno):\n    pass\n");
    scope_is_module(&tree, &named(&tree, "anno"));
}

#[test]
fn return_annotations_resolve_outside_the_function() {
    let tree = build("def f() -> anno:\n    pass\n");
    scope_is_module(&tree, &named(&tree, "anno"));
}

#[test]
fn lambda_defaults_resolve_outside_the_lambda() {
    let tree = build("f = lambda x=outer: x\n");
    scope_is_module(&tree, &named(&tree, "outer"));
}

#[test]
fn scope_nodes_are_their_own_scope() {
    let tree = build("def f():\n    pass\n");
    let func = find(&tree, |n| matches!(n.kind, NodeKind::FunctionDef { .. }));
    let scope = tree.scope_of(&func).expect("scope resolves");
    assert!(Arc::ptr_eq(&scope, &func));
    let scope = tree.scope_of(tree.root()).expect("scope resolves");
    assert!(Arc::ptr_eq(&scope, tree.root()));
}

#[test]
fn first_generator_iterable_resolves_outside_the_comprehension() {
    let tree = build("out = [x for x in source for y in other]\n");
    scope_is_module(&tree, &named(&tree, "source"));

    // Later clauses belong to the comprehension's own scope.
    let other = named(&tree, "other");
    let scope = tree.scope_of(&other).expect("scope resolves");
    assert!(matches!(scope.kind, NodeKind::ListComp { .. }));

    let elt = named(&tree, "x");
    let scope = tree.scope_of(&elt).expect("scope resolves");
    assert!(matches!(scope.kind, NodeKind::ListComp { .. }));
}

#[test]
fn generator_and_dict_comprehensions_scope_like_list_comprehensions() {
    let tree = build("out = (x for x in source)\n");
    scope_is_module(&tree, &named(&tree, "source"));
    let elt = named(&tree, "x");
    let scope = tree.scope_of(&elt).expect("scope resolves");
    assert!(matches!(scope.kind, NodeKind::GeneratorExp { .. }));

    let tree = build("out = {k: v for k in source}\n");
    scope_is_module(&tree, &named(&tree, "source"));
    let value = named(&tree, "v");
    let scope = tree.scope_of(&value).expect("scope resolves");
    assert!(matches!(scope.kind, NodeKind::DictComp { .. }));
}

#[test]
fn historical_list_comprehensions_leak_into_the_enclosing_scope() {
    let code = "out = [x for x in source]\n";

    let py3 = build_with_dialect(code, Dialect::Python3);
    let elt = named(&py3, "x");
    let scope = py3.scope_of(&elt).expect("scope resolves");
    assert!(matches!(scope.kind, NodeKind::ListComp { .. }));

    let py2 = build_with_dialect(code, Dialect::Python2);
    let elt = named(&py2, "x");
    scope_is_module(&py2, &elt);
    let target = find(&py2, |n| {
        matches!(&n.kind, NodeKind::AssignName { name } if name == "x")
    });
    scope_is_module(&py2, &target);
}

#[test]
fn decorators_resolve_outside_the_decorated_definition() {
    let tree = build(indoc! {"
        @marker
        def f():
            pass
    "});
    scope_is_module(&tree, &named(&tree, "marker"));

    let tree = build(indoc! {"
        class C:
            @marker
            def meth(self):
                pass
    "});
    let marker = named(&tree, "marker");
    let scope = tree.scope_of(&marker).expect("scope resolves");
    assert!(matches!(&scope.kind, NodeKind::ClassDef { name, .. } if name == "C"));
}

#[test]
fn class_bodies_are_scopes() {
    let tree = build("class C:\n    attr = value\n");
    let value = named(&tree, "value");
    let scope = tree.scope_of(&value).expect("scope resolves");
    assert!(matches!(&scope.kind, NodeKind::ClassDef { name, .. } if name == "C"));
}

#[test]
fn zipper_cursors_resolve_the_same_scopes() {
    let tree = build("def test(a=b):\n    pass\n");
    let target = named(&tree, "b");
    let mut found = None;
    for cursor in tree.cursor().preorder_descendants(|_| false) {
        if let Some(node) = cursor.node() {
            if Arc::ptr_eq(node, &target) {
                found = Some(cursor);
                break;
            }
        }
    }
    let cursor = found.expect("cursor reaches the default value");
    let scope = cursor.scope(Dialect::Python3).expect("scope resolves");
    assert!(matches!(
        scope.node().map(|n| &n.kind),
        Some(NodeKind::Module(_))
    ));
}

#[test]
fn assign_type_walks_to_the_binding_statement() {
    let tree = build("for x in xs:\n    pass\n");
    let target = find(&tree, |n| {
        matches!(&n.kind, NodeKind::AssignName { name } if name == "x")
    });
    let binding = tree.assign_type(&target);
    assert!(matches!(binding.kind, NodeKind::For { .. }));

    let tree = build("with ctx as handle:\n    pass\n");
    let target = find(&tree, |n| {
        matches!(&n.kind, NodeKind::AssignName { name } if name == "handle")
    });
    let binding = tree.assign_type(&target);
    assert!(matches!(binding.kind, NodeKind::With { .. }));

    let tree = build("x = 1\n");
    let target = find(&tree, |n| {
        matches!(&n.kind, NodeKind::AssignName { name } if name == "x")
    });
    let binding = tree.assign_type(&target);
    assert!(matches!(binding.kind, NodeKind::Assign { .. }));
}

#[test]
fn qualified_names_and_frames() {
    let tree = builder::build_text(
        indoc! {"
            class A:
                def meth(self):
                    return lambda: 1
        "},
        "mod",
        None,
    )
    .expect("source builds");
    let meth = find(&tree, |n| {
        matches!(&n.kind, NodeKind::FunctionDef { name, .. } if name == "meth")
    });
    assert_eq!(tree.qualified_name(&meth).unwrap(), "mod.A.meth");

    let param = find(&tree, |n| {
        matches!(&n.kind, NodeKind::Parameter { name, .. } if name == "self")
    });
    let err = tree.qualified_name(&param).unwrap_err();
    assert!(matches!(err.kind, arbor::ErrorKind::NotSupported { .. }));

    let ret = find(&tree, |n| matches!(n.kind, NodeKind::Return { .. }));
    let frame = tree.frame_of(&ret).expect("frame resolves");
    assert!(Arc::ptr_eq(&frame, &meth));

    let lambda = find(&tree, |n| matches!(n.kind, NodeKind::Lambda { .. }));
    let stmt = tree.statement_of(&lambda).expect("statement resolves");
    assert!(matches!(stmt.kind, NodeKind::Return { .. }));
}
