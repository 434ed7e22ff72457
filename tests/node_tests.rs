// Node model: equality, field introspection, module behavior, display.

use std::io::Read;
use std::sync::Arc;

use indoc::indoc;

use arbor::builder;
use arbor::nodes::display::{to_display_string, DisplayOptions};
use arbor::nodes::{empty, seq, Dialect, Field, LiteralValue, Node, NodeKind};
use arbor::{ErrorCategory, ErrorKind, Tree};

fn build(code: &str) -> Tree {
    builder::parse(code).expect("source builds")
}

fn body(tree: &Tree) -> Vec<Arc<Node>> {
    tree.module().expect("module root").body.to_vec()
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

#[test]
fn structural_equality_ignores_positions() {
    let first = build("x = 1 + 2\n");
    let second = build("x = 1 + 2\n");
    assert_eq!(first.root(), second.root());

    let third = build("x = 1 + 3\n");
    assert_ne!(first.root(), third.root());
}

#[test]
fn equality_is_variant_sensitive() {
    let constant = Node::new(
        NodeKind::Const {
            value: LiteralValue::Bool(true),
        },
        None,
    );
    let singleton = Node::new(
        NodeKind::NameConstant {
            value: LiteralValue::Bool(true),
        },
        None,
    );
    assert_ne!(constant, singleton);

    let read = Node::new(
        NodeKind::Name {
            name: "x".to_string(),
        },
        None,
    );
    let bind = Node::new(
        NodeKind::AssignName {
            name: "x".to_string(),
        },
        None,
    );
    assert_ne!(read, bind);
}

#[test]
fn empty_compares_equal_only_to_itself() {
    assert_eq!(empty(), empty());
    let pass = Node::new(NodeKind::Pass, None);
    assert_ne!(empty(), pass);
    assert!(empty().is_empty());
}

#[test]
fn every_child_knows_its_parent() {
    let tree = build(indoc! {"
        def f(a, b=1):
            return a + b

        class C(object):
            x = [1, 2]
    "});
    let mut stack = vec![tree.root().clone()];
    while let Some(node) = stack.pop() {
        for field in node.children() {
            match field {
                Field::Node(child) => {
                    if !child.is_empty() {
                        let parent = tree.parent_of(&child).expect("child has a parent");
                        assert!(Arc::ptr_eq(parent, &node));
                        stack.push(child);
                    }
                }
                Field::Seq(children) => {
                    for child in children.iter() {
                        let parent = tree.parent_of(child).expect("child has a parent");
                        assert!(Arc::ptr_eq(parent, &node));
                        stack.push(child.clone());
                    }
                }
            }
        }
    }
    assert!(tree.parent_of(tree.root()).is_none());
}

#[test]
fn last_child_is_the_last_non_empty_field_entry() {
    let tree = build(indoc! {"
        if x:
            pass
            return
    "});
    let if_node = body(&tree)[0].clone();
    let last = if_node.last_child().expect("if has children");
    assert!(matches!(last.kind, NodeKind::Return { .. }));

    // A bare return holds only Empty, so it has no last child.
    let ret = find(&tree, |n| matches!(n.kind, NodeKind::Return { .. }));
    assert!(ret.last_child().is_none());
}

#[test]
fn repr_names_come_from_name_or_attribute_fields() {
    let tree = build("def f():\n    obj.attr = 1\n");
    let func = body(&tree)[0].clone();
    assert_eq!(func.repr_name(), Some("f"));
    let target = find(&tree, |n| matches!(n.kind, NodeKind::AssignAttr { .. }));
    assert_eq!(target.repr_name(), Some("attr"));
    let pass = Node::new(NodeKind::Pass, None);
    assert_eq!(pass.repr_name(), None);
}

#[test]
fn child_field_names_match_children() {
    let tree = build("for i in xs:\n    pass\n");
    let for_node = body(&tree)[0].clone();
    assert_eq!(
        for_node.child_field_names(),
        &["target", "iter", "body", "orelse"]
    );
    assert_eq!(for_node.children().len(), 4);
}

#[test]
fn module_docstring_is_extracted_from_the_body() {
    let tree = build("'''module doc'''\nx = 1\n");
    let module = tree.module().expect("module root");
    assert_eq!(module.doc.as_deref(), Some("module doc"));
    assert_eq!(module.body.len(), 1);
    assert!(matches!(module.body[0].kind, NodeKind::Assign { .. }));
}

#[test]
fn future_imports_scan_stops_at_the_first_plain_statement() {
    let tree = build(indoc! {"
        '''doc'''
        from __future__ import division
        from __future__ import print_function
        import os
        from __future__ import with_statement
    "});
    let module = tree.module().expect("module root");
    let futures = module.future_imports();
    assert!(futures.contains("division"));
    assert!(futures.contains("print_function"));
    assert!(!futures.contains("with_statement"));
    assert_eq!(futures.len(), 2);
}

#[test]
fn relative_import_resolution() {
    let tree = builder::build_text("", "a.b.c", None).expect("empty module builds");
    let module = tree.module().expect("module root");
    assert_eq!(
        module
            .relative_to_absolute_name("d", Some(1), Dialect::Python3)
            .unwrap(),
        "a.b.d"
    );
    assert_eq!(
        module
            .relative_to_absolute_name("d", None, Dialect::Python3)
            .unwrap(),
        "d"
    );

    let err = module
        .relative_to_absolute_name("d", Some(5), Dialect::Python3)
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TooManyLevels { level: 5, .. }));
    assert_eq!(err.category(), ErrorCategory::Query);
}

#[test]
fn package_modules_resolve_relative_imports_from_themselves() {
    let tree = builder::build_text("", "pkg.__init__", None).expect("package builds");
    let module = tree.module().expect("module root");
    assert!(module.package);
    assert_eq!(module.name, "pkg");
    assert_eq!(
        module
            .relative_to_absolute_name("sub", Some(1), Dialect::Python3)
            .unwrap(),
        "pkg.sub"
    );
}

#[test]
fn source_stream_returns_the_module_bytes() {
    let tree = build("x = 1\n");
    let module = tree.module().expect("module root");
    let mut stream = module.source_stream().expect("stream opens");
    let mut contents = String::new();
    stream
        .read_to_string(&mut contents)
        .expect("stream is readable");
    assert_eq!(contents, "x = 1\n");
}

#[test]
fn arguments_defaults_and_names() {
    let tree = build("def f(a, b=2, *rest, c=3, **kw):\n    pass\n");
    let args = find(&tree, |n| matches!(n.kind, NodeKind::Arguments(_)));
    let NodeKind::Arguments(arguments) = &args.kind else {
        unreachable!();
    };
    assert_eq!(arguments.argnames(), vec!["a", "b", "rest", "kw", "c"]);
    assert!(arguments.is_argument("rest"));
    assert!(arguments.is_argument("kw"));
    assert!(!arguments.is_argument("missing"));

    let default = arguments.default_value("b", "f").expect("b has a default");
    assert!(matches!(
        default.kind,
        NodeKind::Const {
            value: LiteralValue::Int(2)
        }
    ));

    let err = arguments.default_value("a", "f").unwrap_err();
    assert!(matches!(
        &err.kind,
        ErrorKind::NoDefault { function, argument }
            if function == "f" && argument == "a"
    ));
    assert_eq!(err.category(), ErrorCategory::Query);

    let formatted = arguments.format_args();
    assert!(formatted.contains("a"));
    assert!(formatted.contains("*rest"));
    assert!(formatted.contains("**kw"));
}

#[test]
fn display_dump_shows_variants_and_fields() {
    let tree = build("x = 1\n");
    let dump = to_display_string(tree.root(), &DisplayOptions::default());
    assert!(dump.starts_with("Module("));
    assert!(dump.contains("Assign("));
    assert!(dump.contains("AssignName(name=\"x\")"));
    assert!(dump.contains("Const(value=1)"));
}

#[test]
fn display_dump_options() {
    let tree = build("def f(a):\n    pass\n");
    let with_ids = to_display_string(
        tree.root(),
        &DisplayOptions {
            ids: true,
            ..DisplayOptions::default()
        },
    );
    assert!(with_ids.contains("<0x"));

    let with_positions = to_display_string(
        tree.root(),
        &DisplayOptions {
            positions: true,
            ..DisplayOptions::default()
        },
    );
    assert!(with_positions.contains("lineno="));

    let shallow = to_display_string(
        tree.root(),
        &DisplayOptions {
            max_depth: 1,
            ..DisplayOptions::default()
        },
    );
    assert!(shallow.contains("..."));
    assert!(!shallow.contains("Parameter"));
}

#[test]
fn display_dump_marks_repeated_nodes_instead_of_recursing() {
    let shared = Node::new(
        NodeKind::Name {
            name: "x".to_string(),
        },
        None,
    );
    let assign = Node::new(
        NodeKind::Assign {
            targets: seq(vec![shared.clone()]),
            value: shared,
        },
        None,
    );
    let dump = to_display_string(&assign, &DisplayOptions::default());
    assert!(dump.contains("<Recursion on Name"));
}

#[test]
fn with_children_rebuilds_the_same_variant() {
    let tree = build("x = 1\n");
    let assign = body(&tree)[0].clone();
    let rebuilt = assign.with_children(assign.children());
    assert_eq!(&rebuilt, assign.as_ref());
}

#[test]
#[should_panic(expected = "child field shape mismatch")]
fn with_children_rejects_a_wrong_shape() {
    let tree = build("x = 1\n");
    let assign = body(&tree)[0].clone();
    assign.with_children(Vec::new());
}
