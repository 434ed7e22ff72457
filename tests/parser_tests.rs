// Parser and lexer: raw-tree shapes, layout handling, literals.

use indoc::indoc;

use arbor::parse::{parse_module, ParseError};
use arbor::raw::{RawField, RawNode};

fn parse(code: &str) -> RawNode {
    parse_module(code).expect("source parses")
}

fn body(raw: &RawNode) -> &[RawNode] {
    raw.seq("body").expect("module body")
}

#[test]
fn a_simple_assignment_produces_the_expected_raw_shape() {
    let module = parse("x = 1\n");
    assert_eq!(module.kind, "Module");
    let stmts = body(&module);
    assert_eq!(stmts.len(), 1);
    let assign = &stmts[0];
    assert_eq!(assign.kind, "Assign");
    let targets = assign.seq("targets").unwrap();
    assert_eq!(targets[0].kind, "Name");
    assert_eq!(targets[0].opt_text("ctx"), Some("Store"));
    let value = assign.child("value").unwrap();
    assert_eq!(value.kind, "Num");
    assert_eq!(value.opt_int("i"), Some(1));
}

#[test]
fn positions_are_line_and_column_accurate() {
    let module = parse("x = 1\ny   = 2\n");
    let stmts = body(&module);
    let first = stmts[0].position.expect("statement position");
    assert_eq!((first.line, first.column), (1, 0));
    let second = stmts[1].position.expect("statement position");
    assert_eq!((second.line, second.column), (2, 0));
    let value = stmts[1].child("value").unwrap().position.unwrap();
    assert_eq!((value.line, value.column), (2, 6));
}

#[test]
fn blank_lines_and_comments_do_not_produce_statements() {
    let module = parse(indoc! {"
        # leading comment

        x = 1

        # trailing comment
        y = 2
    "});
    assert_eq!(body(&module).len(), 2);
}

#[test]
fn brackets_suppress_newlines() {
    let module = parse(indoc! {"
        x = [1,
             2,
             3]
        y = (1 +
             2)
    "});
    let stmts = body(&module);
    assert_eq!(stmts.len(), 2);
    let list = stmts[0].child("value").unwrap();
    assert_eq!(list.kind, "List");
    assert_eq!(list.seq("elts").unwrap().len(), 3);
}

#[test]
fn semicolons_split_simple_statements() {
    let module = parse("a = 1; b = 2; c = 3\n");
    assert_eq!(body(&module).len(), 3);
}

#[test]
fn backslash_continuations_join_lines() {
    let module = parse("total = 1 + \\\n    2\n");
    let stmts = body(&module);
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, "Assign");
}

#[test]
fn indentation_errors_are_reported() {
    let err = parse_module("if x:\npass\n").unwrap_err();
    assert!(matches!(err, ParseError::Unexpected { .. }));

    let err = parse_module("if x:\n    a = 1\n  b = 2\n").unwrap_err();
    let (line, _) = err.position();
    assert_eq!(line, 3);
}

#[test]
fn number_literals() {
    let module = parse("a = 0xFF\nb = 0o17\nc = 0b101\nd = 1_000\ne = 1.5e2\nf = 2j\n");
    let stmts = body(&module);
    let int_of = |raw: &RawNode| raw.child("value").unwrap().opt_int("i").unwrap();
    assert_eq!(int_of(&stmts[0]), 255);
    assert_eq!(int_of(&stmts[1]), 15);
    assert_eq!(int_of(&stmts[2]), 5);
    assert_eq!(int_of(&stmts[3]), 1000);
    assert_eq!(stmts[4].child("value").unwrap().opt_float("f"), Some(150.0));
    assert_eq!(stmts[5].child("value").unwrap().opt_float("j"), Some(2.0));
}

#[test]
fn string_literals_and_concatenation() {
    let module = parse("a = 'one' \"two\"\n");
    let value = body(&module)[0].child("value").unwrap();
    assert_eq!(value.kind, "Str");
    assert_eq!(value.opt_text("s"), Some("onetwo"));

    let module = parse(r"a = 'tab\there'
");
    let value = body(&module)[0].child("value").unwrap();
    assert_eq!(value.opt_text("s"), Some("tab\there"));

    let module = parse("a = r'raw\\n'\n");
    let value = body(&module)[0].child("value").unwrap();
    assert_eq!(value.opt_text("s"), Some("raw\\n"));

    let module = parse("a = b'bytes'\n");
    let value = body(&module)[0].child("value").unwrap();
    assert_eq!(value.kind, "Bytes");
}

#[test]
fn triple_quoted_strings_span_lines() {
    let module = parse("a = '''line one\nline two'''\nb = 1\n");
    let stmts = body(&module);
    assert_eq!(stmts.len(), 2);
    let value = stmts[0].child("value").unwrap();
    assert_eq!(value.opt_text("s"), Some("line one\nline two"));
}

#[test]
fn import_forms() {
    let module = parse(indoc! {"
        import os, sys as system
        from os import path as p, sep
        from . import sibling
        from ...pkg import thing
        from os import *
    "});
    let stmts = body(&module);
    assert_eq!(stmts[0].kind, "Import");
    let names = stmts[0].seq("names").unwrap();
    assert_eq!(names[1].opt_text("asname"), Some("system"));

    assert_eq!(stmts[1].kind, "ImportFrom");
    assert_eq!(stmts[1].opt_text("module"), Some("os"));
    assert_eq!(stmts[1].opt_int("level"), Some(0));

    assert_eq!(stmts[2].opt_int("level"), Some(1));
    assert_eq!(stmts[2].opt_text("module"), None);

    assert_eq!(stmts[3].opt_int("level"), Some(3));
    assert_eq!(stmts[3].opt_text("module"), Some("pkg"));

    let star = stmts[4].seq("names").unwrap();
    assert_eq!(star[0].opt_text("name"), Some("*"));
}

#[test]
fn compound_statement_raw_kinds() {
    let module = parse(indoc! {"
        async def f():
            async with ctx as c:
                pass
            async for i in it:
                await g()
    "});
    let func = &body(&module)[0];
    assert_eq!(func.kind, "AsyncFunctionDef");
    let inner = func.seq("body").unwrap();
    assert_eq!(inner[0].kind, "AsyncWith");
    assert_eq!(inner[1].kind, "AsyncFor");
    let await_stmt = &inner[1].seq("body").unwrap()[0];
    assert_eq!(await_stmt.child("value").unwrap().kind, "Await");
}

#[test]
fn lambda_and_conditional_expressions() {
    let module = parse("f = lambda a, b=1: a if cond else b\n");
    let value = body(&module)[0].child("value").unwrap();
    assert_eq!(value.kind, "Lambda");
    assert_eq!(value.child("body").unwrap().kind, "IfExp");
    let args = value.child("args").unwrap();
    assert_eq!(args.seq("args").unwrap().len(), 2);
    assert_eq!(args.seq("defaults").unwrap().len(), 1);
}

#[test]
fn starred_assignment_targets_switch_context() {
    let module = parse("first, *rest = items\n");
    let assign = &body(&module)[0];
    let target = assign.seq("targets").unwrap();
    assert_eq!(target[0].kind, "Tuple");
    assert_eq!(target[0].opt_text("ctx"), Some("Store"));
    let elts = target[0].seq("elts").unwrap();
    assert_eq!(elts[0].opt_text("ctx"), Some("Store"));
    assert_eq!(elts[1].kind, "Starred");
    assert_eq!(elts[1].opt_text("ctx"), Some("Store"));
    assert_eq!(elts[1].child("value").unwrap().opt_text("ctx"), Some("Store"));
}

#[test]
fn yield_forms() {
    let module = parse(indoc! {"
        def g():
            yield
            yield 1
            yield from src
            x = yield 2
    "});
    let func_body = body(&module)[0].seq("body").unwrap();
    assert_eq!(func_body[0].child("value").unwrap().kind, "Yield");
    assert!(func_body[0]
        .child("value")
        .unwrap()
        .opt_child("value")
        .is_none());
    assert_eq!(func_body[1].child("value").unwrap().kind, "Yield");
    assert_eq!(func_body[2].child("value").unwrap().kind, "YieldFrom");
    assert_eq!(func_body[3].kind, "Assign");
    assert_eq!(func_body[3].child("value").unwrap().kind, "Yield");
}

#[test]
fn comprehension_clause_shapes() {
    let module = parse("out = [x * 2 for x in xs if x > 0 if x < 10]\n");
    let comp = body(&module)[0].child("value").unwrap();
    assert_eq!(comp.kind, "ListComp");
    let generators = comp.seq("generators").unwrap();
    assert_eq!(generators.len(), 1);
    assert_eq!(generators[0].kind, "comprehension");
    assert_eq!(generators[0].seq("ifs").unwrap().len(), 2);
    assert_eq!(
        generators[0].child("target").unwrap().opt_text("ctx"),
        Some("Store")
    );
}

#[test]
fn global_and_nonlocal_carry_name_lists() {
    let module = parse("def f():\n    global a, b\n    nonlocal c\n");
    let inner = body(&module)[0].seq("body").unwrap();
    assert_eq!(
        inner[0].texts("names").unwrap(),
        &["a".to_string(), "b".to_string()]
    );
    assert_eq!(inner[1].texts("names").unwrap(), &["c".to_string()]);
}

#[test]
fn unterminated_strings_fail() {
    assert!(parse_module("x = 'oops\n").is_err());
    assert!(parse_module("x = '''oops\n").is_err());
}
