// Build entry points: dedenting, failure modes, encoding detection.

use std::fs;
use std::path::PathBuf;

use arbor::builder::{self, dedent};
use arbor::nodes::NodeKind;
use arbor::{ErrorCategory, ErrorKind};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("arbor-builder-{}-{}", std::process::id(), name))
}

#[test]
fn indented_snippets_are_dedented_before_parsing() {
    let tree = builder::parse(
        "
        if condition:
            pass
    ",
    )
    .expect("indented snippet builds");
    let module = tree.module().expect("module root");
    assert_eq!(module.body.len(), 1);
    assert!(matches!(module.body[0].kind, NodeKind::If { .. }));
}

#[test]
fn dedent_keeps_relative_indentation() {
    let code = "    def f():\n        return 1\n";
    assert_eq!(dedent(code), "def f():\n    return 1\n");
    assert_eq!(dedent("x = 1\n"), "x = 1\n");
}

#[test]
fn syntax_errors_carry_category_and_source_context() {
    let err = builder::build_text("def f(:\n    pass\n", "broken", None).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Syntax);
    assert!(err.is_building_failure());
    assert!(matches!(err.kind, ErrorKind::Syntax { .. }));
    assert_eq!(err.source_info.module.as_deref(), Some("broken"));
    assert!(err.source_info.source.is_some());
    assert_eq!(err.diagnostic_info.error_code, "arbor::build::syntax");
    let message = err.to_string();
    assert!(message.contains("broken"));
}

#[test]
fn unreadable_files_fail_with_a_building_error() {
    let err = builder::build_file(
        std::path::Path::new("/nonexistent/arbor/missing.py"),
        "missing",
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Building);
    assert!(matches!(err.kind, ErrorKind::Building { .. }));
    assert_eq!(err.source_info.module.as_deref(), Some("missing"));
    assert!(err.source_info.path.is_some());
}

#[test]
fn declared_encodings_are_honored() {
    let path = temp_path("latin.py");
    fs::write(&path, b"# -*- coding: latin-1 -*-\nx = 'caf\xe9'\n").unwrap();
    let tree = builder::build_file(&path, "latin").expect("latin-1 source builds");
    let module = tree.module().expect("module root");
    assert_eq!(module.file_encoding.as_deref(), Some("latin-1"));
    let _ = fs::remove_file(&path);
}

#[test]
fn unknown_encoding_declarations_fail_the_build() {
    let path = temp_path("bogus.py");
    fs::write(&path, b"# -*- coding: not-a-codec -*-\nx = 1\n").unwrap();
    let err = builder::build_file(&path, "bogus").unwrap_err();
    assert!(matches!(
        &err.kind,
        ErrorKind::UnknownEncoding { declared } if declared == "not-a-codec"
    ));
    assert_eq!(err.category(), ErrorCategory::Building);
    let _ = fs::remove_file(&path);
}

#[test]
fn contradictory_encoding_declarations_fail_the_build() {
    let path = temp_path("mismatch.py");
    let mut bytes = vec![0xef, 0xbb, 0xbf];
    bytes.extend_from_slice(b"# -*- coding: latin-1 -*-\nx = 1\n");
    fs::write(&path, &bytes).unwrap();
    let err = builder::build_file(&path, "mismatch").unwrap_err();
    assert!(matches!(
        &err.kind,
        ErrorKind::EncodingMismatch { declared, .. } if declared == "latin-1"
    ));
    let _ = fs::remove_file(&path);
}

#[test]
fn a_utf8_bom_is_stripped_before_parsing() {
    let path = temp_path("bom.py");
    let mut bytes = vec![0xef, 0xbb, 0xbf];
    bytes.extend_from_slice(b"x = 1\n");
    fs::write(&path, &bytes).unwrap();
    let tree = builder::build_file(&path, "bom").expect("bom-prefixed source builds");
    assert_eq!(tree.module().unwrap().body.len(), 1);
    let _ = fs::remove_file(&path);
}

#[test]
fn built_files_record_name_and_path() {
    let path = temp_path("recorded.py");
    fs::write(&path, b"value = 1\n").unwrap();
    let tree = builder::build_file(&path, "recorded").expect("file builds");
    let module = tree.module().expect("module root");
    assert_eq!(module.name, "recorded");
    assert_eq!(module.source_file.as_deref(), Some(path.as_path()));
    assert!(module.source_code.is_some());
    let _ = fs::remove_file(&path);
}

#[test]
fn a_failed_build_yields_no_tree_at_all() {
    let result = builder::build_text("if while\n", "nope", None);
    assert!(result.is_err());
}
