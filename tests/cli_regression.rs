// Regression test: CLI failures render miette diagnostics.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("arbor-cli-{}-{}", std::process::id(), name));
    fs::write(&path, contents).expect("fixture written");
    path
}

#[test]
fn cli_reports_diagnostics_on_syntax_errors() {
    let bad_file = temp_file("bad.py", "def broken(:\n    pass\n");

    let mut cmd = Command::cargo_bin("arbor").unwrap();
    cmd.arg("check").arg(&bad_file);
    cmd.assert().failure().stderr(contains("arbor::build"));

    let _ = fs::remove_file(&bad_file);
}

#[test]
fn cli_dumps_a_parsed_tree() {
    let good_file = temp_file("good.py", "x = 1\n");

    let mut cmd = Command::cargo_bin("arbor").unwrap();
    cmd.arg("dump").arg(&good_file);
    cmd.assert()
        .success()
        .stdout(contains("Module(").and(contains("Assign(")));

    let _ = fs::remove_file(&good_file);
}
