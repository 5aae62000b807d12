//! Binary-level tests: argument handling, project resolution, and reset.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A minimal solution: a production package and a test package.
fn write_solution(root: &Path) -> PathBuf {
    let calc = root.join("calc");
    fs::create_dir_all(calc.join("src")).unwrap();
    fs::write(
        calc.join("Cargo.toml"),
        "[package]\nname = \"calc\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
    )
    .unwrap();
    fs::write(
        calc.join("src/lib.rs"),
        "pub fn add(a: i32, b: i32) -> i32 {\n    let sum = a + b;\n    sum\n}\n",
    )
    .unwrap();

    let tests = root.join("calc-tests");
    fs::create_dir_all(tests.join("tests")).unwrap();
    fs::write(
        tests.join("Cargo.toml"),
        "[package]\nname = \"calc-tests\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
    )
    .unwrap();
    fs::write(
        tests.join("tests/arith.rs"),
        "#[test]\nfn test_add() {\n    assert_eq!(1 + 1, 2);\n}\n",
    )
    .unwrap();

    calc.join("src")
}

#[test]
fn test_usage_without_arguments() {
    Command::cargo_bin("culpar")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_missing_solution_dir_is_fatal() {
    Command::cargo_bin("culpar")
        .unwrap()
        .args(["/no/such/solution", "calc-tests", "calc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("path not found"));
}

#[test]
fn test_unresolved_project_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_solution(dir.path());
    Command::cargo_bin("culpar")
        .unwrap()
        .args([dir.path().to_str().unwrap(), "calc-tests", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no package named `ghost`"));
}

#[test]
fn test_reset_strips_probes_and_clears_coverage() {
    let dir = TempDir::new().unwrap();
    let prod_src = write_solution(dir.path());

    // Instrument the production tree and seed stale coverage data.
    let sink = dir.path().join("Coverage/__current.coverage.tmp");
    let stats = culpar::rewriter::instrument_tree(&prod_src, &sink);
    assert!(stats.probes > 0);
    let coverage_dir = dir.path().join("Coverage");
    fs::create_dir_all(&coverage_dir).unwrap();
    fs::write(coverage_dir.join("t.test_old.coverage"), "stale\n").unwrap();

    Command::cargo_bin("culpar")
        .unwrap()
        .current_dir(dir.path())
        .args([".", "calc-tests", "calc", "--reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reset:"));

    // No file under the production tree contains a recognised probe, and
    // the coverage directory is empty.
    for path in culpar::walk::rust_sources(&prod_src) {
        let text = fs::read_to_string(&path).unwrap();
        assert!(
            !culpar::probe::looks_like_probe(&text),
            "probe survived reset in {}",
            path.display()
        );
    }
    assert_eq!(fs::read_dir(&coverage_dir).unwrap().count(), 0);
}

#[test]
fn test_unknown_trailing_flag_is_warned_and_skipped() {
    let dir = TempDir::new().unwrap();
    write_solution(dir.path());

    let output = Command::cargo_bin("culpar")
        .unwrap()
        .current_dir(dir.path())
        .args([".", "calc-tests", "calc", "--reset", "--frobnicate"])
        .output()
        .unwrap();
    assert!(output.status.success(), "unknown flag should not abort");
    let all = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(all.contains("frobnicate"), "expected a warning, got: {all}");
}
