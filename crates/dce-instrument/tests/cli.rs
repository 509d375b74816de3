// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use assert_cmd::Command;
use dce_instrumenter::{pipeline::rewrite_source, Dialect, Stage};
use std::path::PathBuf;
use tempfile::TempDir;

const FOO: &str = "int foo(int a){ if (a>0) a=1; else a=0; return a; }\n";

fn write_input(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn read(path: &PathBuf) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn rewrites_files_in_place() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "foo.c", FOO);
    Command::cargo_bin("dce-instrument")
        .unwrap()
        .arg(&input)
        .assert()
        .success();

    let expected = rewrite_source(
        FOO,
        Dialect::C,
        &[Stage::Canonicalize, Stage::MakeGlobalsStatic, Stage::Instrument],
    )
    .unwrap();
    let output = read(&input);
    assert_eq!(output, expected);
    assert!(output.starts_with("void DCEMarker0_(void);\nvoid DCEMarker1_(void);\n"));
    assert!(output.contains("static int foo"));
}

#[test]
fn dry_run_prints_without_writing() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "foo.c", FOO);
    let assert = Command::cargo_bin("dce-instrument")
        .unwrap()
        .arg("--dry-run")
        .arg(&input)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("DCEMarker1_();"));
    assert_eq!(read(&input), FOO);
}

#[test]
fn stages_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "foo.c", FOO);
    Command::cargo_bin("dce-instrument")
        .unwrap()
        .args(["--no-instrument", "--no-static"])
        .arg(&input)
        .assert()
        .success();
    assert_eq!(
        read(&input),
        "int foo(int a){ if (a>0) {a=1;} else {a=0;} return a; }\n"
    );
}

#[test]
fn config_file_is_honored() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "foo.c", FOO);
    let config = write_input(&dir, "dce.toml", "instrument = false\ncanonicalize = false\n");
    Command::cargo_bin("dce-instrument")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg(&input)
        .assert()
        .success();
    assert_eq!(read(&input), format!("static {}", FOO));
}

#[test]
fn compiler_arguments_are_ignored() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "foo.c", FOO);
    Command::cargo_bin("dce-instrument")
        .unwrap()
        .args(["--extra-arg=-O2", "-v"])
        .arg(&input)
        .args(["--", "-I/usr/include", "-DNDEBUG"])
        .assert()
        .success();
    assert!(read(&input).contains("DCEMarker0_();"));
}

#[test]
fn parse_errors_leave_files_untouched() {
    let dir = TempDir::new().unwrap();
    let good = write_input(&dir, "good.c", FOO);
    let bad = write_input(&dir, "bad.c", "int f( { return ; }\n");
    let assert = Command::cargo_bin("dce-instrument")
        .unwrap()
        .arg(&good)
        .arg(&bad)
        .assert()
        .failure()
        .code(1);
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("could not be parsed"));
    assert_eq!(read(&good), FOO);
    assert_eq!(read(&bad), "int f( { return ; }\n");
}

#[test]
fn missing_input_is_reported() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("dce-instrument")
        .unwrap()
        .arg(dir.path().join("absent.c"))
        .assert()
        .failure()
        .code(1);
}

#[test]
fn static_annotator_only_annotates() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "globals.cpp", "int x = 1;\nstatic int y;\nint main() { if (x) return y; return 0; }\n");
    Command::cargo_bin("static-annotator")
        .unwrap()
        .arg(&input)
        .assert()
        .success();
    assert_eq!(
        read(&input),
        "static int x = 1;\nstatic int y;\nint main() { if (x) return y; return 0; }\n"
    );
}
