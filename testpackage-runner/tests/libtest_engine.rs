// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use pretty_assertions::assert_eq;
use std::{collections::BTreeMap, fs};
use testpackage_runner::{
    engine::{ExecuteResult, LibtestEngine, TestEngine},
    errors::{DiscoverError, EngineError},
    history::HistoryCounters,
    list::{TestCase, TestKey, TestList},
    sequencer::Sequencer,
};

/// Compiles the fixture into `workdir`, returning its path relative to `workdir`.
fn build_fixture(workdir: &Utf8Path) -> String {
    let source = Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures/libtest-fixture.rs");
    let package = format!(
        "bin/fixture_tests-0123456789abcdef{}",
        std::env::consts::EXE_SUFFIX
    );
    let output = workdir.join(&package);
    fs::create_dir_all(output.parent().unwrap()).unwrap();

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_owned());
    duct::cmd!(
        rustc,
        "--test",
        "--edition",
        "2021",
        source.as_str(),
        "-o",
        output.as_str()
    )
    .run()
    .expect("fixture compiled");
    package
}

fn discovered(test_list: &TestList) -> Vec<(String, String, bool)> {
    let mut discovered: Vec<_> = test_list
        .iter()
        .map(|test_case| {
            (
                test_case.class_name.clone(),
                test_case.method_name.clone(),
                test_case.ignored,
            )
        })
        .collect();
    discovered.sort();
    discovered
}

#[test]
fn discover_merges_ignored_listing() {
    let workdir = Utf8TempDir::new().unwrap();
    let package = build_fixture(workdir.path());

    let mut engine = LibtestEngine::new(workdir.path());
    let test_list = engine.discover(&[package]).unwrap();

    assert_eq!(
        discovered(&test_list),
        vec![
            ("fixture_tests::lexer".to_owned(), "tokens".to_owned(), false),
            ("fixture_tests::parser".to_owned(), "parses_empty".to_owned(), false),
            ("fixture_tests::parser".to_owned(), "parses_nested".to_owned(), false),
            ("fixture_tests::parser".to_owned(), "slow".to_owned(), true),
        ]
    );
}

#[test]
fn discover_missing_binary() {
    let workdir = Utf8TempDir::new().unwrap();

    let error = LibtestEngine::new(workdir.path())
        .discover(&["bin/does-not-exist".to_owned()])
        .unwrap_err();
    assert!(
        matches!(error, DiscoverError::CommandExec { .. }),
        "unexpected error: {error:?}"
    );
}

#[test]
fn execute_reports_passes_and_failures() {
    let workdir = Utf8TempDir::new().unwrap();
    let package = build_fixture(workdir.path());
    fs::write(workdir.path().join("failing.txt"), "parses_empty\nparses_nested\n").unwrap();

    let mut engine = LibtestEngine::new(workdir.path());
    let test_list = engine.discover(&[package]).unwrap();
    let plan = Sequencer::new(&HistoryCounters::new()).order(&test_list);

    let mut results: BTreeMap<String, ExecuteResult> = BTreeMap::new();
    for unit in plan.units().filter(|unit| !unit.method.ignored) {
        let result = engine.execute(unit).unwrap();
        results.insert(unit.method.name.clone(), result);
    }

    let tokens = &results["tokens"];
    assert!(tokens.is_success());
    let stdout = String::from_utf8_lossy(&tokens.stdout);
    assert!(stdout.contains("lexing fixture input"), "stdout: {stdout}");
    assert!(
        !stdout.contains("running 1 test") && !stdout.contains("test result:"),
        "harness lines are stripped: {stdout}"
    );

    let parses_empty = &results["parses_empty"];
    assert!(!parses_empty.is_success());
    assert_eq!(parses_empty.failures.len(), 1);
    assert_eq!(
        parses_empty.failures[0].message,
        "parses_empty was told to fail"
    );
    let location = parses_empty.failures[0]
        .location
        .as_deref()
        .expect("panic location is parsed");
    assert!(location.contains("libtest-fixture.rs"), "location: {location}");

    let parses_nested = &results["parses_nested"];
    assert!(!parses_nested.is_success());
    assert!(
        parses_nested.failures[0]
            .message
            .contains("parses_nested was told to fail"),
        "message: {}",
        parses_nested.failures[0].message
    );
}

#[test]
fn execute_unknown_test() {
    let workdir = Utf8TempDir::new().unwrap();
    let package = build_fixture(workdir.path());

    let mut engine = LibtestEngine::new(workdir.path());
    engine.discover(&[package]).unwrap();
    let plan = Sequencer::new(&HistoryCounters::new()).order(&TestList::new([TestCase::new(
        "fixture_tests::parser",
        "not_a_test",
    )]));
    let unit = plan.units().next().unwrap();

    let error = engine.execute(unit).unwrap_err();
    match error {
        EngineError::UnknownTest { key } => {
            assert_eq!(key, TestKey::method("not_a_test", "fixture_tests::parser"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
