// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::{ExecuteResult, FailureDetail, TestEngine};
use crate::{
    errors::{DiscoverError, EngineError, display_exited_with},
    helpers::StopwatchStart,
    list::{TestCase, TestKey, TestList, TestUnit},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    collections::{BTreeMap, BTreeSet},
    process::ExitStatus,
};
use tracing::{debug, trace};

/// An engine that drives libtest-compatible test binaries, one process per test.
///
/// Each package name is the path to a test binary, relative to the working directory. The
/// binary's name (its file stem, minus the `-<hash>` suffix cargo adds) becomes the root of every
/// class name: the test `parser::tests::parses_empty` in `target/debug/deps/my_crate-0123456789abcdef`
/// is the method `parses_empty` of class `my_crate::parser::tests`.
#[derive(Debug)]
pub struct LibtestEngine {
    workdir: Utf8PathBuf,
    tests: BTreeMap<TestKey, LibtestCase>,
}

#[derive(Clone, Debug)]
struct LibtestCase {
    binary_path: Utf8PathBuf,
    full_name: String,
}

impl LibtestEngine {
    /// Creates a new engine that runs binaries from `workdir`.
    pub fn new(workdir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            tests: BTreeMap::new(),
        }
    }

    fn list(
        &self,
        package: &str,
        binary_path: &Utf8Path,
        ignored: bool,
    ) -> Result<String, DiscoverError> {
        let mut args = vec!["--list", "--format", "terse"];
        if ignored {
            args.push("--ignored");
        }
        let command = || {
            std::iter::once(binary_path.as_str())
                .chain(args.iter().copied())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        };

        let expression = duct::cmd(binary_path.as_str(), args.iter().copied())
            .dir(self.workdir.as_std_path());
        trace!("executing command: {:?}", expression);
        let output = expression
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|error| DiscoverError::CommandExec {
                package: package.to_owned(),
                command: command(),
                error,
            })?;

        if !output.status.success() {
            return Err(DiscoverError::CommandFail {
                package: package.to_owned(),
                command: command(),
                exit_status: output.status,
                stderr: output.stderr,
            });
        }

        String::from_utf8(output.stdout).map_err(|_| DiscoverError::CommandNonUtf8 {
            package: package.to_owned(),
            command: command(),
        })
    }
}

impl TestEngine for LibtestEngine {
    fn discover(&mut self, packages: &[String]) -> Result<TestList, DiscoverError> {
        if packages.is_empty() {
            return Err(DiscoverError::NoPackages);
        }

        let mut test_list = TestList::default();
        for package in packages {
            let binary_path = self.workdir.join(package);
            let binary_name = binary_name(&binary_path).to_owned();

            let all_output = self.list(package, &binary_path, false)?;
            let ignored_output = self.list(package, &binary_path, true)?;
            let ignored: BTreeSet<&str> =
                parse_list(package, &ignored_output).collect::<Result<_, _>>()?;

            let mut count = 0;
            for full_name in parse_list(package, &all_output) {
                let full_name = full_name?;
                let (class_name, method_name) = split_test_name(&binary_name, full_name);

                let mut test_case = TestCase::new(class_name, method_name);
                if ignored.contains(full_name) {
                    test_case = test_case.ignored();
                }
                self.tests.insert(
                    TestKey::method(&test_case.method_name, &test_case.class_name),
                    LibtestCase {
                        binary_path: binary_path.clone(),
                        full_name: full_name.to_owned(),
                    },
                );
                test_list.push(test_case);
                count += 1;
            }
            debug!(
                "discovered {count} tests ({} ignored) in {package}",
                ignored.len()
            );
        }

        Ok(test_list)
    }

    fn execute(&mut self, unit: TestUnit<'_>) -> Result<ExecuteResult, EngineError> {
        let case = self
            .tests
            .get(unit.key())
            .ok_or_else(|| EngineError::UnknownTest {
                key: unit.key().clone(),
            })?;

        let args = [
            case.full_name.as_str(),
            "--exact",
            "--nocapture",
            "--test-threads",
            "1",
        ];
        let expression = duct::cmd(case.binary_path.as_str(), args).dir(self.workdir.as_std_path());
        trace!("executing command: {:?}", expression);

        let stopwatch = StopwatchStart::now();
        let output = expression
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|error| EngineError::CommandExec {
                key: unit.key().clone(),
                command: std::iter::once(case.binary_path.as_str())
                    .chain(args)
                    .map(str::to_owned)
                    .collect(),
                error,
            })?;
        let time_taken = stopwatch.elapsed();
        let start_time = stopwatch.start_time().fixed_offset();

        if output.status.success()
            && String::from_utf8_lossy(&output.stdout).contains("running 0 tests")
        {
            return Err(EngineError::UnknownTest {
                key: unit.key().clone(),
            });
        }

        let failures = if output.status.success() {
            Vec::new()
        } else {
            vec![extract_failure(
                output.status,
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            )]
        };

        let stdout =
            strip_harness_output(&String::from_utf8_lossy(&output.stdout), &case.full_name);
        Ok(ExecuteResult {
            failures,
            start_time,
            time_taken,
            stdout: stdout.into_bytes(),
            stderr: output.stderr,
        })
    }
}

/// Returns the name of a test binary: its file stem without the `-<hash>` suffix cargo adds.
fn binary_name(binary_path: &Utf8Path) -> &str {
    let stem = binary_path.file_stem().unwrap_or(binary_path.as_str());
    match stem.rsplit_once('-') {
        Some((name, hash))
            if !name.is_empty()
                && hash.len() == 16
                && hash.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            name
        }
        _ => stem,
    }
}

/// Splits a libtest name into (class name, method name).
fn split_test_name(binary_name: &str, full_name: &str) -> (String, String) {
    match full_name.rsplit_once("::") {
        Some((module_path, method)) => {
            (format!("{binary_name}::{module_path}"), method.to_owned())
        }
        None => (binary_name.to_owned(), full_name.to_owned()),
    }
}

/// Parses the output of `--list --format terse`.
fn parse_list<'a>(
    package: &'a str,
    list_output: &'a str,
) -> impl Iterator<Item = Result<&'a str, DiscoverError>> + 'a {
    // The output is in the form:
    // <test name>: test
    // <test name>: benchmark
    // ...

    list_output
        .lines()
        .filter(|line| !line.is_empty())
        .map(move |line| {
            line.strip_suffix(": test")
                .or_else(|| line.strip_suffix(": benchmark"))
                .ok_or_else(|| {
                    DiscoverError::parse_line(
                        package,
                        format!(
                            "line '{line}' did not end with the string ': test' or ': benchmark'"
                        ),
                        list_output,
                    )
                })
        })
}

const TEST_STATUSES: [&str; 3] = ["ok", "FAILED", "ignored"];

/// Removes the lines libtest prints around a single test, keeping what the test itself wrote.
///
/// Blank lines at the start and end are dropped too. The failure is parsed separately, so the
/// `failures:` listing and the `test result:` line would only repeat it.
fn strip_harness_output(stdout: &str, full_name: &str) -> String {
    let status_prefix = format!("test {full_name} ... ");
    let failure_listing = format!("    {full_name}");

    let mut kept = Vec::new();
    let mut awaiting_status = false;
    for line in stdout.lines() {
        // With a single test thread, libtest prints the status line before the test runs. The
        // test's own output then continues that line, and the result follows on a line of its own.
        if let Some(rest) = line.strip_prefix(&status_prefix) {
            let output = match TEST_STATUSES
                .iter()
                .find_map(|status| rest.strip_suffix(status))
            {
                Some(output) => output,
                None => {
                    awaiting_status = true;
                    rest
                }
            };
            if !output.is_empty() {
                kept.push(output);
            }
            continue;
        }
        if awaiting_status && TEST_STATUSES.contains(&line) {
            awaiting_status = false;
            continue;
        }

        let is_harness_line = (line.starts_with("running ")
            && (line.ends_with(" test") || line.ends_with(" tests")))
            || line == "failures:"
            || line == failure_listing
            || line.starts_with("test result: ");
        if !is_harness_line {
            kept.push(line);
        }
    }

    let Some(start) = kept.iter().position(|line| !line.trim().is_empty()) else {
        return String::new();
    };
    let end = kept
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(start);
    let mut out = kept[start..=end].join("\n");
    out.push('\n');
    out
}

/// Extracts a failure from the output of a test process that exited unsuccessfully.
fn extract_failure(exit_status: ExitStatus, stdout: &str, stderr: &str) -> FailureDetail {
    parse_failure_output(stderr)
        .or_else(|| parse_failure_output(stdout))
        .unwrap_or_else(|| {
            FailureDetail::new(format!("test {}", display_exited_with(&exit_status)))
        })
}

/// Looks for a panic message, or an `Error:` returned from a test, in captured output.
fn parse_failure_output(output: &str) -> Option<FailureDetail> {
    let lines: Vec<&str> = output.lines().collect();

    for (index, line) in lines.iter().enumerate() {
        if let Some(rest) = panicked_at(line) {
            // Before Rust 1.73: thread 'name' panicked at 'message', src/lib.rs:1:2
            if let Some((message, location)) = rest
                .strip_prefix('\'')
                .and_then(|rest| rest.rsplit_once("', "))
            {
                return Some(FailureDetail::new(message).with_location(location));
            }

            // Since Rust 1.73: thread 'name' panicked at src/lib.rs:1:2:
            // message
            let location = rest.strip_suffix(':').unwrap_or(rest);
            let message = lines[index + 1..]
                .iter()
                .take_while(|line| {
                    !line.is_empty()
                        && !line.starts_with("note: ")
                        && !line.starts_with("stack backtrace:")
                })
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            let message = if message.is_empty() {
                "test panicked".to_owned()
            } else {
                message
            };
            return Some(FailureDetail::new(message).with_location(location));
        }

        if let Some(message) = line.strip_prefix("Error: ") {
            let mut detail = FailureDetail::new(message);
            let mut rest = lines[index + 1..]
                .iter()
                .skip_while(|line| line.trim().is_empty());
            if rest.next().is_some_and(|line| line.trim() == "Caused by:") {
                detail.causes = rest
                    .take_while(|line| line.starts_with(' ') && !line.trim().is_empty())
                    .map(|line| strip_cause_index(line.trim()).to_owned())
                    .collect();
            }
            return Some(detail);
        }
    }

    None
}

fn panicked_at(line: &str) -> Option<&str> {
    let (thread, rest) = line.split_once(" panicked at ")?;
    thread.starts_with("thread ").then_some(rest)
}

fn strip_cause_index(cause: &str) -> &str {
    match cause.split_once(": ") {
        Some((index, rest)) if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) => {
            rest
        }
        _ => cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("target/debug/deps/my_crate-0123456789abcdef", "my_crate"; "cargo hash")]
    #[test_case("target/debug/deps/my_crate-0123456789abcdef.exe", "my_crate"; "windows")]
    #[test_case("bin/integration-tests", "integration-tests"; "dash without hash")]
    #[test_case("plain", "plain"; "no directory")]
    fn binary_names(path: &str, expected: &str) {
        assert_eq!(binary_name(Utf8Path::new(path)), expected);
    }

    #[test]
    fn test_names_split_into_class_and_method() {
        assert_eq!(
            split_test_name("my_crate", "parser::tests::parses_empty"),
            ("my_crate::parser::tests".to_owned(), "parses_empty".to_owned())
        );
        assert_eq!(
            split_test_name("my_crate", "top_level"),
            ("my_crate".to_owned(), "top_level".to_owned())
        );
    }

    #[test]
    fn parse_terse_list() {
        let output = indoc! {"
            tests::foo::test_bar: test
            tests::baz::test_quux: test
            benches::bench_foo: benchmark
        "};

        let names = parse_list("pkg", output)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            names,
            vec!["tests::foo::test_bar", "tests::baz::test_quux", "benches::bench_foo"]
        );

        let error = parse_list("pkg", "running 2 tests\n")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert!(
            matches!(error, DiscoverError::ParseLine { .. }),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn harness_lines_are_stripped() {
        let stdout = indoc! {"

            running 1 test
            connecting to fixture server
            retrying once
            test net::connects ... FAILED

            failures:

            failures:
                net::connects

            test result: FAILED. 0 passed; 1 failed; 0 ignored; 0 measured; 4 filtered out; finished in 0.01s

        "};

        assert_eq!(
            strip_harness_output(stdout, "net::connects"),
            "connecting to fixture server\nretrying once\n"
        );
    }

    #[test_case("test net::connects ... hello\nok\n", "hello\n"; "output on the status line")]
    #[test_case("test net::connects ... ok\nok\n", "ok\n"; "test prints ok itself")]
    #[test_case("\nrunning 1 test\ntest net::connects ... ok\n\n", ""; "no output")]
    #[test_case("test net::other ... ok\n", "test net::other ... ok\n"; "other test names are kept")]
    fn harness_line_variants(stdout: &str, expected: &str) {
        assert_eq!(strip_harness_output(stdout, "net::connects"), expected);
    }

    #[test]
    fn new_style_panic() {
        let stderr = indoc! {"
            thread 'tests::adds' panicked at src/lib.rs:12:9:
            assertion `left == right` failed
              left: 3
             right: 4
            note: run with `RUST_BACKTRACE=1` environment variable to display a backtrace
        "};

        assert_eq!(
            parse_failure_output(stderr),
            Some(
                FailureDetail::new("assertion `left == right` failed\n  left: 3\n right: 4")
                    .with_location("src/lib.rs:12:9")
            )
        );
    }

    #[test]
    fn old_style_panic() {
        let stderr = "thread 'main' panicked at 'called `Option::unwrap()` on a `None` value', \
                      src/main.rs:4:37\n";

        assert_eq!(
            parse_failure_output(stderr),
            Some(
                FailureDetail::new("called `Option::unwrap()` on a `None` value")
                    .with_location("src/main.rs:4:37")
            )
        );
    }

    #[test]
    fn returned_error_with_causes() {
        let stderr = indoc! {"
            Error: failed to load fixture

            Caused by:
                0: failed to open fixtures/data.json
                1: No such file or directory (os error 2)
        "};

        assert_eq!(
            parse_failure_output(stderr),
            Some(
                FailureDetail::new("failed to load fixture")
                    .with_cause("failed to open fixtures/data.json")
                    .with_cause("No such file or directory (os error 2)")
            )
        );
    }

    #[test]
    fn unrecognized_output() {
        assert_eq!(parse_failure_output("running 1 test\n"), None);
    }
}
