// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! JUnit XML reports.

use super::{
    RunObserver,
    events::{CancelReason, TestEvent, TestEventKind},
};
use crate::{
    config::JunitConfig,
    engine::{ExecuteResult, FailureDetail},
    errors::{DisplayErrorChain, WriteEventError},
    list::TestUnit,
    runner::RunControl,
};
use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::fs::File;
use tracing::{debug, warn};

/// Collects results into one test suite per class, and writes a JUnit XML report when the run
/// finishes.
#[derive(Debug)]
pub struct JunitReporter {
    config: JunitConfig,
    test_suites: IndexMap<String, TestSuite>,
    pending_failures: Vec<FailureDetail>,
    error: Option<WriteEventError>,
}

impl JunitReporter {
    /// Creates a new reporter.
    pub fn new(config: JunitConfig) -> Self {
        Self {
            config,
            test_suites: IndexMap::new(),
            pending_failures: Vec::new(),
            error: None,
        }
    }

    /// Returns the error that stopped the report from being written, if any.
    pub fn finish(self) -> Result<(), WriteEventError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn write_event(&mut self, event: &TestEvent<'_>) -> Result<(), WriteEventError> {
        match &event.kind {
            TestEventKind::RunStarted { .. } | TestEventKind::RunBeginCancel { .. } => {}
            TestEventKind::TestStarted { .. } => {
                self.pending_failures.clear();
            }
            TestEventKind::TestFailure { failure, .. } => {
                self.pending_failures.push((*failure).clone());
            }
            TestEventKind::TestFinished { unit, result, .. } => {
                let status = if result.is_success() {
                    TestCaseStatus::success()
                } else {
                    failure_status(&self.pending_failures)
                };
                let mut test_case = new_test_case(*unit, status);
                set_execute_result_props(&mut test_case, result);
                self.testsuite_for(*unit).add_test_case(test_case);
                self.pending_failures.clear();
            }
            TestEventKind::TestIgnored { unit } => {
                let mut status = TestCaseStatus::skipped();
                status.set_message("ignored");
                let test_case = new_test_case(*unit, status);
                self.testsuite_for(*unit).add_test_case(test_case);
            }
            TestEventKind::RunFinished { outcome } => {
                // Write out the report to the given file.
                let mut report = Report::new(self.config.report_name());
                report
                    .set_timestamp(outcome.start_time)
                    .set_time(outcome.elapsed)
                    .add_test_suites(self.test_suites.drain(..).map(|(_, suite)| suite));

                let junit_path = self.config.path();
                if let Some(junit_dir) = junit_path.parent() {
                    std::fs::create_dir_all(junit_dir).map_err(|error| WriteEventError::Fs {
                        file: junit_dir.to_path_buf(),
                        error,
                    })?;
                }

                let f = File::create(junit_path).map_err(|error| WriteEventError::Fs {
                    file: junit_path.to_path_buf(),
                    error,
                })?;
                report
                    .serialize(f)
                    .map_err(|error| WriteEventError::Junit {
                        file: junit_path.to_path_buf(),
                        error,
                    })?;
                debug!("wrote JUnit report to {junit_path}");
            }
        }

        Ok(())
    }

    fn testsuite_for(&mut self, unit: TestUnit<'_>) -> &mut TestSuite {
        self.test_suites
            .entry(unit.class.name.clone())
            .or_insert_with(|| TestSuite::new(unit.class.name.clone()))
    }
}

impl RunObserver for JunitReporter {
    fn handle_event(&mut self, event: &TestEvent<'_>, control: &mut RunControl) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = self.write_event(event) {
            warn!("{}", DisplayErrorChain::new(&error));
            self.error = Some(error);
            control.request_cancel(CancelReason::ReportError);
        }
    }
}

fn new_test_case(unit: TestUnit<'_>, status: TestCaseStatus) -> TestCase {
    let mut test_case = TestCase::new(unit.method.name.clone(), status);
    test_case.set_classname(unit.class.name.clone());
    test_case
}

fn failure_status(failures: &[FailureDetail]) -> TestCaseStatus {
    let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
    if let Some(first) = failures.first() {
        status.set_message(first.summary()).set_type("test failure");
    }
    let description = failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !description.is_empty() {
        status.set_description(description);
    }
    status
}

fn set_execute_result_props(test_case: &mut TestCase, result: &ExecuteResult) {
    test_case
        .set_timestamp(result.start_time)
        .set_time(result.time_taken);
    if !result.is_success() {
        test_case
            .set_system_out_lossy(&result.stdout)
            .set_system_err_lossy(&result.stderr);
    }
}
