// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fakes shared by tests in this crate.

use crate::{
    config::{FailFast, RunConfig},
    engine::{ExecuteResult, FailureDetail, TestEngine},
    errors::{DiscoverError, EngineError},
    history::HistoryCounters,
    list::{ExecutionPlan, TestCase, TestKey, TestList, TestUnit},
    reporter::{
        RunObserver,
        events::{CancelReason, RunStatus, TestEvent, TestEventKind},
    },
    runner::RunControl,
    sequencer::Sequencer,
};
use chrono::Local;
use std::{collections::BTreeMap, time::Duration};

/// Builds a config rooted at `workdir` that ignores the process environment.
pub(crate) fn run_config(workdir: &camino::Utf8Path, fail_fast: FailFast) -> RunConfig {
    let mut config = RunConfig::from_sources_with_env(workdir, None, std::iter::empty())
        .expect("default config is valid");
    config.set_fail_fast(fail_fast);
    config
}

/// Sequences everything the engine knows about.
pub(crate) fn plan_for(engine: &ScriptedEngine, counters: &HistoryCounters) -> ExecutionPlan {
    Sequencer::new(counters).order(&engine.test_list)
}

#[derive(Clone, Debug)]
enum Scripted {
    Fail(Vec<String>),
    FailWithCauses(String, Vec<String>),
    EngineError,
    Panic,
}

/// An engine whose tests pass unless told otherwise.
#[derive(Debug)]
pub(crate) struct ScriptedEngine {
    test_list: TestList,
    scripts: BTreeMap<TestKey, Scripted>,
    pub(crate) executed: Vec<TestKey>,
}

impl ScriptedEngine {
    pub(crate) fn new(test_cases: impl IntoIterator<Item = TestCase>) -> Self {
        Self {
            test_list: TestList::new(test_cases),
            scripts: BTreeMap::new(),
            executed: Vec::new(),
        }
    }

    /// Makes a test report one failure per message.
    pub(crate) fn fail(mut self, method: &str, class: &str, messages: &[&str]) -> Self {
        self.scripts.insert(
            TestKey::method(method, class),
            Scripted::Fail(messages.iter().map(|m| (*m).to_owned()).collect()),
        );
        self
    }

    /// Makes a test report a single failure with a chain of causes.
    pub(crate) fn fail_with_causes(
        mut self,
        method: &str,
        class: &str,
        message: &str,
        causes: &[&str],
    ) -> Self {
        self.scripts.insert(
            TestKey::method(method, class),
            Scripted::FailWithCauses(
                message.to_owned(),
                causes.iter().map(|c| (*c).to_owned()).collect(),
            ),
        );
        self
    }

    /// Makes the engine return an error for a test.
    pub(crate) fn engine_error(mut self, method: &str, class: &str) -> Self {
        self.scripts
            .insert(TestKey::method(method, class), Scripted::EngineError);
        self
    }

    /// Makes the engine panic while executing a test.
    pub(crate) fn panic(mut self, method: &str, class: &str) -> Self {
        self.scripts
            .insert(TestKey::method(method, class), Scripted::Panic);
        self
    }
}

impl TestEngine for ScriptedEngine {
    fn discover(&mut self, packages: &[String]) -> Result<TestList, DiscoverError> {
        if packages.is_empty() {
            return Err(DiscoverError::NoPackages);
        }
        Ok(self.test_list.clone())
    }

    fn execute(&mut self, unit: TestUnit<'_>) -> Result<ExecuteResult, EngineError> {
        self.executed.push(unit.key().clone());

        let failures = match self.scripts.get(unit.key()) {
            None => Vec::new(),
            Some(Scripted::Fail(messages)) => messages
                .iter()
                .map(|message| FailureDetail::new(message.clone()).with_location("src/lib.rs:1:1"))
                .collect(),
            Some(Scripted::FailWithCauses(message, causes)) => {
                let mut failure = FailureDetail::new(message.clone()).with_location("src/lib.rs:1:1");
                for cause in causes {
                    failure = failure.with_cause(cause.clone());
                }
                vec![failure]
            }
            Some(Scripted::EngineError) => {
                return Err(EngineError::UnknownTest {
                    key: unit.key().clone(),
                });
            }
            Some(Scripted::Panic) => panic!("scripted engine panic in {}", unit.key()),
        };

        Ok(ExecuteResult {
            failures,
            start_time: Local::now().fixed_offset(),
            time_taken: Duration::from_millis(5),
            stdout: b"scripted stdout\n".to_vec(),
            stderr: Vec::new(),
        })
    }
}

/// Records a one-line summary of every event it sees.
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    pub(crate) log: Vec<String>,
    cancel_on_start: Option<CancelReason>,
}

impl RecordingObserver {
    /// Also requests cancellation whenever a unit starts.
    pub(crate) fn cancel_on_start(reason: CancelReason) -> Self {
        Self {
            log: Vec::new(),
            cancel_on_start: Some(reason),
        }
    }
}

impl RunObserver for RecordingObserver {
    fn handle_event(&mut self, event: &TestEvent<'_>, control: &mut RunControl) {
        let line = match &event.kind {
            TestEventKind::RunStarted { plan } => format!("run-started {}", plan.unit_count()),
            TestEventKind::TestStarted { unit, .. } => {
                if let Some(reason) = self.cancel_on_start {
                    control.request_cancel(reason);
                }
                format!("started {}", unit.key())
            }
            TestEventKind::TestFailure { unit, failure } => {
                format!("failure {}: {}", unit.key(), failure.message)
            }
            TestEventKind::TestFinished { unit, result, .. } => format!(
                "finished {} {}",
                unit.key(),
                if result.is_success() { "pass" } else { "fail" }
            ),
            TestEventKind::TestIgnored { unit } => format!("ignored {}", unit.key()),
            TestEventKind::RunBeginCancel { reason } => format!("cancel {reason}"),
            TestEventKind::RunFinished { outcome } => match outcome.status {
                RunStatus::Completed => "run-finished completed".to_owned(),
                RunStatus::Aborted(_) => "run-finished aborted".to_owned(),
            },
        };
        self.log.push(line);
    }
}
