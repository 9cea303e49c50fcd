// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Events produced during a run, and the outcome of a run.

use crate::{
    engine::{ExecuteResult, FailureDetail},
    list::{ExecutionPlan, TestKey, TestUnit},
};
use chrono::{DateTime, FixedOffset};
use std::{fmt, time::Duration};

/// A test event.
///
/// Events are produced by a [`RunCoordinator`](crate::runner::RunCoordinator) and consumed by
/// [`RunObserver`](super::RunObserver)s.
#[derive(Clone, Debug)]
pub struct TestEvent<'a> {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the start of the run.
    pub elapsed: Duration,

    /// The kind of test event this is.
    pub kind: TestEventKind<'a>,
}

/// The kind of test event this is.
///
/// Forms part of [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind<'a> {
    /// The run started.
    RunStarted {
        /// The plan that will be executed.
        plan: &'a ExecutionPlan,
    },

    /// A unit started executing.
    TestStarted {
        /// The unit that started.
        unit: TestUnit<'a>,

        /// Statistics for the run so far.
        current_stats: RunStats,
    },

    /// A unit reported a failure. A unit can report more than one.
    TestFailure {
        /// The unit that failed.
        unit: TestUnit<'a>,

        /// The failure.
        failure: &'a FailureDetail,
    },

    /// A unit finished executing.
    TestFinished {
        /// The unit that finished.
        unit: TestUnit<'a>,

        /// What the engine reported.
        result: &'a ExecuteResult,

        /// Statistics for the run so far, including this unit.
        current_stats: RunStats,
    },

    /// A unit was not executed because the engine reported it as ignored.
    TestIgnored {
        /// The unit that was ignored.
        unit: TestUnit<'a>,
    },

    /// An observer or the coordinator requested that the run stop. No further units will be
    /// started; the in-flight unit, if any, has already finished or will finish.
    RunBeginCancel {
        /// The reason the run is being cancelled.
        reason: CancelReason,
    },

    /// The run finished. This is always the last event.
    RunFinished {
        /// The outcome of the run.
        outcome: &'a RunOutcome,
    },
}

// Note: the order here matters -- it indicates severity of cancellation
/// The reason why a run is being cancelled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CancelReason {
    /// A test failed and fail-fast is enabled.
    TestFailure,

    /// The engine could not execute a test.
    EngineError,

    /// An error occurred while reporting results.
    ReportError,
}

impl CancelReason {
    pub(crate) fn to_static_str(self) -> &'static str {
        match self {
            CancelReason::TestFailure => "test failure",
            CancelReason::EngineError => "engine error",
            CancelReason::ReportError => "reporting error",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_static_str())
    }
}

/// Statistics for a run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The number of units that were expected to be executed at the beginning.
    ///
    /// If the run is cancelled, this will be more than `finished_count` at the end.
    pub initial_run_count: usize,

    /// The number of units that finished executing.
    pub finished_count: usize,

    /// The number of units that passed.
    pub passed: usize,

    /// The number of units that failed.
    pub failed: usize,

    /// The number of units that were ignored.
    pub ignored: usize,
}

impl RunStats {
    /// Returns true if any unit failed.
    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }

    /// Returns the number of units that were planned but never started.
    pub fn not_run(&self) -> usize {
        self.initial_run_count.saturating_sub(self.finished_count)
    }
}

/// Whether a run went through the whole plan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunStatus {
    /// Every unit in the plan was either executed or ignored.
    Completed,

    /// The run stopped early.
    Aborted(CancelReason),
}

/// A failure recorded during a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failure {
    /// The method key of the failing unit.
    pub key: TestKey,

    /// The class key of the failing unit.
    pub class_key: TestKey,

    /// What the engine reported.
    pub detail: FailureDetail,
}

/// The outcome of a run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Whether the run completed.
    pub status: RunStatus,

    /// Aggregate statistics.
    pub stats: RunStats,

    /// Every failure, in the order it was reported.
    pub failures: Vec<Failure>,

    /// The time at which the run started.
    pub start_time: DateTime<FixedOffset>,

    /// How long the run took.
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Returns true if the run completed, nothing failed, and at least one unit passed.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && !self.stats.any_failed() && self.stats.passed > 0
    }

    /// Returns the cancellation reason if the run was aborted.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self.status {
            RunStatus::Completed => None,
            RunStatus::Aborted(reason) => Some(reason),
        }
    }
}
