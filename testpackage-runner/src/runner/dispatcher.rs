// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Delivery of events to observers, and the bookkeeping that goes with it.

use super::RunControl;
use crate::{
    engine::{ExecuteResult, FailureDetail},
    helpers::StopwatchStart,
    list::{ExecutionPlan, TestUnit},
    reporter::{
        FailFastController, RunObserver,
        events::{CancelReason, Failure, RunOutcome, RunStats, RunStatus, TestEvent, TestEventKind},
    },
};
use chrono::Local;
use tracing::debug;

/// Tracks run statistics and cancellation state, and sends events to observers.
pub(super) struct DispatcherContext<'o, 'obs> {
    observers: &'o mut [&'obs mut dyn RunObserver],
    fail_fast: FailFastController,
    control: RunControl,
    announced_cancel: Option<CancelReason>,
    stopwatch: StopwatchStart,
    run_stats: RunStats,
    failures: Vec<Failure>,
}

impl<'o, 'obs> DispatcherContext<'o, 'obs> {
    pub(super) fn new(
        observers: &'o mut [&'obs mut dyn RunObserver],
        fail_fast: FailFastController,
        initial_run_count: usize,
    ) -> Self {
        Self {
            observers,
            fail_fast,
            control: RunControl::default(),
            announced_cancel: None,
            stopwatch: StopwatchStart::now(),
            run_stats: RunStats {
                initial_run_count,
                ..RunStats::default()
            },
            failures: Vec::new(),
        }
    }

    pub(super) fn cancel_reason(&self) -> Option<CancelReason> {
        self.control.cancel_reason()
    }

    pub(super) fn request_cancel(&mut self, reason: CancelReason) {
        self.control.request_cancel(reason);
    }

    pub(super) fn run_started(&mut self, plan: &ExecutionPlan) {
        self.dispatch(TestEventKind::RunStarted { plan });
    }

    pub(super) fn test_started(&mut self, unit: TestUnit<'_>) {
        self.dispatch(TestEventKind::TestStarted {
            unit,
            current_stats: self.run_stats,
        });
    }

    pub(super) fn test_failure(&mut self, unit: TestUnit<'_>, failure: &FailureDetail) {
        self.failures.push(Failure {
            key: unit.key().clone(),
            class_key: unit.class_key().clone(),
            detail: failure.clone(),
        });
        self.dispatch(TestEventKind::TestFailure { unit, failure });
    }

    pub(super) fn test_finished(&mut self, unit: TestUnit<'_>, result: &ExecuteResult) {
        self.run_stats.finished_count += 1;
        if result.is_success() {
            self.run_stats.passed += 1;
        } else {
            self.run_stats.failed += 1;
        }
        self.dispatch(TestEventKind::TestFinished {
            unit,
            result,
            current_stats: self.run_stats,
        });
    }

    pub(super) fn test_ignored(&mut self, unit: TestUnit<'_>) {
        self.run_stats.ignored += 1;
        self.dispatch(TestEventKind::TestIgnored { unit });
    }

    pub(super) fn run_finished(mut self) -> RunOutcome {
        let status = match self.control.cancel_reason() {
            Some(reason) => RunStatus::Aborted(reason),
            None => RunStatus::Completed,
        };
        let outcome = RunOutcome {
            status,
            stats: self.run_stats,
            failures: std::mem::take(&mut self.failures),
            start_time: self.stopwatch.start_time().fixed_offset(),
            elapsed: self.stopwatch.elapsed(),
        };
        debug!(
            "run finished: {} passed, {} failed, {} ignored, status {:?}",
            outcome.stats.passed, outcome.stats.failed, outcome.stats.ignored, outcome.status,
        );

        // Cancellation requested while handling the final event has nothing left to stop.
        self.send(TestEventKind::RunFinished { outcome: &outcome });
        outcome
    }

    fn dispatch(&mut self, kind: TestEventKind<'_>) {
        self.send(kind);

        // Announce each escalation of the cancellation state once. Announcing can itself escalate
        // (for example, if a reporter fails to write the announcement).
        while self.announced_cancel < self.control.cancel_reason() {
            let Some(reason) = self.control.cancel_reason() else {
                break;
            };
            self.announced_cancel = Some(reason);
            debug!("cancelling run: {reason}");
            self.send(TestEventKind::RunBeginCancel { reason });
        }
    }

    fn send(&mut self, kind: TestEventKind<'_>) {
        let event = TestEvent {
            timestamp: Local::now().fixed_offset(),
            elapsed: self.stopwatch.elapsed(),
            kind,
        };
        for observer in self.observers.iter_mut() {
            observer.handle_event(&event, &mut self.control);
        }
        self.fail_fast.handle_event(&event, &mut self.control);
    }
}
