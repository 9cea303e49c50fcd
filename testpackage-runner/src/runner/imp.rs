// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::dispatcher::DispatcherContext;
use crate::{
    config::RunConfig,
    engine::{ExecuteResult, FailureDetail, TestEngine},
    errors::{DisplayErrorChain, RunError},
    list::ExecutionPlan,
    reporter::{
        FailFastController, RunObserver,
        events::{CancelReason, RunOutcome},
    },
};
use chrono::Local;
use std::time::Duration;
use tracing::{debug, warn};

/// A handle through which observers can ask for the run to stop.
///
/// If more than one reason is given, the most severe one is kept.
#[derive(Clone, Debug, Default)]
pub struct RunControl {
    cancel_reason: Option<CancelReason>,
}

impl RunControl {
    /// Requests that no further units be started.
    pub fn request_cancel(&mut self, reason: CancelReason) {
        if self.cancel_reason < Some(reason) {
            self.cancel_reason = Some(reason);
        }
    }

    /// Returns the reason the run is being cancelled, if any.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.cancel_reason
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.is_some()
    }
}

/// Executes an [`ExecutionPlan`] through a [`TestEngine`], one unit at a time.
pub struct RunCoordinator<'a, E: ?Sized> {
    engine: &'a mut E,
    plan: &'a ExecutionPlan,
    fail_fast: FailFastController,
}

impl<'a, E: TestEngine + ?Sized> RunCoordinator<'a, E> {
    /// Creates a coordinator for a single run.
    ///
    /// Returns an error if the plan has no units: that is a configuration problem, not a run with
    /// nothing passing.
    pub fn new(
        engine: &'a mut E,
        plan: &'a ExecutionPlan,
        config: &RunConfig,
    ) -> Result<Self, RunError> {
        if plan.is_empty() {
            return Err(RunError::NoTestsResolved);
        }

        Ok(Self {
            engine,
            plan,
            fail_fast: FailFastController::new(config.fail_fast().max_fail()),
        })
    }

    /// Runs the plan, sending events to `observers` in order.
    ///
    /// The fail-fast controller configured for this run sees every event after `observers` do.
    pub fn run(self, observers: &mut [&mut dyn RunObserver]) -> RunOutcome {
        let Self {
            engine,
            plan,
            fail_fast,
        } = self;

        let mut dispatcher = DispatcherContext::new(observers, fail_fast, plan.run_count());
        dispatcher.run_started(plan);

        for unit in plan.units() {
            if let Some(reason) = dispatcher.cancel_reason() {
                debug!("not starting {} or later units: {reason}", unit.key());
                break;
            }

            if unit.method.ignored {
                dispatcher.test_ignored(unit);
                continue;
            }

            dispatcher.test_started(unit);
            let result = match engine.execute(unit) {
                Ok(result) => result,
                Err(error) => {
                    warn!("{}", DisplayErrorChain::new(&error));
                    dispatcher.request_cancel(CancelReason::EngineError);
                    ExecuteResult {
                        failures: vec![FailureDetail::from_error(&error)],
                        start_time: Local::now().fixed_offset(),
                        time_taken: Duration::ZERO,
                        stdout: Vec::new(),
                        stderr: Vec::new(),
                    }
                }
            };

            for failure in &result.failures {
                dispatcher.test_failure(unit, failure);
            }
            dispatcher.test_finished(unit, &result);
        }

        dispatcher.run_finished()
    }
}
