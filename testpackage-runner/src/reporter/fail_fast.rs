// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::{
    RunObserver,
    events::{CancelReason, TestEvent, TestEventKind},
};
use crate::{config::MaxFail, runner::RunControl};
use tracing::debug;

/// Requests cancellation once enough units have failed.
///
/// Units are counted, not failure events: a unit that reports several failures counts once. The
/// failure that reaches the limit is still delivered to every observer.
#[derive(Clone, Debug)]
pub struct FailFastController {
    max_fail: MaxFail,
    failed_units: usize,
    current_unit_failed: bool,
    requested: bool,
}

impl FailFastController {
    /// Creates a new controller. With [`MaxFail::All`] it never requests cancellation.
    pub fn new(max_fail: MaxFail) -> Self {
        Self {
            max_fail,
            failed_units: 0,
            current_unit_failed: false,
            requested: false,
        }
    }
}

impl RunObserver for FailFastController {
    fn handle_event(&mut self, event: &TestEvent<'_>, control: &mut RunControl) {
        match &event.kind {
            TestEventKind::TestStarted { .. } => {
                self.current_unit_failed = false;
            }
            TestEventKind::TestFailure { unit, .. } => {
                if self.current_unit_failed {
                    return;
                }
                self.current_unit_failed = true;
                self.failed_units += 1;

                if !self.requested && self.max_fail.is_exceeded(self.failed_units) {
                    debug!(
                        "{} failed: {} failing units reached max-fail {}",
                        unit.key(),
                        self.failed_units,
                        self.max_fail,
                    );
                    self.requested = true;
                    control.request_cancel(CancelReason::TestFailure);
                }
            }
            TestEventKind::RunStarted { .. }
            | TestEventKind::TestFinished { .. }
            | TestEventKind::TestIgnored { .. }
            | TestEventKind::RunBeginCancel { .. }
            | TestEventKind::RunFinished { .. } => {}
        }
    }
}
