// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Observers of a run.
//!
//! Every consumer of [`TestEvent`]s implements [`RunObserver`]. The history recorder and the
//! fail-fast controller decide what happens to later runs and to the rest of this run; the console
//! and JUnit reporters only describe what happened.

mod displayer;
pub mod events;
mod fail_fast;
mod history;
mod junit;

pub use displayer::*;
pub use fail_fast::*;
pub use history::*;
pub use junit::*;

use crate::runner::RunControl;
use events::TestEvent;

/// Receives the events of a run, in order.
///
/// Observers are called synchronously, in registration order, on the thread driving the run. An
/// observer can ask for the run to stop through `control`; the request takes effect before the
/// next unit starts.
pub trait RunObserver {
    /// Handles a single event.
    fn handle_event(&mut self, event: &TestEvent<'_>, control: &mut RunControl);
}
