// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testpackage: a test runner that executes the tests which failed most
//! recently first.
//!
//! The basic flow of a run is:
//!
//! 1. [`HistoryStore::load`](history::HistoryStore::load) reads the per-test "runs since last
//!    failure" counters persisted by earlier runs.
//! 2. A [`TestEngine`](engine::TestEngine) discovers the tests in the requested packages.
//! 3. The [`Sequencer`](sequencer::Sequencer) orders them into an
//!    [`ExecutionPlan`](list::ExecutionPlan), promoting recently-failed classes and methods.
//! 4. The [`RunCoordinator`](runner::RunCoordinator) executes the plan one test at a time,
//!    dispatching [`TestEvent`](reporter::events::TestEvent)s to a list of
//!    [`RunObserver`](reporter::RunObserver)s.
//! 5. The [`HistoryRecorder`](reporter::HistoryRecorder) observer computes the next generation
//!    of counters and saves them exactly once, even if the run is aborted.

pub mod config;
pub mod engine;
pub mod errors;
mod helpers;
pub mod history;
pub mod list;
pub mod reporter;
pub mod runner;
pub mod sequencer;
#[cfg(test)]
mod test_helpers;
