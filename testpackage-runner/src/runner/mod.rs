// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution of an [`ExecutionPlan`](crate::list::ExecutionPlan).
//!
//! The [`RunCoordinator`] walks the plan one unit at a time, strictly sequentially. Each event is
//! delivered to every observer before the next one is produced, and cancellation is only checked
//! between units.

mod dispatcher;
mod imp;

pub use imp::*;
