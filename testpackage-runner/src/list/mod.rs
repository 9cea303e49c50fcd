// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Discovered tests and the ordered plan built from them.
//!
//! A [`TestList`] is what a [`TestEngine`](crate::engine::TestEngine) reports after discovery: an
//! unordered bag of (class, method) pairs. The [`Sequencer`](crate::sequencer::Sequencer) turns it
//! into an [`ExecutionPlan`], which is what actually gets run.

mod plan;
mod test_list;

pub use plan::*;
pub use test_list::*;
