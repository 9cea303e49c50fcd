// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run tests with the most recently failed ones first.
//!
//! testpackage remembers, per test class and per test method, how many runs ago it last failed.
//! Each run executes recently-failed tests first, so a regression shows up in seconds rather than
//! at the end of a long suite. With `--failfast`, the run stops at the first failure.
//!
//! The history lives in `.testpackage/history.txt` under the working directory.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
