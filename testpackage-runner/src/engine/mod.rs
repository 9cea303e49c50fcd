// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! The boundary between testpackage and the thing that actually runs tests.
//!
//! An engine discovers tests in a set of packages and executes one unit at a time. testpackage
//! only decides the order; the engine decides what a package is and how a test is invoked.

mod libtest;

pub use libtest::*;

use crate::{
    errors::{DiscoverError, EngineError},
    list::{TestList, TestUnit},
};
use chrono::{DateTime, FixedOffset};
use std::{fmt, time::Duration};

/// Discovers and executes tests.
pub trait TestEngine {
    /// Discovers every test in `packages`.
    fn discover(&mut self, packages: &[String]) -> Result<TestList, DiscoverError>;

    /// Executes a single unit and reports what happened.
    ///
    /// A failing test is an `Ok` result with at least one [`FailureDetail`]. An `Err` means the
    /// engine could not tell whether the test passed.
    fn execute(&mut self, unit: TestUnit<'_>) -> Result<ExecuteResult, EngineError>;
}

/// The result of executing a single unit.
#[derive(Clone, Debug)]
pub struct ExecuteResult {
    /// The failures reported for this unit. Empty if the unit passed.
    pub failures: Vec<FailureDetail>,

    /// When the unit started executing.
    pub start_time: DateTime<FixedOffset>,

    /// How long the unit took.
    pub time_taken: Duration,

    /// Standard output captured while the unit ran.
    pub stdout: Vec<u8>,

    /// Standard error captured while the unit ran.
    pub stderr: Vec<u8>,
}

impl ExecuteResult {
    /// Returns true if no failures were reported.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single failure reported by an engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureDetail {
    /// The failure message.
    pub message: String,

    /// The chain of causes, outermost first.
    pub causes: Vec<String>,

    /// Where the failure happened, typically `file:line:column`.
    pub location: Option<String>,
}

impl FailureDetail {
    /// Creates a failure with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            location: None,
        }
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Appends a cause.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Builds a failure out of an error and its chain of sources.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut detail = Self::new(error.to_string());
        let mut source = error.source();
        while let Some(cause) = source {
            detail.causes.push(cause.to_string());
            source = cause.source();
        }
        detail
    }

    /// Returns the first line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(location) = &self.location {
            write!(f, "\n  at {location}")?;
        }
        for cause in &self.causes {
            write!(f, "\n  caused by: {cause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::EngineError, list::TestKey};
    use pretty_assertions::assert_eq;
    use std::io;

    #[test]
    fn failure_from_error_chain() {
        let error = EngineError::CommandExec {
            key: TestKey::method("m", "c"),
            command: vec!["bin".to_owned(), "m".to_owned()],
            error: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };

        let detail = FailureDetail::from_error(&error);
        assert_eq!(
            detail.message,
            "for test `m(c)`, running command `bin m` failed to execute"
        );
        assert_eq!(detail.causes, vec!["no such file".to_owned()]);
        assert_eq!(detail.location, None);
    }

    #[test]
    fn failure_display() {
        let detail = FailureDetail::new("assertion failed\nextra")
            .with_location("src/lib.rs:3:5")
            .with_cause("inner");

        assert_eq!(detail.summary(), "assertion failed");
        assert_eq!(
            detail.to_string(),
            "assertion failed\nextra\n  at src/lib.rs:3:5\n  caused by: inner"
        );
    }
}
