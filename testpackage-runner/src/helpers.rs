// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! General support code for testpackage-runner.

use chrono::{DateTime, Local};
use std::{
    fmt,
    time::{Duration, Instant},
};

/// Utilities for pluralizing various words based on count.
pub(crate) mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub(crate) fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "class" if `count` is 1, otherwise "classes".
    pub(crate) fn classes_str(count: usize) -> &'static str {
        if count == 1 { "class" } else { "classes" }
    }
}

/// Tracks a start time along with a monotonic clock.
///
/// The realtime clock is only used for reporting; durations come from the monotonic clock.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    pub(crate) fn now() -> Self {
        Self {
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}

/// Displays a duration in the most readable unit: `12ms`, `1.503s` or `2m 05s`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DisplayDuration(pub(crate) Duration);

impl fmt::Display for DisplayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.0;
        if duration < Duration::from_secs(1) {
            write!(f, "{}ms", duration.as_millis())
        } else if duration < Duration::from_secs(60) {
            write!(f, "{:.3}s", duration.as_secs_f64())
        } else {
            let secs = duration.as_secs();
            write!(f, "{}m {:02}s", secs / 60, secs % 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Duration::from_millis(12), "12ms"; "millis")]
    #[test_case(Duration::from_millis(1503), "1.503s"; "seconds")]
    #[test_case(Duration::from_secs(125), "2m 05s"; "minutes")]
    fn display_duration(duration: Duration, expected: &str) {
        assert_eq!(DisplayDuration(duration).to_string(), expected);
    }
}
