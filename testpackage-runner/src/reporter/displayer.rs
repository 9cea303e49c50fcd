// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Human-readable console output.

use super::{
    RunObserver,
    events::{CancelReason, RunOutcome, RunStats, TestEvent, TestEventKind},
};
use crate::{
    engine::FailureDetail,
    errors::{DisplayErrorChain, WriteEventError},
    helpers::{DisplayDuration, plural},
    list::TestUnit,
    runner::RunControl,
};
use itertools::Itertools;
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use tracing::warn;

/// Writes one line per test, followed by a summary, to a writer (typically stderr).
///
/// ```text
/// >>  parser_tests.parses_empty: ✔ (3ms)
/// >>  parser_tests.rejects_garbage: ✘
///       assertion failed: result.is_err()
///       at tests/parser_tests.rs:31:5
/// ```
///
/// If writing fails, a warning is logged, the run is cancelled with
/// [`CancelReason::ReportError`], and nothing further is written.
#[derive(Debug)]
pub struct ConsoleReporter<W> {
    writer: W,
    styles: Styles,
    unicode: bool,
    unit_failed: bool,
    write_failed: bool,
}

impl<W: Write> ConsoleReporter<W> {
    /// Creates a new reporter with no colors and ASCII status marks.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            styles: Styles::default(),
            unicode: false,
            unit_failed: false,
            write_failed: false,
        }
    }

    /// Colorizes output.
    pub fn colorize(&mut self) -> &mut Self {
        self.styles.colorize();
        self
    }

    /// Uses `✔` and `✘` rather than `ok` and `FAILED` for per-test status.
    pub fn set_unicode(&mut self, unicode: bool) -> &mut Self {
        self.unicode = unicode;
        self
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn pass_mark(&self) -> &'static str {
        if self.unicode { "✔" } else { "ok" }
    }

    fn fail_mark(&self) -> &'static str {
        if self.unicode { "✘" } else { "FAILED" }
    }

    fn write_event(&mut self, event: &TestEvent<'_>) -> io::Result<()> {
        match &event.kind {
            TestEventKind::RunStarted { plan } => {
                let run_count = plan.run_count();
                let class_count = plan.classes().len();
                write!(
                    self.writer,
                    "{:>12} {} {} in {} {}",
                    "Starting".style(self.styles.pass),
                    run_count.style(self.styles.count),
                    plural::tests_str(run_count),
                    class_count.style(self.styles.count),
                    plural::classes_str(class_count),
                )?;
                let ignored = plan.unit_count() - run_count;
                if ignored > 0 {
                    write!(
                        self.writer,
                        " ({} {})",
                        ignored.style(self.styles.count),
                        "ignored".style(self.styles.skip),
                    )?;
                }
                writeln!(self.writer)?;
            }
            TestEventKind::TestStarted { unit, .. } => {
                self.unit_failed = false;
                self.write_unit(*unit)?;
                self.writer.flush()?;
            }
            TestEventKind::TestFailure { failure, .. } => {
                if !self.unit_failed {
                    self.unit_failed = true;
                    writeln!(self.writer, " {}", self.fail_mark().style(self.styles.fail))?;
                }
                self.write_failure(failure)?;
            }
            TestEventKind::TestFinished { result, .. } => {
                if result.is_success() {
                    writeln!(
                        self.writer,
                        " {} ({})",
                        self.pass_mark().style(self.styles.pass),
                        DisplayDuration(result.time_taken),
                    )?;
                } else {
                    self.write_output("stdout", &result.stdout)?;
                    self.write_output("stderr", &result.stderr)?;
                }
            }
            TestEventKind::TestIgnored { unit } => {
                self.write_unit(*unit)?;
                writeln!(self.writer, " {}", "ignored".style(self.styles.skip))?;
            }
            TestEventKind::RunBeginCancel { reason } => {
                writeln!(
                    self.writer,
                    "{:>12} due to {}",
                    "Cancelling".style(self.styles.fail),
                    reason.style(self.styles.count),
                )?;
            }
            TestEventKind::RunFinished { outcome } => self.write_summary(outcome)?,
        }

        Ok(())
    }

    fn write_unit(&mut self, unit: TestUnit<'_>) -> io::Result<()> {
        write!(
            self.writer,
            ">>  {}.{}:",
            unit.class.short_name().style(self.styles.class),
            unit.method.name.style(self.styles.method),
        )
    }

    fn write_failure(&mut self, failure: &FailureDetail) -> io::Result<()> {
        for line in failure.message.lines() {
            writeln!(self.writer, "      {line}")?;
        }
        if let Some(location) = &failure.location {
            writeln!(self.writer, "      at {}", location.style(self.styles.location))?;
        }
        for cause in &failure.causes {
            writeln!(self.writer, "      caused by: {cause}")?;
        }
        Ok(())
    }

    /// Writes the first line of a failure message and its root cause, aligned under `FAIL`.
    fn write_failure_summary(&mut self, failure: &FailureDetail) -> io::Result<()> {
        write!(self.writer, "{:13}{}", "", failure.summary())?;
        if let Some(location) = &failure.location {
            write!(self.writer, " ({})", location.style(self.styles.location))?;
        }
        writeln!(self.writer)?;
        if let Some(root_cause) = failure.causes.last() {
            writeln!(self.writer, "{:13}caused by: {root_cause}", "")?;
        }
        Ok(())
    }

    fn write_output(&mut self, name: &str, output: &[u8]) -> io::Result<()> {
        if output.is_empty() {
            return Ok(());
        }
        writeln!(
            self.writer,
            "    {}",
            format!("--- {name} ---").style(self.styles.fail)
        )?;
        for line in String::from_utf8_lossy(output).lines() {
            writeln!(self.writer, "    {line}")?;
        }
        Ok(())
    }

    fn write_summary(&mut self, outcome: &RunOutcome) -> io::Result<()> {
        let summary_style = if outcome.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        write!(
            self.writer,
            "------------\n{:>12} ",
            "Summary".style(summary_style)
        )?;
        write!(self.writer, "[{:>8.3}s] ", outcome.elapsed.as_secs_f64())?;
        writeln!(
            self.writer,
            "{} run: {}",
            plural::tests_str(outcome.stats.finished_count),
            SummaryStr(&outcome.stats, &self.styles),
        )?;

        if let Some(reason) = outcome.cancel_reason() {
            writeln!(
                self.writer,
                "{:>12} due to {}: {} not run",
                "Aborted".style(self.styles.fail),
                reason.style(self.styles.count),
                DisplayNotRun(&outcome.stats),
            )?;
        }

        let failures_by_key = outcome
            .failures
            .iter()
            .chunk_by(|failure| failure.key.clone());
        for (key, failures) in &failures_by_key {
            writeln!(
                self.writer,
                "{:>12} {}",
                "FAIL".style(self.styles.fail),
                key.style(self.styles.method),
            )?;
            for failure in failures {
                self.write_failure_summary(&failure.detail)?;
            }
        }

        if outcome.is_success() {
            writeln!(self.writer, "{}", "OK".style(self.styles.pass))?;
        } else {
            writeln!(self.writer, "{}", "FAILED".style(self.styles.fail))?;
        }
        self.writer.flush()
    }
}

impl<W: Write> RunObserver for ConsoleReporter<W> {
    fn handle_event(&mut self, event: &TestEvent<'_>, control: &mut RunControl) {
        if self.write_failed {
            return;
        }
        if let Err(error) = self.write_event(event) {
            warn!("{}", DisplayErrorChain::new(WriteEventError::Io(error)));
            self.write_failed = true;
            control.request_cancel(CancelReason::ReportError);
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    class: Style,
    method: Style,
    location: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.class = Style::new().cyan();
        self.method = Style::new().blue().bold();
        self.location = Style::new().dimmed();
    }
}

struct SummaryStr<'a>(&'a RunStats, &'a Styles);

impl std::fmt::Display for SummaryStr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self(stats, styles) = self;
        write!(
            f,
            "{} {}",
            stats.passed.style(styles.count),
            "passed".style(styles.pass)
        )?;
        if stats.failed > 0 {
            write!(
                f,
                ", {} {}",
                stats.failed.style(styles.count),
                "failed".style(styles.fail)
            )?;
        }
        write!(
            f,
            ", {} {}",
            stats.ignored.style(styles.count),
            "ignored".style(styles.skip)
        )
    }
}

struct DisplayNotRun<'a>(&'a RunStats);

impl std::fmt::Display for DisplayNotRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let not_run = self.0.not_run();
        write!(f, "{not_run} {}", plural::tests_str(not_run))
    }
}
