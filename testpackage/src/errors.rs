// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::output::NO_HEADING_TARGET;
use camino::Utf8PathBuf;
use owo_colors::{OwoColorize, Stream};
use std::error::Error;
use testpackage_runner::errors::*;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `testpackage`.
pub enum TestpackageExitCode {}

impl TestpackageExitCode {
    /// Every executed test passed, and at least one test was executed.
    pub const OK: i32 = 0;

    /// A test failed, no tests were executed, or the run was aborted.
    pub const TEST_RUN_FAILED: i32 = 1;

    /// Something went wrong before any test ran: configuration, discovery or history loading.
    pub const SETUP_ERROR: i32 = 1;

    /// The history or a report could not be written after the run.
    pub const WRITE_OUTPUT_ERROR: i32 = 1;

    /// The command line could not be parsed.
    pub const INVALID_ARGUMENTS: i32 = -1;
}

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected error that is reported to the user and turned into an exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("manifest read error")]
    ManifestReadError {
        #[from]
        err: ManifestReadError,
    },
    #[error("no test packages were specified")]
    NoPackages,
    #[error("history load error")]
    HistoryLoadError {
        #[from]
        err: HistoryLoadError,
    },
    #[error("history clear error")]
    HistoryClearError {
        #[from]
        err: HistoryClearError,
    },
    #[error("test discovery failed")]
    DiscoverError {
        #[from]
        err: DiscoverError,
    },
    #[error("no tests to run")]
    RunError {
        #[from]
        err: RunError,
    },
    #[error("{err} (the test run itself {})", run_status(.run_succeeded))]
    HistorySaveError {
        err: HistorySaveError,
        run_succeeded: bool,
    },
    #[error("report write error")]
    ReportWriteError {
        #[from]
        err: WriteEventError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn history_save_error(err: HistorySaveError, run_succeeded: bool) -> Self {
        Self::HistorySaveError { err, run_succeeded }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::ManifestReadError { .. }
            | Self::NoPackages
            | Self::HistoryLoadError { .. }
            | Self::HistoryClearError { .. }
            | Self::DiscoverError { .. }
            | Self::RunError { .. } => TestpackageExitCode::SETUP_ERROR,
            Self::HistorySaveError { .. }
            | Self::ReportWriteError { .. }
            | Self::WriteOutputError { .. } => TestpackageExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine the current directory");
                Some(error as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display()
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file()
                        .if_supports_color(Stream::Stderr, |x| x.bold())
                );
                err.source()
            }
            Self::ManifestReadError { err } => {
                error!("{err}");
                err.source()
            }
            Self::NoPackages => {
                error!(
                    "no test packages were specified: pass them on the command line, set \
                     `package` under [package.metadata.testpackage] in Cargo.toml, or set \
                     TESTPACKAGE_PACKAGE"
                );
                None
            }
            Self::HistoryLoadError { err } => {
                error!("{err}");
                err.source()
            }
            Self::HistoryClearError { err } => {
                error!("{err}");
                err.source()
            }
            Self::DiscoverError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunError { err } => {
                error!("{err}");
                None
            }
            Self::HistorySaveError { err, run_succeeded } => {
                let status = run_status(run_succeeded);
                let status = if *run_succeeded {
                    status.if_supports_color(Stream::Stderr, |x| x.green()).to_string()
                } else {
                    status.if_supports_color(Stream::Stderr, |x| x.red()).to_string()
                };
                error!("{err} (the test run itself {status})");
                err.source()
            }
            Self::ReportWriteError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

impl From<std::io::Error> for ExpectedError {
    fn from(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }
}

fn run_status(run_succeeded: &bool) -> &'static str {
    if *run_succeeded { "passed" } else { "failed" }
}

/// Converts the current directory into a UTF-8 path.
pub(crate) fn current_dir() -> Result<Utf8PathBuf> {
    let path = std::env::current_dir().map_err(|error| ExpectedError::CurrentDirFailed { error })?;
    Utf8PathBuf::try_from(path)
        .map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { path: err.into_path_buf() })
}
