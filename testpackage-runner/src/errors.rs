// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Errors produced by testpackage.

use crate::list::TestKey;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{fmt, process::ExitStatus};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse testpackage config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error that occurred while reading `[package.metadata.testpackage]` out of `Cargo.toml`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestReadError {
    /// The manifest exists but could not be read.
    #[error("failed to read manifest at `{path}`")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// The manifest is not valid TOML.
    #[error("failed to parse manifest at `{path}`")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying parse error.
        #[source]
        error: toml::de::Error,
    },

    /// The `package` attribute is neither a string nor an array of strings.
    #[error(
        "in manifest `{path}`, `package.metadata.testpackage.package` must be a string or an \
         array of strings"
    )]
    InvalidPackage {
        /// The manifest path.
        path: Utf8PathBuf,
    },
}

/// Error returned while parsing a [`MaxFail`](crate::config::MaxFail) value from a string.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for max-fail: {reason}")]
pub struct MaxFailParseError {
    reason: String,
}

impl MaxFailParseError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An error that occurred while loading the history store.
///
/// A missing file and malformed lines are not errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryLoadError {
    /// The history file exists but could not be read.
    #[error("failed to read history file at `{path}`")]
    Read {
        /// The path that failed to be read.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while saving the history store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistorySaveError {
    /// The directory containing the history file could not be created.
    #[error("failed to create history directory `{path}`")]
    CreateDir {
        /// The directory path that failed to be created.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// The history file could not be written.
    #[error("failed to write history file `{path}`")]
    Write {
        /// The path that failed to be written.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// An error that occurred while clearing the history store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryClearError {
    /// The history file could not be removed.
    #[error("failed to remove history file `{path}`")]
    Remove {
        /// The path that failed to be removed.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while an engine was discovering tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoverError {
    /// No package names were given.
    #[error("no test packages were specified")]
    NoPackages,

    /// Running the listing command failed.
    #[error("for package `{package}`, running command `{}` failed to execute", .command.join(" "))]
    CommandExec {
        /// The package being listed.
        package: String,

        /// The command that was run.
        command: Vec<String>,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The listing command exited with a failure.
    #[error(
        "for package `{package}`, command `{}` {}\n--- stderr:\n{}\n---",
        .command.join(" "),
        display_exited_with(.exit_status),
        String::from_utf8_lossy(.stderr),
    )]
    CommandFail {
        /// The package being listed.
        package: String,

        /// The command that was run.
        command: Vec<String>,

        /// The exit status of the command.
        exit_status: ExitStatus,

        /// Standard error of the command.
        stderr: Vec<u8>,
    },

    /// The listing command produced output that is not valid UTF-8.
    #[error("for package `{package}`, command `{}` produced non-UTF-8 output", .command.join(" "))]
    CommandNonUtf8 {
        /// The package being listed.
        package: String,

        /// The command that was run.
        command: Vec<String>,
    },

    /// A line in the listing could not be parsed.
    #[error("for package `{package}`, {message}\nfull output:\n{full_output}")]
    ParseLine {
        /// The package being listed.
        package: String,

        /// A descriptive message.
        message: String,

        /// The full output, for context.
        full_output: String,
    },
}

impl DiscoverError {
    pub(crate) fn parse_line(
        package: impl Into<String>,
        message: impl Into<String>,
        full_output: impl Into<String>,
    ) -> Self {
        Self::ParseLine {
            package: package.into(),
            message: message.into(),
            full_output: full_output.into(),
        }
    }
}

/// An error that occurred inside an engine while executing a single test.
///
/// This is distinct from a test failure: the engine could not determine whether the test passed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The test process could not be started.
    #[error("for test `{key}`, running command `{}` failed to execute", .command.join(" "))]
    CommandExec {
        /// The test being executed.
        key: TestKey,

        /// The command that was run.
        command: Vec<String>,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The engine has no record of this test: it was not part of discovery.
    #[error("test `{key}` was not discovered by this engine")]
    UnknownTest {
        /// The test that was requested.
        key: TestKey,
    },
}

/// An error that prevents a run from starting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The execution plan is empty.
    #[error("no test units were resolved, so there is nothing to run")]
    NoTestsResolved,
}

/// An error that occurred while a reporter was writing an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// Displays an error along with its chain of sources, one per line.
pub struct DisplayErrorChain<E>(E);

impl<E: std::error::Error> DisplayErrorChain<E> {
    /// Creates a new display wrapper.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, "\n  caused by: {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

pub(crate) fn display_exited_with(exit_status: &ExitStatus) -> String {
    match exit_status.code() {
        Some(code) => format!("exited with exit code {code}"),
        None => "was terminated by a signal".to_owned(),
    }
}
