// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    ExpectedError, TestpackageExitCode,
    errors::{Result, current_dir},
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use std::io::{BufWriter, Write};
use testpackage_runner::{
    config::{FailFast, MaxFail, RunConfig, resolve_packages},
    engine::{LibtestEngine, TestEngine},
    history::HistoryStore,
    reporter::{ConsoleReporter, HistoryRecorder, JunitReporter, RunObserver},
    runner::RunCoordinator,
    sequencer::{Rank, Sequencer},
};
use tracing::{debug, info};

/// Run tests with the most recently failed ones first.
///
/// testpackage keeps a record of how many runs ago each test class and method last failed, and
/// uses it to run likely failures first.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct TestpackageApp {
    #[command(flatten)]
    output: OutputOpts,

    /// Directory to run in [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    workdir: Option<Utf8PathBuf>,

    /// Config file [default: <workdir>/.testpackage/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl TestpackageApp {
    /// Parses command-line arguments.
    ///
    /// `-ff` is accepted as a short form of `--failfast`.
    pub fn try_parse_args(
        args: impl IntoIterator<Item = String>,
    ) -> std::result::Result<Self, clap::Error> {
        let args = args.into_iter().map(|arg| {
            if arg == "-ff" {
                "--failfast".to_owned()
            } else {
                arg
            }
        });
        Self::try_parse_from(args)
    }

    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let workdir = match self.workdir {
            Some(workdir) => workdir,
            None => current_dir()?,
        };
        let config = RunConfig::from_sources(&workdir, self.config_file.as_deref())?;

        match self.command {
            Command::Run { run_opts, packages } => exec_run(config, run_opts, &packages, output),
            Command::List { packages } => exec_list(&config, &packages, output),
            Command::History { clear } => exec_history(&config, clear),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run tests, most recently failed first
    ///
    /// Tests are discovered in the given packages, ordered by failure history and executed one at
    /// a time. The history is updated at the end of the run.
    Run {
        #[command(flatten)]
        run_opts: RunOpts,

        /// Packages to run tests for [default: from Cargo.toml or config]
        #[arg(value_name = "PACKAGE")]
        packages: Vec<String>,
    },

    /// List tests in the order they would run
    List {
        /// Packages to list tests for [default: from Cargo.toml or config]
        #[arg(value_name = "PACKAGE")]
        packages: Vec<String>,
    },

    /// Show or clear the failure history
    History {
        /// Delete the history file
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Runner options")]
struct RunOpts {
    /// Cancel the run on the first failure (short form: -ff)
    #[arg(long, visible_alias = "fail-fast", conflicts_with = "max_fail")]
    failfast: bool,

    /// Cancel the run after this many failing tests, or "all" to never cancel
    #[arg(long, value_name = "N")]
    max_fail: Option<MaxFail>,

    /// Do not write a JUnit report
    #[arg(long)]
    no_junit: bool,
}

impl RunOpts {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(max_fail) = self.max_fail {
            config.set_fail_fast(FailFast::new(max_fail));
        } else if self.failfast {
            config.set_fail_fast(FailFast::from_flag(true));
        }
        if self.no_junit {
            config.disable_junit();
        }
    }
}

fn exec_run(
    mut config: RunConfig,
    run_opts: RunOpts,
    cli_packages: &[String],
    output: OutputContext,
) -> Result<i32> {
    run_opts.apply(&mut config);

    let packages = packages_to_run(cli_packages, &config)?;
    let store = HistoryStore::load(config.history_path())?;
    let mut engine = LibtestEngine::new(config.workdir());
    let test_list = engine.discover(&packages)?;
    let plan = Sequencer::new(store.counters()).order(&test_list);

    let coordinator = RunCoordinator::new(&mut engine, &plan, &config)?;

    let mut recorder = HistoryRecorder::new(store);
    let mut console = ConsoleReporter::new(BufWriter::new(std::io::stderr()));
    if output.colorize_stderr() {
        console.colorize();
    }
    console.set_unicode(supports_unicode::on(supports_unicode::Stream::Stderr));
    let mut junit = config.junit().cloned().map(JunitReporter::new);

    let mut observers: Vec<&mut dyn RunObserver> = Vec::with_capacity(3);
    if let Some(junit) = &mut junit {
        observers.push(junit);
    }
    observers.push(&mut console);
    observers.push(&mut recorder);

    let outcome = coordinator.run(&mut observers);
    drop(observers);

    console.into_inner().flush()?;
    if let Err(err) = recorder.finish() {
        return Err(ExpectedError::history_save_error(err, outcome.is_success()));
    }
    if let Some(junit) = junit {
        junit.finish()?;
    }

    if outcome.is_success() {
        Ok(TestpackageExitCode::OK)
    } else {
        Ok(TestpackageExitCode::TEST_RUN_FAILED)
    }
}

fn exec_list(config: &RunConfig, cli_packages: &[String], output: OutputContext) -> Result<i32> {
    let packages = packages_to_run(cli_packages, config)?;
    let store = HistoryStore::load(config.history_path())?;
    let test_list = LibtestEngine::new(config.workdir()).discover(&packages)?;
    let plan = Sequencer::new(store.counters()).order(&test_list);

    let stdout = std::io::stdout();
    // Buffer the output to minimize syscalls.
    let mut writer = BufWriter::new(stdout.lock());
    plan.write_human(&mut writer, output.colorize_stdout())?;
    writer.flush()?;
    Ok(TestpackageExitCode::OK)
}

fn exec_history(config: &RunConfig, clear: bool) -> Result<i32> {
    let mut store = HistoryStore::load(config.history_path())?;
    if clear {
        store.clear()?;
        info!("cleared history at {}", display_path(config.workdir(), store.path()));
        return Ok(TestpackageExitCode::OK);
    }

    if store.is_empty() {
        info!(
            "no failure history at {}",
            display_path(config.workdir(), store.path())
        );
        return Ok(TestpackageExitCode::OK);
    }

    let mut entries: Vec<_> = store.entries().collect();
    entries.sort_by(|(a_key, a_runs), (b_key, b_runs)| (a_runs, a_key).cmp(&(b_runs, b_key)));

    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    for (key, runs) in entries {
        writeln!(writer, "{key}: {}", Rank::SinceFailure(runs))?;
    }
    writer.flush()?;
    Ok(TestpackageExitCode::OK)
}

fn packages_to_run(cli_packages: &[String], config: &RunConfig) -> Result<Vec<String>> {
    match resolve_packages(cli_packages, config)? {
        Some((packages, source)) => {
            debug!("running packages {packages:?} (from {source:?})");
            Ok(packages)
        }
        None => Err(ExpectedError::NoPackages),
    }
}

fn display_path<'a>(workdir: &Utf8Path, path: &'a Utf8Path) -> &'a Utf8Path {
    path.strip_prefix(workdir).unwrap_or(path)
}
