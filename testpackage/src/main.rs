// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use color_eyre::Result;
use testpackage::{TestpackageApp, TestpackageExitCode};

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let cli_args: Vec<_> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let app = match TestpackageApp::try_parse_args(cli_args) {
        Ok(app) => app,
        Err(error) => {
            // --help and --version are reported through clap errors too.
            let code = if error.use_stderr() {
                TestpackageExitCode::INVALID_ARGUMENTS
            } else {
                TestpackageExitCode::OK
            };
            let _ = error.print();
            std::process::exit(code);
        }
    };
    let output = app.init_output();

    match app.exec(output) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr();
            std::process::exit(error.process_exit_code())
        }
    }
}
