//! Command-line entry point for the `brain` installer.
//!
//! Exit codes: `0` every selected tool succeeded, `1` some tool failed,
//! `2` the configuration (or tool selection) is invalid, `3` every selected
//! tool failed a precondition.

mod app;
mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    match app::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
