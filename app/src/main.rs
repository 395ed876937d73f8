//! FILENAME: app/src/main.rs
// PURPOSE: Command-line entry point. Exit code is non-zero on any error.

use std::process::ExitCode;

fn main() -> ExitCode {
    match migrator_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
