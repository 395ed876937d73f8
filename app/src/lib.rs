//! FILENAME: app/src/lib.rs
// PURPOSE: Library side of the command-line front end, shared by the binary and tests.

pub mod cli;
pub mod logging;

pub use cli::{run, run_with_args, Args};
