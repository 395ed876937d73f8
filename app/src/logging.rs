//! FILENAME: app/src/logging.rs
// PURPOSE: Logger setup for the command-line front end.
// FORMAT: seq|level|category|message

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use env_logger::{Builder, Env, Target};
use log::Level;

/// Sequence counter shared by every log line of the process.
static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst) + 1
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "T",
    }
}

/// The last path segment of a log target, e.g. `migrate` for
/// `migration_engine::migrate`.
fn category(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// Installs the process logger. `RUST_LOG` overrides the default filter,
/// which is `info`, or `debug` with `verbose`. Lines go to stderr unless a
/// log file is given. Returns false when a logger was already installed.
pub fn init(verbose: bool, log_file: Option<&Path>) -> std::io::Result<bool> {
    let default_filter = if verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{}|{}|{}|{}",
            next_seq(),
            level_tag(record.level()),
            category(record.target()),
            record.args()
        )
    });
    if let Some(path) = log_file {
        builder.target(Target::Pipe(Box::new(File::create(path)?)));
    }
    Ok(builder.try_init().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_is_last_segment() {
        assert_eq!(category("migration_engine::migrate"), "migrate");
        assert_eq!(category("persistence"), "persistence");
    }

    #[test]
    fn test_sequence_increases() {
        let a = next_seq();
        let b = next_seq();
        assert!(b > a);
    }
}
