//! FILENAME: app/src/cli.rs
// PURPOSE: Argument parsing and the import -> migrate -> export pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use migration_engine::{ArgSpec, Dataset, MigrationConfig, Migrator};
use persistence::{export_dataset, import_dataset_with, ImportOptions};

use crate::logging;

#[derive(Parser, Debug)]
#[command(
    name = "migrator",
    about = "Migrate tabular data into a new layout described by a configuration file."
)]
pub struct Args {
    /// Migration configuration (JSON or the relaxed dialect).
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: PathBuf,

    /// Primary source workbook or CSV file.
    #[arg(long, short = 'i', value_name = "PATH", required_unless_present = "list_args")]
    pub input: Option<PathBuf>,

    /// Additional source files, addressed as `_Add0.`, `_Add1.`, ... (repeatable).
    #[arg(long = "additional", short = 'a', value_name = "PATH")]
    pub additional: Vec<PathBuf>,

    /// Invocation arguments, substituted for `_arg0`, `_arg1`, ... (repeatable).
    #[arg(long = "arg", value_name = "VALUE")]
    pub args: Vec<String>,

    /// Output workbook (.xlsx) or CSV file.
    #[arg(long, short = 'o', value_name = "PATH", required_unless_present = "list_args")]
    pub output: Option<PathBuf>,

    /// Write column comments as a second row under the titles.
    #[arg(long)]
    pub comments: bool,

    /// Source files carry a comment row under the titles.
    #[arg(long)]
    pub input_comments: bool,

    /// Print the arguments the configuration declares, then exit.
    #[arg(long)]
    pub list_args: bool,

    /// Log at debug level.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Write log lines to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    logging::init(args.verbose, args.log_file.as_deref()).context("initialise logging")?;

    let config = MigrationConfig::load(&args.config)
        .with_context(|| format!("load configuration {}", args.config.display()))?;

    if args.list_args {
        print_declared_args(&config);
        return Ok(());
    }

    let (Some(input), Some(output)) = (&args.input, &args.output) else {
        anyhow::bail!("--input and --output are required");
    };

    let options = ImportOptions {
        comment_row: args.input_comments,
    };
    let source = import_dataset_with(input, options)
        .with_context(|| format!("read source {}", input.display()))?;
    let additional = args
        .additional
        .iter()
        .map(|path| {
            import_dataset_with(path, options)
                .with_context(|| format!("read additional input {}", path.display()))
        })
        .collect::<Result<Vec<Dataset>>>()?;

    let target = Migrator::default()
        .migrate(&config, source, additional, args.args.clone())
        .context("migration failed")?;

    export_dataset(&target, output, args.comments)
        .with_context(|| format!("write output {}", output.display()))?;
    info!("Wrote {}", output.display());
    Ok(())
}

fn print_declared_args(config: &MigrationConfig) {
    if config.args.is_empty() {
        println!("The configuration declares no arguments.");
        return;
    }
    for (i, spec) in config.args.iter().enumerate() {
        match spec {
            ArgSpec::Choice { description, options } => {
                let options: Vec<String> = options
                    .iter()
                    .map(|o| migration_engine::CellValue::from_json(o).display_value())
                    .collect();
                println!("_arg{}: {} (one of: {})", i, description, options.join(", "));
            }
            ArgSpec::Text { description } => println!("_arg{}: {}", i, description),
        }
    }
    if config.additional_input > 0 {
        println!("additional inputs required: {}", config.additional_input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_repeatable_flags() {
        let args = Args::try_parse_from([
            "migrator", "-c", "m.cfg", "-i", "in.xlsx", "-o", "out.xlsx",
            "--arg", "Sales", "--arg", "7", "-a", "codes.csv", "--comments",
        ])
        .unwrap();
        assert_eq!(args.args, vec!["Sales", "7"]);
        assert_eq!(args.additional, vec![PathBuf::from("codes.csv")]);
        assert!(args.comments);
        assert!(!args.verbose);
    }

    #[test]
    fn test_input_required_unless_listing() {
        assert!(Args::try_parse_from(["migrator", "-c", "m.cfg"]).is_err());
        assert!(Args::try_parse_from(["migrator", "-c", "m.cfg", "--list-args"]).is_ok());
    }
}
