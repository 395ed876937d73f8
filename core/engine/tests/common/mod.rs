//! FILENAME: tests/common/mod.rs
//! Fixtures shared by the migration engine integration tests.

#![allow(dead_code)]

use migration_engine::{migrate, CellValue, Dataset, EngineError, MigrationConfig, Table};

/// Installs a test logger once; repeated calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn text(s: &str) -> CellValue {
    CellValue::from(s)
}

pub fn num(n: f64) -> CellValue {
    CellValue::Number(n)
}

/// A dataset with one table built from a header row and data rows.
pub fn dataset(table: &str, titles: &[&str], rows: Vec<Vec<CellValue>>) -> Dataset {
    let mut all = vec![titles.iter().map(|t| text(t)).collect::<Vec<_>>()];
    all.extend(rows);
    vec![Table::from_rows(table, all)].into_iter().collect()
}

/// People(Name, Age, Joined) with three rows.
pub fn people() -> Dataset {
    dataset(
        "People",
        &["Name", "Age", "Joined"],
        vec![
            vec![text("Al"), num(30.0), num(45292.0)],
            vec![text("Bo"), num(41.0), text("2023-07-15")],
            vec![text("Cy"), CellValue::Empty, CellValue::Empty],
        ],
    )
}

/// Parses a relaxed configuration, panicking with the error on failure.
pub fn config(text: &str) -> MigrationConfig {
    match MigrationConfig::parse(text) {
        Ok(config) => config,
        Err(e) => panic!("configuration did not parse: {}", e),
    }
}

/// Runs a migration with the default migrator.
pub fn run(config_text: &str, source: Dataset, args: &[&str]) -> Result<Dataset, EngineError> {
    init_logging();
    let args = args.iter().map(|a| a.to_string()).collect();
    migrate(&config(config_text), source, vec![], args)
}

/// The values of one output column, over its table's rows.
pub fn column_values(target: &Dataset, table: &str, title: &str) -> Vec<CellValue> {
    let table = target.table(table).unwrap();
    table.column(title).unwrap().values(table.row_count())
}
