//! FILENAME: core/persistence/src/csv_io.rs
//! PURPOSE: CSV import and export of single-table datasets.
//! CONTEXT: A CSV file holds one table named after the file stem. Fields
//! that read as a finite number become numbers, empty fields become empty
//! cells and everything else stays text.

use crate::{table_from_rows, ImportOptions, PersistenceError};
use log::debug;
use migration_engine::{CellValue, Dataset};
use std::path::Path;

pub fn load_csv(path: &Path, options: ImportOptions) -> Result<Dataset, PersistenceError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PersistenceError::InvalidFormat(format!("No file name in {}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        // Rows of varying width are padded when the table is built.
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(infer_cell).collect::<Vec<_>>());
    }
    debug!("CSV '{}': {} raw rows", name, rows.len());

    let mut dataset = Dataset::new();
    dataset.push_table(table_from_rows(name, rows, options))?;
    Ok(dataset)
}

pub fn save_csv(dataset: &Dataset, path: &Path, include_comments: bool) -> Result<(), PersistenceError> {
    let table = match dataset.tables() {
        [table] => table,
        tables => {
            return Err(PersistenceError::InvalidFormat(format!(
                "CSV holds exactly one table, the dataset has {}",
                tables.len()
            )))
        }
    };

    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(table.titles())?;
    if include_comments {
        writer.write_record(table.comments())?;
    }
    for row in table.rows() {
        writer.write_record(row.iter().map(CellValue::display_value))?;
    }
    writer.flush()?;
    Ok(())
}

fn infer_cell(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    // Rejects spellings f64 accepts but a sheet would not, such as "inf" or "NaN".
    let numeric_start = trimmed
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    if numeric_start {
        if let Some(n) = trimmed.parse::<f64>().ok().filter(|n| n.is_finite()) {
            return CellValue::Number(n);
        }
    }
    CellValue::Text(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_cell() {
        assert_eq!(infer_cell("42"), CellValue::Number(42.0));
        assert_eq!(infer_cell(" -1.5 "), CellValue::Number(-1.5));
        assert_eq!(infer_cell(""), CellValue::Empty);
        assert_eq!(infer_cell("  "), CellValue::Empty);
        assert_eq!(infer_cell("inf"), CellValue::Text("inf".to_string()));
        assert_eq!(infer_cell("NaN"), CellValue::Text("NaN".to_string()));
        assert_eq!(infer_cell("12 apples"), CellValue::Text("12 apples".to_string()));
    }
}
