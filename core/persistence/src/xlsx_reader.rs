// FILENAME: core\persistence\src\xlsx_reader.rs

use crate::{table_from_rows, ImportOptions, PersistenceError};
use calamine::{open_workbook_auto, Data, Reader};
use log::debug;
use migration_engine::{CellValue, Dataset};
use std::path::Path;

/// Reads every worksheet of an XLSX, XLSM, XLSB, XLS or ODS file.
/// Dates arrive as spreadsheet serial numbers.
pub fn load_spreadsheet(path: &Path, options: ImportOptions) -> Result<Dataset, PersistenceError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err(PersistenceError::InvalidFormat(
            "Workbook contains no sheets".to_string(),
        ));
    }

    let mut dataset = Dataset::new();

    for sheet_name in &sheet_names {
        let range = workbook.worksheet_range(sheet_name)?;

        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_value).collect())
            .collect();
        debug!("Sheet '{}': {} raw rows", sheet_name, rows.len());

        dataset.push_table(table_from_rows(sheet_name, rows, options))?;
    }

    Ok(dataset)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::Error(e) => CellValue::Text(format!("{:?}", e)),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
