//! FILENAME: core/persistence/src/lib.rs
//! Migration Persistence Module
//!
//! Reads source datasets from spreadsheet and CSV files and writes migrated
//! datasets back out. Every worksheet becomes one table: its first row holds
//! the column titles and, when asked for, the second row holds column
//! comments.

mod csv_io;
mod error;
mod xlsx_reader;
mod xlsx_writer;

pub use csv_io::{load_csv, save_csv};
pub use error::PersistenceError;
pub use xlsx_reader::load_spreadsheet;
pub use xlsx_writer::save_xlsx;

use log::info;
use migration_engine::{CellValue, Dataset, Table};
use std::path::Path;

// ============================================================================
// FILE KINDS
// ============================================================================

/// Spreadsheet formats calamine can open.
const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Spreadsheet,
    Csv,
}

impl FileKind {
    /// Picks the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, PersistenceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileKind::Spreadsheet)
        } else if ext == "csv" {
            Ok(FileKind::Csv)
        } else {
            Err(PersistenceError::UnsupportedExtension(
                path.display().to_string(),
            ))
        }
    }
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// The row under the titles holds column comments rather than data.
    pub comment_row: bool,
}

pub fn import_dataset(path: &Path) -> Result<Dataset, PersistenceError> {
    import_dataset_with(path, ImportOptions::default())
}

pub fn import_dataset_with(path: &Path, options: ImportOptions) -> Result<Dataset, PersistenceError> {
    let dataset = match FileKind::from_path(path)? {
        FileKind::Spreadsheet => load_spreadsheet(path, options)?,
        FileKind::Csv => load_csv(path, options)?,
    };
    info!(
        "Imported {} table(s) from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Builds a table from raw sheet rows.
pub(crate) fn table_from_rows(
    name: &str,
    mut rows: Vec<Vec<CellValue>>,
    options: ImportOptions,
) -> Table {
    if !options.comment_row || rows.len() < 2 {
        return Table::from_rows(name, rows);
    }
    let comments: Vec<String> = rows.remove(1).iter().map(CellValue::display_value).collect();
    let mut table = Table::from_rows(name, rows);
    table.set_comments(comments);
    table
}

// ============================================================================
// EXPORT
// ============================================================================

/// Writes a dataset. XLSX gets one worksheet per table; CSV holds exactly one
/// table.
pub fn export_dataset(
    dataset: &Dataset,
    path: &Path,
    include_comments: bool,
) -> Result<(), PersistenceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" => save_xlsx(dataset, path, include_comments)?,
        "csv" => save_csv(dataset, path, include_comments)?,
        _ => {
            return Err(PersistenceError::UnsupportedExtension(
                path.display().to_string(),
            ))
        }
    }
    info!("Exported {} table(s) to {}", dataset.len(), path.display());
    Ok(())
}
