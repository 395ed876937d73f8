//! FILENAME: core/persistence/src/xlsx_writer.rs

use crate::PersistenceError;
use migration_engine::{CellValue, Dataset};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use std::path::Path;

/// Widest sheet a workbook can hold.
const MAX_COLUMNS: usize = 16_384;

pub fn save_xlsx(dataset: &Dataset, path: &Path, include_comments: bool) -> Result<(), PersistenceError> {
    let mut xlsx = XlsxWorkbook::new();
    let title_format = Format::new().set_bold();
    let comment_format = Format::new().set_italic();

    for table in dataset.tables() {
        if table.column_count() > MAX_COLUMNS {
            return Err(PersistenceError::InvalidFormat(format!(
                "Table '{}' has {} columns, more than a worksheet holds",
                table.name(),
                table.column_count()
            )));
        }

        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(table.name())?;

        for (col, title) in table.titles().into_iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, title, &title_format)?;
        }

        let mut first_data_row = 1;
        if include_comments {
            for (col, comment) in table.comments().into_iter().enumerate() {
                if !comment.is_empty() {
                    worksheet.write_string_with_format(1, col as u16, comment, &comment_format)?;
                }
            }
            first_data_row = 2;
        }

        for (i, row) in table.rows().iter().enumerate() {
            let row_idx = (first_data_row + i) as u32;
            for (col, value) in row.iter().enumerate() {
                write_cell(worksheet, row_idx, col as u16, value)?;
            }
        }
    }

    xlsx.save(path)?;
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
) -> Result<(), PersistenceError> {
    match value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        CellValue::Text(s) => {
            worksheet.write_string(row, col, s)?;
        }
        CellValue::Boolean(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
    }
    Ok(())
}
