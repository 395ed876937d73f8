//! FILENAME: core/engine/src/table.rs
//! PURPOSE: An ordered list of titled columns sharing one row index space.
//! CONTEXT: Tables are built either from row-oriented input (the import
//! collaborator) or column by column (the migration engine). Titles are unique
//! within a table; placeholders reserve positions but are never found by title.
//!
//! ROW COUNT:
//! The row count is the largest concrete length across the columns. Unbounded
//! columns (empty, filled, index) and placeholders do not contribute.

use std::collections::HashMap;

use log::warn;
use regex::Regex;

use crate::cell::CellValue;
use crate::column::{Column, ColumnLen};
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    /// Title -> position. When titles collide the first occurrence wins.
    title_index: HashMap<String, usize>,
    row_count: usize,
}

fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_empty)
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
            title_index: HashMap::new(),
            row_count: 0,
        }
    }

    /// Builds a table from row-oriented cells.
    /// The first row supplies the titles. Fully empty rows are dropped wherever
    /// they appear, so the result has no trailing blank rows either.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut rows = rows.into_iter();
        let titles: Vec<String> = match rows.next() {
            Some(header) => header.iter().map(CellValue::display_value).collect(),
            None => return Table::new(name),
        };
        let data: Vec<Vec<CellValue>> = rows.filter(|row| !is_blank_row(row)).collect();
        Table::from_parts(name, titles, data)
    }

    /// Builds a table from titles and data rows, keeping the rows as given.
    /// Short rows are padded with empty cells; cells past the last title are dropped.
    pub fn from_parts(
        name: impl Into<String>,
        mut titles: Vec<String>,
        data: Vec<Vec<CellValue>>,
    ) -> Self {
        let mut table = Table::new(name);

        // Spreadsheet ranges often carry untitled, unused columns on the right.
        while let Some(last) = titles.last() {
            let col = titles.len() - 1;
            let unused = data
                .iter()
                .all(|row| row.get(col).map_or(true, CellValue::is_empty));
            if last.is_empty() && unused {
                titles.pop();
            } else {
                break;
            }
        }

        let mut columns: Vec<Vec<CellValue>> = vec![Vec::with_capacity(data.len()); titles.len()];
        for row in data {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().unwrap_or_default());
            }
        }

        for (pos, (title, values)) in titles.into_iter().zip(columns).enumerate() {
            if table.title_index.contains_key(&title) {
                warn!(
                    "Table '{}': duplicate column title '{}', later column is only reachable by position",
                    table.name, title
                );
            } else {
                table.title_index.insert(title.clone(), pos);
            }
            table.columns.push(Column::plain(title, values));
        }
        table.recount();
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn titles(&self) -> Vec<&str> {
        self.columns.iter().map(Column::title).collect()
    }

    fn reindex(&mut self) {
        self.title_index.clear();
        for (pos, column) in self.columns.iter().enumerate() {
            if column.is_placeholder() {
                continue;
            }
            self.title_index
                .entry(column.title().to_string())
                .or_insert(pos);
        }
    }

    fn recount(&mut self) {
        self.row_count = self
            .columns
            .iter()
            .filter_map(|c| c.len().rows())
            .max()
            .unwrap_or(0);
    }

    fn check_new_title(&self, column: &Column) -> Result<(), EngineError> {
        if !column.is_placeholder() && self.title_index.contains_key(column.title()) {
            return Err(EngineError::DuplicateTitle {
                table: self.name.clone(),
                title: column.title().to_string(),
            });
        }
        Ok(())
    }

    pub fn comments(&self) -> Vec<&str> {
        self.columns.iter().map(Column::comment).collect()
    }

    /// Assigns comments by position. Extra comments are ignored.
    pub fn set_comments(&mut self, comments: Vec<String>) {
        for (column, comment) in self.columns.iter_mut().zip(comments) {
            column.set_comment(comment);
        }
    }

    // ========================================================================
    // COLUMN PLACEMENT
    // ========================================================================

    /// Appends a column and returns its position.
    pub fn append_column(&mut self, column: Column) -> Result<usize, EngineError> {
        self.check_new_title(&column)?;
        let pos = self.columns.len();
        if !column.is_placeholder() {
            self.title_index.insert(column.title().to_string(), pos);
        }
        if let ColumnLen::Rows(n) = column.len() {
            self.row_count = self.row_count.max(n);
        }
        self.columns.push(column);
        Ok(pos)
    }

    /// Places a column at `pos`.
    /// A placeholder at `pos` is replaced; any other column there is shifted
    /// right. Positions past the end are reached by padding with placeholders.
    pub fn insert_column(&mut self, pos: usize, column: Column) -> Result<(), EngineError> {
        self.check_new_title(&column)?;
        if pos >= self.columns.len() {
            self.columns.resize_with(pos, Column::placeholder);
            self.columns.push(column);
        } else if self.columns[pos].is_placeholder() {
            self.columns[pos] = column;
        } else {
            self.columns.insert(pos, column);
        }
        self.reindex();
        self.recount();
        Ok(())
    }

    /// Appends a placeholder and returns the position it holds.
    pub fn reserve_placeholder(&mut self) -> usize {
        self.columns.push(Column::placeholder());
        self.columns.len() - 1
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    pub fn position(&self, title: &str) -> Option<usize> {
        self.title_index.get(title).copied()
    }

    pub fn column_at(&self, pos: usize) -> Option<&Column> {
        self.columns.get(pos)
    }

    pub fn column(&self, title: &str) -> Result<&Column, EngineError> {
        self.position(title)
            .map(|pos| &self.columns[pos])
            .ok_or_else(|| EngineError::ColumnNotFound {
                table: self.name.clone(),
                column: title.to_string(),
            })
    }

    /// Finds a column by exact title, then ignoring whitespace, then by
    /// treating `pattern` as a regular expression over the whole title.
    pub fn column_fuzzy(&self, pattern: &str) -> Result<&Column, EngineError> {
        if let Ok(column) = self.column(pattern) {
            return Ok(column);
        }
        let titles: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !c.is_placeholder())
            .map(Column::title)
            .collect();
        match fuzzy_match(pattern, &titles) {
            Some(i) => self.column(titles[i]),
            None => Err(EngineError::ColumnNotFound {
                table: self.name.clone(),
                column: pattern.to_string(),
            }),
        }
    }

    // ========================================================================
    // ROW OPERATIONS
    // ========================================================================

    fn check_row(&self, row: usize) -> Result<(), EngineError> {
        if row >= self.row_count {
            return Err(EngineError::RowOutOfRange {
                table: self.name.clone(),
                row,
                rows: self.row_count,
            });
        }
        Ok(())
    }

    /// Writes one cell, growing the row count if the column is plain and
    /// `row` lies past the current end.
    pub fn set_value(&mut self, title: &str, row: usize, value: CellValue) -> Result<(), EngineError> {
        let pos = self.position(title).ok_or_else(|| EngineError::ColumnNotFound {
            table: self.name.clone(),
            column: title.to_string(),
        })?;
        self.columns[pos].set(row, value);
        self.recount();
        Ok(())
    }

    /// Swaps two rows in every column. Shorter plain columns are extended with
    /// empty cells as needed.
    pub fn swap_rows(&mut self, a: usize, b: usize) -> Result<(), EngineError> {
        if a == b {
            return Ok(());
        }
        self.check_row(a.max(b))?;
        for column in self.columns.iter_mut() {
            column.swap(a, b);
        }
        Ok(())
    }

    pub fn delete_row(&mut self, row: usize) -> Result<(), EngineError> {
        self.check_row(row)?;
        for column in self.columns.iter_mut() {
            column.delete(row);
        }
        self.recount();
        Ok(())
    }

    /// Moves a row to the bottom of the table, keeping the relative order of
    /// the rows below it.
    pub fn move_to_end(&mut self, row: usize) -> Result<(), EngineError> {
        self.check_row(row)?;
        for i in row..self.row_count - 1 {
            self.swap_rows(i, i + 1)?;
        }
        Ok(())
    }

    /// Row-major view of the table, `row_count` rows by `column_count` cells.
    pub fn rows(&self) -> Vec<Vec<CellValue>> {
        (0..self.row_count)
            .map(|row| self.columns.iter().map(|c| c.get(row)).collect())
            .collect()
    }

    // ========================================================================
    // SUB-TABLES
    // ========================================================================

    /// Extracts a rectangular region as a new table.
    ///
    /// `rows` and `cols` are inclusive, zero-based bounds over data rows and
    /// column positions. With `header`, the first row of the region supplies
    /// the titles; otherwise the source titles are kept. The region is cut at
    /// the first of two consecutive fully empty rows and trailing empty rows
    /// are dropped.
    pub fn sub_table(
        &self,
        name: impl Into<String>,
        rows: (usize, usize),
        cols: (usize, usize),
        header: bool,
    ) -> Result<Table, EngineError> {
        let (c0, c1) = cols;
        if c0 > c1 || c1 >= self.columns.len() {
            return Err(EngineError::ColumnOutOfRange {
                table: self.name.clone(),
                position: c1.max(c0),
                columns: self.columns.len(),
            });
        }
        let (r0, r1) = rows;
        if r0 > r1 || r0 >= self.row_count {
            return Err(EngineError::RowOutOfRange {
                table: self.name.clone(),
                row: r0,
                rows: self.row_count,
            });
        }
        let r1 = r1.min(self.row_count - 1);

        let mut region: Vec<Vec<CellValue>> = (r0..=r1)
            .map(|row| (c0..=c1).map(|c| self.columns[c].get(row)).collect())
            .collect();

        let titles: Vec<String> = if header {
            region
                .remove(0)
                .iter()
                .map(CellValue::display_value)
                .collect()
        } else {
            (c0..=c1)
                .map(|c| self.columns[c].title().to_string())
                .collect()
        };

        if let Some(cut) = region
            .windows(2)
            .position(|pair| is_blank_row(&pair[0]) && is_blank_row(&pair[1]))
        {
            region.truncate(cut);
        }
        while region.last().is_some_and(|row| is_blank_row(row)) {
            region.pop();
        }

        Ok(Table::from_parts(name, titles, region))
    }
}

/// Returns the index of the first candidate matching `pattern` ignoring
/// whitespace, or failing that, matching it as an anchored regular expression.
pub(crate) fn fuzzy_match(pattern: &str, candidates: &[&str]) -> Option<usize> {
    let squeeze = |s: &str| -> String { s.chars().filter(|c| !c.is_whitespace()).collect() };
    let wanted = squeeze(pattern);
    if let Some(i) = candidates.iter().position(|c| squeeze(c) == wanted) {
        return Some(i);
    }
    let re = Regex::new(&format!("^(?:{})$", pattern)).ok()?;
    candidates.iter().position(|c| re.is_match(c))
}
