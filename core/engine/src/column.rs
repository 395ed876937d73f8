//! FILENAME: core/engine/src/column.rs
//! PURPOSE: The column abstraction shared by source and target tables.
//! CONTEXT: A column is a titled sequence of cells. Its values come from one of
//! a closed set of sources, chosen when the column is constructed:
//!
//! - Plain:       concrete backing storage
//! - Placeholder: reserves a position while its construction is deferred
//! - Empty:       unbounded, every row is empty
//! - Filled:      unbounded, every row holds the same constant
//! - Index:       unbounded, row `i` holds `start + i` until rows are reordered
//!
//! All variants answer the same capability set (len, get, set, append, swap,
//! delete). Operations that have no meaning for a variant are no-ops.

use crate::cell::CellValue;

/// The reported length of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLen {
    Rows(usize),
    /// Computed columns answer for any row.
    Unbounded,
}

impl ColumnLen {
    pub fn rows(self) -> Option<usize> {
        match self {
            ColumnLen::Rows(n) => Some(n),
            ColumnLen::Unbounded => None,
        }
    }
}

/// Where a column's values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Plain(Vec<CellValue>),
    Placeholder,
    Empty,
    Filled(CellValue),
    Index(IndexSequence),
}

/// A row counter that stays lazy until rows are moved.
///
/// Rows below `frozen.len()` are served from storage; every later row is
/// computed as `start + row`. Reordering or deleting rows first freezes the
/// affected range so already observed values travel with their rows, and a
/// delete bumps `start` so the lazy tail shifts up by one.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSequence {
    start: i64,
    frozen: Vec<CellValue>,
}

impl IndexSequence {
    pub fn new(start: i64) -> Self {
        IndexSequence {
            start,
            frozen: Vec::new(),
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    /// Number of rows currently held in storage.
    pub fn frozen_len(&self) -> usize {
        self.frozen.len()
    }

    pub fn get(&self, row: usize) -> CellValue {
        match self.frozen.get(row) {
            Some(value) => value.clone(),
            None => self.computed(row),
        }
    }

    fn computed(&self, row: usize) -> CellValue {
        CellValue::Number((self.start + row as i64) as f64)
    }

    /// Materializes every row up to and including `row`.
    fn freeze_through(&mut self, row: usize) {
        while self.frozen.len() <= row {
            let next = self.computed(self.frozen.len());
            self.frozen.push(next);
        }
    }

    pub fn set(&mut self, row: usize, value: CellValue) {
        self.freeze_through(row);
        self.frozen[row] = value;
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.freeze_through(a.max(b));
        self.frozen.swap(a, b);
    }

    pub fn delete(&mut self, row: usize) {
        self.freeze_through(row);
        self.frozen.remove(row);
        self.start += 1;
    }
}

/// A named, ordered sequence of cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    title: String,
    comment: String,
    data: ColumnData,
}

impl Column {
    pub fn new(title: impl Into<String>, data: ColumnData) -> Self {
        Column {
            title: title.into(),
            comment: String::new(),
            data,
        }
    }

    pub fn plain(title: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column::new(title, ColumnData::Plain(values))
    }

    /// A position holder with no title; it is never found by title lookup.
    pub fn placeholder() -> Self {
        Column::new(String::new(), ColumnData::Placeholder)
    }

    pub fn empty(title: impl Into<String>) -> Self {
        Column::new(title, ColumnData::Empty)
    }

    pub fn filled(title: impl Into<String>, value: CellValue) -> Self {
        Column::new(title, ColumnData::Filled(value))
    }

    pub fn index(title: impl Into<String>, start: i64) -> Self {
        Column::new(title, ColumnData::Index(IndexSequence::new(start)))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Replaces title and comment, keeping the data.
    pub fn retitled(mut self, title: impl Into<String>, comment: impl Into<String>) -> Self {
        self.title = title.into();
        self.comment = comment.into();
        self
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.data, ColumnData::Placeholder)
    }

    pub fn len(&self) -> ColumnLen {
        match &self.data {
            ColumnData::Plain(values) => ColumnLen::Rows(values.len()),
            ColumnData::Placeholder => ColumnLen::Rows(0),
            ColumnData::Empty | ColumnData::Filled(_) | ColumnData::Index(_) => ColumnLen::Unbounded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == ColumnLen::Rows(0)
    }

    /// Returns the value at `row`; rows past the end of stored data are empty.
    pub fn get(&self, row: usize) -> CellValue {
        match &self.data {
            ColumnData::Plain(values) => values.get(row).cloned().unwrap_or_default(),
            ColumnData::Placeholder | ColumnData::Empty => CellValue::Empty,
            ColumnData::Filled(value) => value.clone(),
            ColumnData::Index(sequence) => sequence.get(row),
        }
    }

    /// Writes `value` at `row`, padding a plain column with empty cells.
    /// Placeholder, empty and filled columns ignore writes.
    pub fn set(&mut self, row: usize, value: CellValue) {
        match &mut self.data {
            ColumnData::Plain(values) => {
                if values.len() <= row {
                    values.resize(row + 1, CellValue::Empty);
                }
                values[row] = value;
            }
            ColumnData::Index(sequence) => sequence.set(row, value),
            ColumnData::Placeholder | ColumnData::Empty | ColumnData::Filled(_) => {}
        }
    }

    /// Appends a row to a plain column. Unbounded columns already answer for
    /// every row, so appending to them does nothing.
    pub fn append(&mut self, value: CellValue) {
        if let ColumnData::Plain(values) = &mut self.data {
            values.push(value);
        }
    }

    /// Swaps two rows, extending a plain column with empty cells when needed.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        match &mut self.data {
            ColumnData::Plain(values) => {
                let needed = a.max(b) + 1;
                if values.len() < needed {
                    values.resize(needed, CellValue::Empty);
                }
                values.swap(a, b);
            }
            ColumnData::Index(sequence) => sequence.swap(a, b),
            ColumnData::Placeholder | ColumnData::Empty | ColumnData::Filled(_) => {}
        }
    }

    /// Removes a row. Plain columns shorter than `row` are left untouched.
    pub fn delete(&mut self, row: usize) {
        match &mut self.data {
            ColumnData::Plain(values) => {
                if row < values.len() {
                    values.remove(row);
                }
            }
            ColumnData::Index(sequence) => sequence.delete(row),
            ColumnData::Placeholder | ColumnData::Empty | ColumnData::Filled(_) => {}
        }
    }

    /// Materializes the column as a concrete sequence.
    /// Plain columns return their stored values as-is; every other variant is
    /// evaluated for `rows` rows.
    pub fn values(&self, rows: usize) -> Vec<CellValue> {
        match &self.data {
            ColumnData::Plain(values) => values.clone(),
            _ => (0..rows).map(|row| self.get(row)).collect(),
        }
    }

    /// Rewrites every value through `f`.
    /// Index columns are first materialized to `rows` rows and become plain;
    /// empty columns and placeholders have nothing to rewrite.
    pub fn map_values(&mut self, rows: usize, f: impl Fn(&CellValue) -> CellValue) {
        match &mut self.data {
            ColumnData::Plain(values) => {
                for value in values.iter_mut() {
                    *value = f(value);
                }
            }
            ColumnData::Filled(value) => *value = f(value),
            ColumnData::Index(_) => {
                let mapped = self.values(rows).iter().map(&f).collect();
                self.data = ColumnData::Plain(mapped);
            }
            ColumnData::Placeholder | ColumnData::Empty => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Vec<CellValue> {
        values.iter().map(|n| CellValue::Number(*n)).collect()
    }

    #[test]
    fn test_plain_column_get_past_end_is_empty() {
        let column = Column::plain("A", vec![CellValue::from("x")]);
        assert_eq!(column.len(), ColumnLen::Rows(1));
        assert_eq!(column.get(0), CellValue::from("x"));
        assert_eq!(column.get(5), CellValue::Empty);
    }

    #[test]
    fn test_plain_swap_extends_with_empty() {
        let mut column = Column::plain("A", vec![CellValue::from("x")]);
        column.swap(0, 2);
        assert_eq!(
            column.values(0),
            vec![CellValue::Empty, CellValue::Empty, CellValue::from("x")]
        );
    }

    #[test]
    fn test_set_pads_plain_column() {
        let mut column = Column::plain("A", Vec::new());
        column.set(2, CellValue::from(1.0));
        assert_eq!(column.len(), ColumnLen::Rows(3));
        assert_eq!(column.get(1), CellValue::Empty);
    }

    #[test]
    fn test_unbounded_variants() {
        let empty = Column::empty("E");
        let filled = Column::filled("F", CellValue::from("k"));
        assert_eq!(empty.len(), ColumnLen::Unbounded);
        assert_eq!(filled.len(), ColumnLen::Unbounded);
        assert_eq!(empty.get(100), CellValue::Empty);
        assert_eq!(filled.get(100), CellValue::from("k"));
    }

    #[test]
    fn test_placeholder_ignores_everything() {
        let mut column = Column::placeholder();
        column.append(CellValue::from(1.0));
        column.set(3, CellValue::from(1.0));
        column.swap(0, 3);
        column.delete(0);
        assert_eq!(column.len(), ColumnLen::Rows(0));
        assert_eq!(column.get(3), CellValue::Empty);
        assert!(column.is_placeholder());
    }

    #[test]
    fn test_index_is_lazy_until_touched() {
        let column = Column::index("N", 1);
        assert_eq!(column.get(0), CellValue::Number(1.0));
        assert_eq!(column.get(41), CellValue::Number(42.0));
        match column.data() {
            ColumnData::Index(sequence) => assert_eq!(sequence.frozen_len(), 0),
            other => panic!("expected index data, got {:?}", other),
        }
    }

    #[test]
    fn test_index_delete_shifts_tail() {
        let mut column = Column::index("N", 10);
        let before: Vec<CellValue> = (0..8).map(|i| column.get(i)).collect();

        column.delete(3);

        for i in 0..3 {
            assert_eq!(column.get(i), before[i]);
        }
        for i in 3..7 {
            assert_eq!(column.get(i), before[i + 1]);
        }
        // Far past anything frozen the tail is still computed.
        assert_eq!(column.get(100), CellValue::Number(111.0));
    }

    #[test]
    fn test_index_repeated_deletes() {
        let mut column = Column::index("N", 0);
        column.delete(5);
        column.delete(1);
        let observed: Vec<CellValue> = (0..6).map(|i| column.get(i)).collect();
        assert_eq!(observed, numbers(&[0.0, 2.0, 3.0, 4.0, 6.0, 7.0]));
    }

    #[test]
    fn test_index_swap_twice_restores() {
        let mut column = Column::index("N", 1);
        column.swap(1, 4);
        assert_eq!(column.get(1), CellValue::Number(5.0));
        assert_eq!(column.get(4), CellValue::Number(2.0));
        assert_eq!(column.get(9), CellValue::Number(10.0));
        column.swap(1, 4);
        let observed: Vec<CellValue> = (0..6).map(|i| column.get(i)).collect();
        assert_eq!(observed, numbers(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_map_values_materializes_index() {
        let mut column = Column::index("N", 1);
        column.map_values(3, |v| CellValue::from(v.display_value()));
        assert_eq!(
            column.data(),
            &ColumnData::Plain(vec![
                CellValue::from("1"),
                CellValue::from("2"),
                CellValue::from("3")
            ])
        );
    }

    #[test]
    fn test_retitled_keeps_data() {
        let column = Column::plain("A", numbers(&[1.0])).with_comment("old");
        let copy = column.clone().retitled("B", "new");
        assert_eq!(copy.title(), "B");
        assert_eq!(copy.comment(), "new");
        assert_eq!(copy.data(), column.data());
    }
}
