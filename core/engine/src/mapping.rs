//! FILENAME: core/engine/src/mapping.rs
//! PURPOSE: Per-cell value substitution driven by a mapping table.
//! CONTEXT: A mapping table sends a cell's current value to a replacement.
//! Two reserved words:
//! - `_Origin` as a replacement keeps the cell unchanged.
//! - `_Other` as a key is the fallback for values without their own entry.
//!   A table without `_Other` keeps unlisted values unchanged.
//!
//! Cells are matched by their display text, so the key `3` matches the number
//! 3 and the text "3" alike. Empty cells only ever match `_Other`.

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};

use crate::cell::CellValue;
use crate::column::Column;

pub const ORIGIN: &str = "_Origin";
pub const OTHER: &str = "_Other";

#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    Origin,
    Value(CellValue),
}

impl Replacement {
    fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(s) if s == ORIGIN => Replacement::Origin,
            other => Replacement::Value(CellValue::from_json(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueMapping {
    entries: HashMap<String, Replacement>,
    other: Replacement,
}

impl ValueMapping {
    pub fn from_json(table: &Map<String, JsonValue>) -> Self {
        let mut entries = HashMap::new();
        let mut other = Replacement::Origin;
        for (key, value) in table {
            let replacement = Replacement::from_json(value);
            if key == OTHER {
                other = replacement;
            } else {
                entries.insert(key.clone(), replacement);
            }
        }
        ValueMapping { entries, other }
    }

    /// True when every entry, including the fallback, keeps cells unchanged.
    pub fn is_identity(&self) -> bool {
        self.other == Replacement::Origin
            && self.entries.values().all(|r| *r == Replacement::Origin)
    }

    fn lookup(&self, cell: &CellValue) -> &Replacement {
        let found = match cell {
            CellValue::Empty => None,
            CellValue::Boolean(b) => self
                .entries
                .get(&cell.display_value())
                .or_else(|| self.entries.get(&b.to_string())),
            _ => self.entries.get(&cell.display_value()),
        };
        found.unwrap_or(&self.other)
    }

    pub fn apply(&self, cell: &CellValue) -> CellValue {
        match self.lookup(cell) {
            Replacement::Origin => cell.clone(),
            Replacement::Value(v) => v.clone(),
        }
    }

    /// Rewrites a column in place; identity mappings leave it untouched.
    pub fn apply_to(&self, column: &mut Column, rows: usize) {
        if self.is_identity() {
            return;
        }
        column.map_values(rows, |cell| self.apply(cell));
    }
}
