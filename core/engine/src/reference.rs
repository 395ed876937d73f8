//! FILENAME: core/engine/src/reference.rs
//! PURPOSE: Resolves (table locator, column title) references to columns.
//! CONTEXT: The locator grammar, checked in this order:
//!
//! - `_This.<name>`  table in the dataset under construction
//! - `_Add<N>.<name>` table in the N-th additional source dataset
//! - `_Sub<N>`       N-th extracted sub-table (fuzzy column lookup)
//! - anything else   table in the primary source dataset
//!
//! Only `_This.` references can fail for a reason that later goes away: the
//! column may simply not be built yet. Every other failure is final.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cell::CellValue;
use crate::column::Column;
use crate::dataset::Dataset;
use crate::error::{ColumnKey, EngineError};
use crate::table::Table;

static THIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_This\.(.+)$").unwrap());
static ADD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_Add(\d+)\.(.+)$").unwrap());
static SUB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_Sub(\d+)$").unwrap());

/// Which dataset a table reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLocator<'r> {
    This(&'r str),
    Additional { index: usize, table: &'r str },
    Sub(usize),
    Source(&'r str),
}

impl<'r> TableLocator<'r> {
    pub fn parse(table_ref: &'r str) -> Self {
        if let Some(caps) = THIS_RE.captures(table_ref) {
            if let Some(name) = caps.get(1) {
                return TableLocator::This(name.as_str());
            }
        }
        if let Some(caps) = ADD_RE.captures(table_ref) {
            if let (Some(index), Some(name)) = (caps.get(1), caps.get(2)) {
                if let Ok(index) = index.as_str().parse() {
                    return TableLocator::Additional {
                        index,
                        table: name.as_str(),
                    };
                }
            }
        }
        if let Some(caps) = SUB_RE.captures(table_ref) {
            if let Some(Ok(index)) = caps.get(1).map(|m| m.as_str().parse()) {
                return TableLocator::Sub(index);
            }
        }
        TableLocator::Source(table_ref)
    }
}

/// The target key of a reference, if it points into the dataset under construction.
pub fn forward_key(table_ref: &str, column: &str) -> Option<ColumnKey> {
    match TableLocator::parse(table_ref) {
        TableLocator::This(table) => Some(ColumnKey::new(table, column)),
        _ => None,
    }
}

/// A resolved reference: the column and the table that owns it.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub table: &'a Table,
    pub column: &'a Column,
}

impl Resolved<'_> {
    /// The column's values, with unbounded columns evaluated over the owning
    /// table's rows.
    pub fn values(&self) -> Vec<CellValue> {
        self.column.values(self.table.row_count())
    }
}

/// Every dataset a reference may resolve into.
#[derive(Debug, Clone, Copy)]
pub struct Sources<'a> {
    pub source: &'a Dataset,
    pub additional: &'a [Dataset],
    pub sub_tables: &'a Dataset,
    pub target: &'a Dataset,
}

impl<'a> Sources<'a> {
    pub fn resolve(&self, table_ref: &str, column: &str) -> Result<Resolved<'a>, EngineError> {
        let table = match TableLocator::parse(table_ref) {
            TableLocator::This(table) => self.target.table(table)?,
            TableLocator::Additional { index, table } => {
                let dataset = self.additional.get(index).ok_or_else(|| {
                    EngineError::Config(format!(
                        "'{}' refers to additional input {}, but only {} were supplied",
                        table_ref,
                        index,
                        self.additional.len()
                    ))
                })?;
                dataset.table(table)?
            }
            TableLocator::Sub(index) => {
                let table = self
                    .sub_tables
                    .table_at(index)
                    .ok_or_else(|| EngineError::TableNotFound(table_ref.to_string()))?;
                return Ok(Resolved {
                    table,
                    column: table.column_fuzzy(column)?,
                });
            }
            TableLocator::Source(table) => self.source.table(table)?,
        };
        Ok(Resolved {
            table,
            column: table.column(column)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(table: &str, titles: &[&str]) -> Dataset {
        let header = titles.iter().map(|t| CellValue::from(*t)).collect();
        let row = titles.iter().map(|_| CellValue::from(1.0)).collect();
        vec![Table::from_rows(table, vec![header, row])].into_iter().collect()
    }

    #[test]
    fn test_locator_grammar() {
        assert_eq!(TableLocator::parse("_This.Out"), TableLocator::This("Out"));
        assert_eq!(
            TableLocator::parse("_Add2.Rates"),
            TableLocator::Additional { index: 2, table: "Rates" }
        );
        assert_eq!(TableLocator::parse("_Sub0"), TableLocator::Sub(0));
        assert_eq!(TableLocator::parse("People"), TableLocator::Source("People"));
        // Near misses fall through to the source dataset.
        assert_eq!(TableLocator::parse("_This"), TableLocator::Source("_This"));
        assert_eq!(TableLocator::parse("_Sub1.X"), TableLocator::Source("_Sub1.X"));
        assert_eq!(TableLocator::parse("_AddX.T"), TableLocator::Source("_AddX.T"));
    }

    #[test]
    fn test_forward_key_only_for_this() {
        assert_eq!(forward_key("_This.Out", "A"), Some(ColumnKey::new("Out", "A")));
        assert_eq!(forward_key("Out", "A"), None);
    }

    #[test]
    fn test_resolve_each_locator() {
        let source = dataset("People", &["Name"]);
        let additional = vec![dataset("Rates", &["Rate"])];
        let sub_tables = dataset("_Sub0", &["Unit Price"]);
        let target = dataset("Out", &["Id"]);
        let sources = Sources {
            source: &source,
            additional: &additional,
            sub_tables: &sub_tables,
            target: &target,
        };

        assert_eq!(sources.resolve("People", "Name").unwrap().column.title(), "Name");
        assert_eq!(sources.resolve("_Add0.Rates", "Rate").unwrap().table.name(), "Rates");
        assert_eq!(
            sources.resolve("_Sub0", "UnitPrice").unwrap().column.title(),
            "Unit Price"
        );
        assert_eq!(
            sources.resolve("_This.Out", "Id").unwrap().values(),
            vec![CellValue::from(1.0)]
        );

        assert!(sources.resolve("_This.Out", "Missing").unwrap_err().is_lookup());
        assert!(matches!(
            sources.resolve("_Add3.Rates", "Rate"),
            Err(EngineError::Config(_))
        ));
    }
}
