//! FILENAME: core/engine/src/dataset.rs
//! PURPOSE: A named collection of tables.
//! CONTEXT: Sources are produced by the import collaborator and only read by
//! the engine. The target dataset is grown table by table during migration.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::table::{fuzzy_match, Table};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    tables: Vec<Table>,
    index: HashMap<String, usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset::default()
    }

    /// Adds an empty table and returns it for filling.
    pub fn add_table(&mut self, name: impl Into<String>) -> Result<&mut Table, EngineError> {
        let pos = self.push_table(Table::new(name))?;
        Ok(&mut self.tables[pos])
    }

    /// Adds a ready-made table and returns its position.
    pub fn push_table(&mut self, table: Table) -> Result<usize, EngineError> {
        if self.index.contains_key(table.name()) {
            return Err(EngineError::DuplicateTable(table.name().to_string()));
        }
        let pos = self.tables.len();
        self.index.insert(table.name().to_string(), pos);
        self.tables.push(table);
        Ok(pos)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Result<&Table, EngineError> {
        self.index
            .get(name)
            .map(|&pos| &self.tables[pos])
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table, EngineError> {
        match self.index.get(name) {
            Some(&pos) => Ok(&mut self.tables[pos]),
            None => Err(EngineError::TableNotFound(name.to_string())),
        }
    }

    /// Exact name first, then whitespace-insensitive, then anchored regex.
    pub fn table_fuzzy(&self, pattern: &str) -> Result<&Table, EngineError> {
        if let Ok(table) = self.table(pattern) {
            return Ok(table);
        }
        let names: Vec<&str> = self.tables.iter().map(Table::name).collect();
        fuzzy_match(pattern, &names)
            .map(|pos| &self.tables[pos])
            .ok_or_else(|| EngineError::TableNotFound(pattern.to_string()))
    }

    pub fn table_at(&self, pos: usize) -> Option<&Table> {
        self.tables.get(pos)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<Table> for Dataset {
    /// Collects tables, skipping any whose name is already taken.
    fn from_iter<I: IntoIterator<Item = Table>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        for table in iter {
            if let Err(e) = dataset.push_table(table) {
                log::warn!("{}", e);
            }
        }
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut dataset = Dataset::new();
        dataset.add_table("Orders").unwrap();
        dataset.add_table("Order Lines").unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.table("Orders").unwrap().name(), "Orders");
        assert_eq!(dataset.table_at(1).unwrap().name(), "Order Lines");
        assert!(matches!(
            dataset.table("Missing"),
            Err(EngineError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut dataset = Dataset::new();
        dataset.add_table("A").unwrap();
        assert!(matches!(
            dataset.add_table("A"),
            Err(EngineError::DuplicateTable(_))
        ));
    }

    #[test]
    fn test_fuzzy_table_lookup() {
        let dataset: Dataset = vec![Table::new("Order Lines"), Table::new("Sheet 12")]
            .into_iter()
            .collect();
        assert_eq!(dataset.table_fuzzy("OrderLines").unwrap().name(), "Order Lines");
        assert_eq!(dataset.table_fuzzy(r"Sheet \d+").unwrap().name(), "Sheet 12");
        assert!(dataset.table_fuzzy("Nothing").is_err());
    }
}
