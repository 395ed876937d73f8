//! FILENAME: core/engine/src/error.rs
//! PURPOSE: Error taxonomy for data model operations, column construction and migration.

use script_parser::ParseError;
use thiserror::Error;

/// Identifies a column in the dataset under construction: (table, column title).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub table: String,
    pub column: String,
}

impl ColumnKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnKey {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "_This.{}[{}]", self.table, self.column)
    }
}

/// A deferred column that never had all of its forward references satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedColumn {
    pub title: String,
    pub position: usize,
    pub unmet: Vec<ColumnKey>,
}

impl std::fmt::Display for BlockedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' at position {} waits for ", self.title, self.position)?;
        for (i, key) in self.unmet.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

fn describe_blocked(blocked: &[BlockedColumn]) -> String {
    blocked
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration version {found} is newer than engine version {supported}")]
    IncompatibleVersion { found: String, supported: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Duplicate table name: {0}")]
    DuplicateTable(String),

    #[error("Duplicate column title '{title}' in table '{table}'")]
    DuplicateTitle { table: String, title: String },

    #[error("Row {row} out of range in table '{table}' ({rows} rows)")]
    RowOutOfRange { table: String, row: usize, rows: usize },

    #[error("Column position {position} out of range in table '{table}' ({columns} columns)")]
    ColumnOutOfRange {
        table: String,
        position: usize,
        columns: usize,
    },

    #[error("Unresolved dependencies in sheet '{sheet}': {}", describe_blocked(.blocked))]
    Dependency {
        sheet: String,
        blocked: Vec<BlockedColumn>,
    },

    #[error("Script error in column '{column}': {source}")]
    Script {
        column: String,
        #[source]
        source: ScriptError,
    },

    #[error("Hook '{name}' failed: {message}")]
    Hook { name: String, message: String },
}

impl EngineError {
    /// True for failures to find a table or column. Only these can turn into
    /// a deferral, and only for references into the dataset under construction.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            EngineError::TableNotFound(_) | EngineError::ColumnNotFound { .. }
        )
    }
}

/// Failures while compiling or running a transform script.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid script source: {0}")]
    Source(String),

    #[error("Name '{0}' is not defined")]
    UndefinedName(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Value error: {0}")]
    Value(String),

    #[error("'{0}' outside loop")]
    OutsideLoop(&'static str),

    #[error("{0}")]
    Transform(String),
}
