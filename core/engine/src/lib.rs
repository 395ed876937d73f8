//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the migration engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.
//!
//! LAYERS:
//! - Data model:    cell, column, table, dataset
//! - Configuration: relaxed (dialect reader), config (serde model)
//! - Construction:  reference, mapping, registry, script, evaluator, construct
//! - Resolution:    suspended (forward-reference bookkeeping)
//! - Orchestration: migrate

pub mod cell;
pub mod column;
pub mod config;
pub mod construct;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod mapping;
pub mod migrate;
pub mod reference;
pub mod registry;
pub mod relaxed;
pub mod script;
pub mod suspended;
pub mod table;

/// Newest configuration version this engine accepts.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types at the crate root
pub use cell::CellValue;
pub use column::{Column, ColumnData, ColumnLen, IndexSequence};
pub use config::{
    ArgSpec, ColumnSpec, MappingSpec, MigrationConfig, ProcessSpec, RefSpec, SheetSpec,
    SubsheetSpec,
};
pub use construct::{ColumnBuilder, Construction};
pub use dataset::Dataset;
pub use error::{BlockedColumn, ColumnKey, EngineError, ScriptError};
pub use evaluator::ScriptValue;
pub use migrate::{migrate, MigrationContext, Migrator};
pub use reference::{Resolved, Sources, TableLocator};
pub use registry::{HookFn, MappingFn, Registry, TransformFn};
pub use script::{ColumnTransform, InterpretedCompiler, ScriptCompiler, TransformContext};
pub use suspended::SuspendedList;
pub use table::Table;
