//! FILENAME: core/engine/src/migrate.rs
//! PURPOSE: Orchestrates a migration run from configuration to target dataset.
//! CONTEXT: A run owns every dataset it touches through `MigrationContext`.
//! Hooks receive the context mutably and may replace any binding.
//!
//! ORDER OF WORK:
//! 1. Check the configuration version and the supplied inputs.
//! 2. Extract the declared sub-tables from the source as `_Sub<N>`.
//! 3. Run the pre hooks.
//! 4. Build each sheet: construct columns in declaration order, deferring
//!    those whose `_This` references are not placed yet and releasing them
//!    as soon as the last one is. Derived columns whose first dependency has
//!    no row count of its own (index, filled, empty) are built after every
//!    declared column has been attempted, so they see the final row count.
//!    A sheet that ends with columns still deferred aborts the run.
//! 5. Run the post hooks and hand back the target.

use std::collections::VecDeque;
use std::path::Path;

use log::{debug, info};

use crate::config::{MigrationConfig, SheetSpec};
use crate::construct::{ColumnBuilder, Construction};
use crate::dataset::Dataset;
use crate::error::{ColumnKey, EngineError};
use crate::reference::Sources;
use crate::registry::Registry;
use crate::script::{InterpretedCompiler, ScriptCompiler};
use crate::suspended::{Released, SuspendedList};

/// The bindings of one migration run.
#[derive(Debug, Default)]
pub struct MigrationContext {
    pub source: Dataset,
    /// Sub-tables extracted from `source`, addressed as `_Sub<N>`.
    pub sub_tables: Dataset,
    pub additional: Vec<Dataset>,
    pub target: Dataset,
    pub args: Vec<String>,
}

impl MigrationContext {
    fn sources(&self) -> Sources<'_> {
        Sources {
            source: &self.source,
            additional: &self.additional,
            sub_tables: &self.sub_tables,
            target: &self.target,
        }
    }
}

/// Runs migrations with a given set of named functions and script compiler.
pub struct Migrator {
    registry: Registry,
    compiler: Box<dyn ScriptCompiler>,
}

impl Default for Migrator {
    fn default() -> Self {
        Migrator::new(Registry::with_builtins())
    }
}

impl Migrator {
    pub fn new(registry: Registry) -> Self {
        Migrator {
            registry,
            compiler: Box::new(InterpretedCompiler),
        }
    }

    /// Replaces the compiler used for `script` columns.
    pub fn with_compiler(mut self, compiler: impl ScriptCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Loads the configuration at `path`, then migrates.
    pub fn migrate_file(
        &self,
        path: impl AsRef<Path>,
        source: Dataset,
        additional: Vec<Dataset>,
        args: Vec<String>,
    ) -> Result<Dataset, EngineError> {
        let config = MigrationConfig::load(path)?;
        self.migrate(&config, source, additional, args)
    }

    pub fn migrate(
        &self,
        config: &MigrationConfig,
        source: Dataset,
        additional: Vec<Dataset>,
        args: Vec<String>,
    ) -> Result<Dataset, EngineError> {
        config.validate()?;
        config.validate_inputs(additional.len(), &args)?;
        info!(
            "Migrating {} source table(s) into {} sheet(s)",
            source.len(),
            config.sheets.len()
        );

        let sub_tables = extract_sub_tables(config, &source)?;
        let mut ctx = MigrationContext {
            source,
            sub_tables,
            additional,
            target: Dataset::new(),
            args,
        };

        self.run_hooks(&config.process.pre, &mut ctx)?;
        for sheet in &config.sheets {
            self.build_sheet(sheet, &mut ctx)?;
        }
        self.run_hooks(&config.process.post, &mut ctx)?;

        info!("Migration finished: {} sheet(s) built", ctx.target.len());
        Ok(ctx.target)
    }

    fn run_hooks(&self, names: &[String], ctx: &mut MigrationContext) -> Result<(), EngineError> {
        for name in names {
            let hook = self.registry.hook(name)?;
            debug!("Running hook '{}'", name);
            hook(ctx).map_err(|e| EngineError::Hook {
                name: name.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn build_sheet(&self, sheet: &SheetSpec, ctx: &mut MigrationContext) -> Result<(), EngineError> {
        info!("Building sheet '{}' ({} columns)", sheet.name, sheet.columns.len());
        ctx.target.add_table(sheet.name.as_str())?;
        let mut suspended = SuspendedList::new(sheet.name.as_str());
        let mut postponed = Vec::new();

        for spec in &sheet.columns {
            let position = ctx.target.table(&sheet.name)?.column_count();
            let attempt = Released {
                spec: spec.clone(),
                position,
            };
            self.place(ctx, &sheet.name, attempt, false, &mut suspended, &mut postponed)?;
        }

        // Row count is final once every declared column has been attempted.
        for attempt in std::mem::take(&mut postponed) {
            self.place(ctx, &sheet.name, attempt, true, &mut suspended, &mut postponed)?;
        }

        suspended.drain_check()
    }

    /// Attempts one column at `attempt.position`. A built column is placed and
    /// announced to the suspended list; every column that releases in turn is
    /// placed the same way, transitively.
    fn place(
        &self,
        ctx: &mut MigrationContext,
        sheet: &str,
        attempt: Released,
        sheet_complete: bool,
        suspended: &mut SuspendedList,
        postponed: &mut Vec<Released>,
    ) -> Result<(), EngineError> {
        let mut queue = VecDeque::from([attempt]);
        while let Some(Released { spec, position }) = queue.pop_front() {
            match self.construct(ctx, &spec, sheet_complete)? {
                Construction::Built(column) => {
                    debug!("Column '{}' placed at position {}", spec.title, position);
                    ctx.target.table_mut(sheet)?.insert_column(position, column)?;
                    queue.extend(suspended.notify(&ColumnKey::new(sheet, spec.title.as_str())));
                }
                Construction::Deferred(unmet) => {
                    debug!(
                        "Column '{}' deferred at position {}, waiting for {} column(s)",
                        spec.title,
                        position,
                        unmet.len()
                    );
                    self.reserve(ctx, sheet, position)?;
                    suspended.defer(spec, position, unmet)?;
                }
                Construction::Postponed => {
                    self.reserve(ctx, sheet, position)?;
                    postponed.push(Released { spec, position });
                }
            }
        }
        Ok(())
    }

    /// Holds `position` with a placeholder unless it is already held.
    fn reserve(&self, ctx: &mut MigrationContext, sheet: &str, position: usize) -> Result<(), EngineError> {
        let table = ctx.target.table_mut(sheet)?;
        if position >= table.column_count() {
            table.reserve_placeholder();
        }
        Ok(())
    }

    fn construct(
        &self,
        ctx: &MigrationContext,
        spec: &crate::config::ColumnSpec,
        sheet_complete: bool,
    ) -> Result<Construction, EngineError> {
        ColumnBuilder {
            sources: ctx.sources(),
            registry: &self.registry,
            compiler: self.compiler.as_ref(),
            args: &ctx.args,
            sheet_complete,
        }
        .build(spec)
    }
}

fn extract_sub_tables(config: &MigrationConfig, source: &Dataset) -> Result<Dataset, EngineError> {
    let mut sub_tables = Dataset::new();
    for (i, spec) in config.process.subsheets.iter().enumerate() {
        let name = format!("_Sub{}", i);
        let table = source
            .table(&spec.table)?
            .sub_table(name.as_str(), spec.rows, spec.cols, spec.header)?;
        debug!(
            "Extracted {} from '{}' ({} rows, {} columns)",
            name,
            spec.table,
            table.row_count(),
            table.column_count()
        );
        sub_tables.push_table(table)?;
    }
    Ok(sub_tables)
}

/// Migrates with the built-in named functions and the script interpreter.
pub fn migrate(
    config: &MigrationConfig,
    source: Dataset,
    additional: Vec<Dataset>,
    args: Vec<String>,
) -> Result<Dataset, EngineError> {
    Migrator::default().migrate(config, source, additional, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::table::Table;

    fn source() -> Dataset {
        let rows = vec![
            vec!["Name".into(), "Age".into()],
            vec!["Al".into(), 30.0.into()],
            vec!["Bo".into(), 41.0.into()],
        ];
        vec![Table::from_rows("People", rows)].into_iter().collect()
    }

    #[test]
    fn test_cascade_places_released_columns_at_reserved_positions() {
        // C waits on B, B waits on A; A comes last.
        let config = MigrationConfig::parse(
            "{sheets: [{name: Out, columns: [
                {title: C, dependence: [[_This.Out, B]], transform: coalesce},
                {title: B, dependence: [[_This.Out, A]], transform: coalesce},
                {title: A, copy_from: [People, Name]},
            ]}]}",
        )
        .unwrap();
        let target = migrate(&config, source(), vec![], vec![]).unwrap();
        let out = target.table("Out").unwrap();
        assert_eq!(out.titles(), vec!["C", "B", "A"]);
        for title in ["A", "B", "C"] {
            assert_eq!(out.column(title).unwrap().get(1), CellValue::from("Bo"));
        }
    }

    #[test]
    fn test_sheet_name_collision_with_hook_table() {
        let mut migrator = Migrator::default();
        migrator.registry_mut().register_hook("make_out", |ctx: &mut MigrationContext| {
            ctx.target.add_table("Out")?;
            Ok(())
        });
        let config = MigrationConfig::parse(
            "{process: {pre: make_out}, sheets: [{name: Out, columns: []}]}",
        )
        .unwrap();
        let err = migrator.migrate(&config, source(), vec![], vec![]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTable(_)));
    }

    #[test]
    fn test_failing_hook_is_named() {
        let mut migrator = Migrator::default();
        migrator.registry_mut().register_hook("needs_orders", |ctx: &mut MigrationContext| {
            ctx.source.table("Orders")?;
            Ok(())
        });
        let config = MigrationConfig::parse("{process: {post: [needs_orders]}, sheets: []}").unwrap();
        match migrator.migrate(&config, source(), vec![], vec![]).unwrap_err() {
            EngineError::Hook { name, message } => {
                assert_eq!(name, "needs_orders");
                assert!(message.contains("Orders"), "{}", message);
            }
            other => panic!("expected a hook error, got {}", other),
        }
    }

    #[test]
    fn test_sub_tables_named_by_position() {
        let config = MigrationConfig::parse(
            "{process: {subsheets: [[People, [[0, 1], [0, 0]], false]]},
              sheets: [{name: Out, columns: [{title: N, copy_from: [_Sub0, Name]}]}]}",
        )
        .unwrap();
        let target = migrate(&config, source(), vec![], vec![]).unwrap();
        let out = target.table("Out").unwrap();
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.column("N").unwrap().get(0), CellValue::from("Al"));
    }
}
