//! FILENAME: core/engine/src/construct.rs
//! PURPOSE: Builds one target column from its configuration entry.
//! CONTEXT: The builder resolves every reference the entry names. When a
//! reference into the dataset under construction (`_This.`) cannot be
//! resolved yet, the builder does not fail: it reports the set of keys it is
//! waiting for, and the migration defers the column until they appear.
//! Lookup failures against any other dataset are fatal.

use std::collections::BTreeSet;

use log::debug;

use crate::cell::CellValue;
use crate::column::Column;
use crate::config::{
    integer_value, substitute_arg, ColumnSpec, DeriveBody, MappingSpec, RefSpec, Strategy,
};
use crate::error::{ColumnKey, EngineError};
use crate::mapping::ValueMapping;
use crate::reference::{Resolved, Sources};
use crate::registry::{apply_mapping_fn, Registry};
use crate::script::{ScriptCompiler, TransformContext};

/// Outcome of a construction attempt.
#[derive(Debug)]
pub enum Construction {
    Built(Column),
    /// The `_This` references that do not resolve yet.
    Deferred(BTreeSet<ColumnKey>),
    /// A derived column whose first dependency has no row count of its own.
    /// It is built once the sheet's row count is final.
    Postponed,
}

/// Everything needed to build a column.
pub struct ColumnBuilder<'a> {
    pub sources: Sources<'a>,
    pub registry: &'a Registry,
    pub compiler: &'a dyn ScriptCompiler,
    pub args: &'a [String],
    /// Set for the pass that runs after every declared column of the sheet
    /// has been attempted. Postponed columns are built then.
    pub sheet_complete: bool,
}

impl<'a> ColumnBuilder<'a> {
    pub fn build(&self, spec: &ColumnSpec) -> Result<Construction, EngineError> {
        let column = match spec.strategy()? {
            Strategy::Copy { from, mapping } => {
                let resolved = match self.resolve_all(std::slice::from_ref(from))? {
                    Ok(mut resolved) => resolved.remove(0),
                    Err(unmet) => return Ok(Construction::Deferred(unmet)),
                };
                self.copy(spec, resolved, mapping)?
            }
            Strategy::Index(start) => {
                let value = substitute_arg(start, self.args)?;
                let start = integer_value(&value).ok_or_else(|| {
                    EngineError::Config(format!(
                        "column '{}': index_start must be an integer, got {}",
                        spec.title, value
                    ))
                })?;
                debug!("Column '{}': index from {}", spec.title, start);
                Column::index(spec.title.as_str(), start).with_comment(spec.comment())
            }
            Strategy::Fill(value) => {
                let value = CellValue::from_json(&substitute_arg(value, self.args)?);
                debug!("Column '{}': filled with '{}'", spec.title, value);
                Column::filled(spec.title.as_str(), value).with_comment(spec.comment())
            }
            Strategy::Derive { dependence, body } => {
                let resolved = match self.resolve_all(dependence)? {
                    Ok(resolved) => resolved,
                    Err(unmet) => return Ok(Construction::Deferred(unmet)),
                };
                let unbounded = resolved
                    .first()
                    .is_some_and(|r| r.column.len().rows().is_none());
                if unbounded && !self.sheet_complete {
                    debug!("Column '{}': postponed until the sheet is complete", spec.title);
                    return Ok(Construction::Postponed);
                }
                self.derive(spec, &resolved, body)?
            }
            Strategy::Empty => Column::empty(spec.title.as_str()).with_comment(spec.comment()),
        };
        Ok(Construction::Built(column))
    }

    /// Resolves every reference. The inner error is the set of `_This` keys
    /// that failed; any other failure is returned as the outer error.
    fn resolve_all(
        &self,
        refs: &[RefSpec],
    ) -> Result<Result<Vec<Resolved<'a>>, BTreeSet<ColumnKey>>, EngineError> {
        let mut resolved = Vec::with_capacity(refs.len());
        let mut unmet = BTreeSet::new();
        for reference in refs {
            match self.sources.resolve(reference.table(), reference.column()) {
                Ok(found) => resolved.push(found),
                Err(e) if e.is_lookup() => match reference.forward_key() {
                    Some(key) => {
                        unmet.insert(key);
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
        if unmet.is_empty() {
            Ok(Ok(resolved))
        } else {
            Ok(Err(unmet))
        }
    }

    fn copy(
        &self,
        spec: &ColumnSpec,
        resolved: Resolved<'_>,
        mapping: Option<&MappingSpec>,
    ) -> Result<Column, EngineError> {
        let rows = resolved.table.row_count();
        let mut column = resolved
            .column
            .clone()
            .retitled(spec.title.as_str(), spec.comment());
        match mapping {
            Some(MappingSpec::Table(table)) => {
                ValueMapping::from_json(table).apply_to(&mut column, rows);
            }
            Some(MappingSpec::Function(name)) => {
                let f = self.registry.mapping(name)?;
                apply_mapping_fn(f, &mut column, rows);
            }
            None => {}
        }
        debug!(
            "Column '{}': copied from {}[{}]",
            spec.title,
            resolved.table.name(),
            resolved.column.title()
        );
        Ok(column)
    }

    fn derive(
        &self,
        spec: &ColumnSpec,
        resolved: &[Resolved<'_>],
        body: DeriveBody<'_>,
    ) -> Result<Column, EngineError> {
        let dependencies: Vec<Vec<CellValue>> = resolved.iter().map(Resolved::values).collect();
        let rows = dependencies.first().map_or(0, Vec::len);
        let mut target = vec![CellValue::Empty; rows];
        let mut ctx = TransformContext {
            row_count: rows,
            target: &mut target,
            dependencies: &dependencies,
            args: self.args,
        };

        let script_error = |source| EngineError::Script {
            column: spec.title.clone(),
            source,
        };
        match body {
            DeriveBody::Transform(name) => {
                let transform = self.registry.transform(name)?;
                transform(&mut ctx).map_err(script_error)?;
            }
            DeriveBody::Script(source) => {
                let compiled = self.compiler.compile(source).map_err(script_error)?;
                compiled.run(&mut ctx).map_err(script_error)?;
            }
        }
        debug!(
            "Column '{}': derived from {} column(s) over {} rows",
            spec.title,
            dependencies.len(),
            rows
        );
        Ok(Column::plain(spec.title.as_str(), target).with_comment(spec.comment()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnData;
    use crate::dataset::Dataset;
    use crate::error::ScriptError;
    use crate::script::InterpretedCompiler;
    use crate::table::Table;
    use serde_json::json;

    fn people() -> Dataset {
        let rows = vec![
            vec!["Name".into(), "Age".into(), "Active".into()],
            vec!["Al".into(), 30.0.into(), true.into()],
            vec!["Bo".into(), 41.0.into(), false.into()],
        ];
        vec![Table::from_rows("People", rows)].into_iter().collect()
    }

    fn spec(value: serde_json::Value) -> ColumnSpec {
        serde_json::from_value(value).unwrap()
    }

    struct Fixture {
        source: Dataset,
        target: Dataset,
        empty: Dataset,
        registry: Registry,
        args: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut target = Dataset::new();
            let out = target.add_table("Out").unwrap();
            out.append_column(Column::plain("Id", vec![1.0.into(), 2.0.into()]))
                .unwrap();
            Fixture {
                source: people(),
                target,
                empty: Dataset::new(),
                registry: Registry::with_builtins(),
                args: vec!["7".to_string(), "Sales".to_string()],
            }
        }

        fn builder(&self, sheet_complete: bool) -> ColumnBuilder<'_> {
            ColumnBuilder {
                sources: Sources {
                    source: &self.source,
                    additional: &[],
                    sub_tables: &self.empty,
                    target: &self.target,
                },
                registry: &self.registry,
                compiler: &InterpretedCompiler,
                args: &self.args,
                sheet_complete,
            }
        }

        fn build(&self, spec: &ColumnSpec) -> Result<Construction, EngineError> {
            self.builder(true).build(spec)
        }

        fn built(&self, value: serde_json::Value) -> Column {
            match self.build(&spec(value)).unwrap() {
                Construction::Built(column) => column,
                Construction::Deferred(keys) => panic!("unexpectedly deferred on {:?}", keys),
                Construction::Postponed => panic!("unexpectedly postponed"),
            }
        }
    }

    #[test]
    fn test_copy_with_mapping_table() {
        let fx = Fixture::new();
        let column = fx.built(json!({
            "title": "Status",
            "comment": "from Active",
            "copy_from": ["People", "Active"],
            "mapping": {"true": "yes", "_Other": "no"}
        }));
        assert_eq!(column.title(), "Status");
        assert_eq!(column.comment(), "from Active");
        assert_eq!(column.values(2), vec![CellValue::from("yes"), CellValue::from("no")]);
    }

    #[test]
    fn test_copy_with_mapping_function() {
        let fx = Fixture::new();
        let column = fx.built(json!({
            "title": "Upper",
            "copy_from": ["People", "Name"],
            "mapping": "upper"
        }));
        assert_eq!(column.values(2), vec![CellValue::from("AL"), CellValue::from("BO")]);
    }

    #[test]
    fn test_copy_unknown_mapping_function_is_config_error() {
        let fx = Fixture::new();
        let err = fx
            .build(&spec(json!({
                "title": "X",
                "copy_from": ["People", "Name"],
                "mapping": "no_such_fn"
            })))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_index_with_argument() {
        let fx = Fixture::new();
        let column = fx.built(json!({"title": "No", "index_start": "_arg0"}));
        assert!(matches!(column.data(), ColumnData::Index(_)));
        assert_eq!(column.get(0), CellValue::Number(7.0));
        assert_eq!(column.get(3), CellValue::Number(10.0));
    }

    #[test]
    fn test_index_rejects_non_integer() {
        let fx = Fixture::new();
        let err = fx
            .build(&spec(json!({"title": "No", "index_start": "_arg1"})))
            .unwrap_err();
        assert!(err.to_string().contains("index_start"), "{}", err);
    }

    #[test]
    fn test_fill_with_argument() {
        let fx = Fixture::new();
        let column = fx.built(json!({"title": "Dept", "fill_with": "_arg1"}));
        assert_eq!(column.get(0), CellValue::from("Sales"));
        assert_eq!(column.get(99), CellValue::from("Sales"));
    }

    #[test]
    fn test_empty_column() {
        let fx = Fixture::new();
        let column = fx.built(json!({"title": "Notes"}));
        assert!(matches!(column.data(), ColumnData::Empty));
    }

    #[test]
    fn test_derive_with_script() {
        let fx = Fixture::new();
        let column = fx.built(json!({
            "title": "Greeting",
            "dependence": [["People", "Name"]],
            "script": "for i in range(l): tgt[i] = 'Hi ' + dpd[0][i]"
        }));
        assert_eq!(
            column.values(2),
            vec![CellValue::from("Hi Al"), CellValue::from("Hi Bo")]
        );
    }

    #[test]
    fn test_derive_with_transform() {
        let mut fx = Fixture::new();
        fx.args = vec!["-".to_string()];
        let column = fx.built(json!({
            "title": "Both",
            "dependence": [["People", "Name"], ["People", "Age"]],
            "transform": "concat"
        }));
        assert_eq!(column.get(0), CellValue::from("Al-30"));
    }

    #[test]
    fn test_derive_script_error_names_column() {
        let fx = Fixture::new();
        let err = fx
            .build(&spec(json!({
                "title": "Broken",
                "dependence": [["People", "Name"]],
                "script": "tgt[0] = undefined_name"
            })))
            .unwrap_err();
        match err {
            EngineError::Script { column, source } => {
                assert_eq!(column, "Broken");
                assert_eq!(source, ScriptError::UndefinedName("undefined_name".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_this_reference_defers() {
        let fx = Fixture::new();
        let result = fx
            .build(&spec(json!({
                "title": "Later",
                "dependence": [["_This.Out", "Id"], ["_This.Out", "Total"], ["People", "Age"]],
                "transform": "coalesce"
            })))
            .unwrap();
        match result {
            Construction::Deferred(keys) => {
                assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec![ColumnKey::new("Out", "Total")]);
            }
            other => panic!("should defer, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_source_reference_is_fatal() {
        let fx = Fixture::new();
        let err = fx
            .build(&spec(json!({
                "title": "Bad",
                "dependence": [["_This.Out", "Total"], ["People", "Salary"]],
                "transform": "coalesce"
            })))
            .unwrap_err();
        assert!(matches!(err, EngineError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_copy_from_this_reads_target() {
        let fx = Fixture::new();
        let column = fx.built(json!({"title": "Copy", "copy_from": ["_This.Out", "Id"]}));
        assert_eq!(column.values(2), vec![CellValue::Number(1.0), CellValue::Number(2.0)]);
    }

    #[test]
    fn test_lazy_first_dependency_waits_for_complete_sheet() {
        let mut fx = Fixture::new();
        fx.target
            .table_mut("Out")
            .unwrap()
            .append_column(Column::index("No", 1))
            .unwrap();
        let derived = spec(json!({
            "title": "Twice",
            "dependence": [["_This.Out", "No"]],
            "script": "for i in range(l): tgt[i] = dpd[0][i] * 2"
        }));
        assert!(matches!(
            fx.builder(false).build(&derived).unwrap(),
            Construction::Postponed
        ));
        match fx.builder(true).build(&derived).unwrap() {
            Construction::Built(column) => assert_eq!(
                column.values(0),
                vec![CellValue::Number(2.0), CellValue::Number(4.0)]
            ),
            other => panic!("should build, got {:?}", other),
        }
    }

    #[test]
    fn test_concrete_first_dependency_builds_at_once() {
        let fx = Fixture::new();
        let derived = spec(json!({
            "title": "Copy",
            "dependence": [["_This.Out", "Id"]],
            "transform": "coalesce"
        }));
        assert!(matches!(
            fx.builder(false).build(&derived).unwrap(),
            Construction::Built(_)
        ));
    }
}
