//! FILENAME: core/engine/src/config.rs
//! PURPOSE: The migration configuration model.
//! CONTEXT: A configuration declares the output sheets and, per output column,
//! how its values are produced. It is read from the relaxed dialect (see
//! `relaxed.rs`) or strict JSON into a `serde_json::Value`, checked for
//! version compatibility, then deserialised into the types below.
//!
//! COLUMN STRATEGIES (first match wins):
//!   copy_from   -> copy a referenced column, optionally through `mapping`
//!   index_start -> row counter starting at the given integer
//!   fill_with   -> the same constant in every row
//!   dependence  -> computed from referenced columns by `script` or `transform`
//!   (none)      -> empty column

use std::path::Path;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as JsonValue};

use crate::cell::CellValue;
use crate::error::{ColumnKey, EngineError};
use crate::reference::forward_key;
use crate::relaxed;
use crate::ENGINE_VERSION;

static ARG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_arg(\d+)$").unwrap());

// ============================================================================
// LENIENT SCALARS
// ============================================================================

/// Bare scalars in the relaxed dialect come back as numbers or booleans when
/// they happen to spell one. Names and titles accept them as text.
fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    scalar_text(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected text, found {}", value)))
}

fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<JsonValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => scalar_text(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected text, found {}", value))),
    }
}

fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    let parsed = match &value {
        JsonValue::Number(n) => n.as_u64().map(|n| n as usize),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| serde::de::Error::custom(format!("expected a count, found {}", value)))
}

/// Accepts a single name or a list of names.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    let items = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Array(items) => items,
        single => vec![single],
    };
    items
        .iter()
        .map(|item| {
            scalar_text(item)
                .ok_or_else(|| serde::de::Error::custom(format!("expected a hook name, found {}", item)))
        })
        .collect()
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    #[serde(default, deserialize_with = "opt_text")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "count")]
    pub additional_input: usize,
    #[serde(default)]
    pub process: ProcessSpec,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    pub sheets: Vec<SheetSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessSpec {
    #[serde(default)]
    pub subsheets: Vec<SubsheetSpec>,
    /// Hook names run before any sheet is built.
    #[serde(default, deserialize_with = "one_or_many")]
    pub pre: Vec<String>,
    /// Hook names run after every sheet is built.
    #[serde(default, deserialize_with = "one_or_many")]
    pub post: Vec<String>,
}

/// `[table, [[r0, r1], [c0, c1]], header?]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "JsonValue")]
pub struct SubsheetSpec {
    pub table: String,
    pub rows: (usize, usize),
    pub cols: (usize, usize),
    pub header: bool,
}

impl TryFrom<JsonValue> for SubsheetSpec {
    type Error = String;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        let shape = "expected [table, [[first_row, last_row], [first_col, last_col]], header?]";
        let bound = |v: &JsonValue| -> Option<usize> {
            match v {
                JsonValue::Number(n) => n.as_u64().map(|n| n as usize),
                JsonValue::String(s) => s.trim().parse().ok(),
                _ => None,
            }
        };
        let pair = |v: &JsonValue| -> Option<(usize, usize)> {
            match v.as_array()?.as_slice() {
                [a, b] => Some((bound(a)?, bound(b)?)),
                _ => None,
            }
        };
        let items = value.as_array().ok_or(shape)?;
        let (table, region, header) = match items.as_slice() {
            [table, region] => (table, region, true),
            [table, region, JsonValue::Bool(header)] => (table, region, *header),
            _ => return Err(shape.to_string()),
        };
        let (rows, cols) = match region.as_array().map(Vec::as_slice) {
            Some([rows, cols]) => (pair(rows).ok_or(shape)?, pair(cols).ok_or(shape)?),
            _ => return Err(shape.to_string()),
        };
        Ok(SubsheetSpec {
            table: scalar_text(table).ok_or(shape)?,
            rows,
            cols,
            header,
        })
    }
}

/// A declared invocation argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArgSpec {
    Choice {
        #[serde(default)]
        description: String,
        options: Vec<JsonValue>,
    },
    Text {
        #[serde(default)]
        description: String,
    },
}

impl ArgSpec {
    pub fn description(&self) -> &str {
        match self {
            ArgSpec::Choice { description, .. } | ArgSpec::Text { description } => description,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetSpec {
    #[serde(deserialize_with = "text")]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

/// A `[table, column]` reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefSpec(
    #[serde(deserialize_with = "text")] pub String,
    #[serde(deserialize_with = "text")] pub String,
);

impl RefSpec {
    pub fn table(&self) -> &str {
        &self.0
    }

    pub fn column(&self) -> &str {
        &self.1
    }

    /// The target key, for references into the dataset under construction.
    pub fn forward_key(&self) -> Option<ColumnKey> {
        forward_key(&self.0, &self.1)
    }
}

impl std::fmt::Display for RefSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.0, self.1)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MappingSpec {
    /// Name of a registered mapping function.
    Function(String),
    Table(Map<String, JsonValue>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    #[serde(deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub comment: Option<String>,
    #[serde(default)]
    pub copy_from: Option<RefSpec>,
    #[serde(default)]
    pub mapping: Option<MappingSpec>,
    #[serde(default)]
    pub index_start: Option<JsonValue>,
    #[serde(default)]
    pub fill_with: Option<JsonValue>,
    #[serde(default)]
    pub dependence: Option<Vec<RefSpec>>,
    #[serde(default)]
    pub script: Option<JsonValue>,
    #[serde(default, deserialize_with = "opt_text")]
    pub transform: Option<String>,
}

/// How a derived column computes its values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeriveBody<'a> {
    Script(&'a JsonValue),
    Transform(&'a str),
}

/// The construction rule selected for a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy<'a> {
    Copy {
        from: &'a RefSpec,
        mapping: Option<&'a MappingSpec>,
    },
    Index(&'a JsonValue),
    Fill(&'a JsonValue),
    Derive {
        dependence: &'a [RefSpec],
        body: DeriveBody<'a>,
    },
    Empty,
}

impl ColumnSpec {
    fn invalid(&self, message: &str) -> EngineError {
        EngineError::Config(format!("column '{}': {}", self.title, message))
    }

    /// Selects the construction rule, rejecting key combinations that have
    /// no meaning.
    pub fn strategy(&self) -> Result<Strategy<'_>, EngineError> {
        if self.mapping.is_some() && self.copy_from.is_none() {
            return Err(self.invalid("'mapping' requires 'copy_from'"));
        }
        if (self.script.is_some() || self.transform.is_some()) && self.dependence.is_none() {
            return Err(self.invalid("'script' and 'transform' require 'dependence'"));
        }

        if let Some(from) = &self.copy_from {
            return Ok(Strategy::Copy {
                from,
                mapping: self.mapping.as_ref(),
            });
        }
        if let Some(start) = &self.index_start {
            return Ok(Strategy::Index(start));
        }
        if let Some(value) = &self.fill_with {
            return Ok(Strategy::Fill(value));
        }
        if let Some(dependence) = &self.dependence {
            if dependence.is_empty() {
                return Err(self.invalid("'dependence' lists no columns"));
            }
            let body = match (&self.script, &self.transform) {
                (Some(script), None) => DeriveBody::Script(script),
                (None, Some(name)) => DeriveBody::Transform(name),
                (Some(_), Some(_)) => {
                    return Err(self.invalid("give either 'script' or 'transform', not both"))
                }
                (None, None) => {
                    return Err(self.invalid("'dependence' requires 'script' or 'transform'"))
                }
            };
            return Ok(Strategy::Derive {
                dependence: dependence.as_slice(),
                body,
            });
        }
        Ok(Strategy::Empty)
    }

    pub fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }
}

// ============================================================================
// LOADING AND VALIDATION
// ============================================================================

fn version_parts(version: &str) -> Result<Vec<u64>, EngineError> {
    version
        .trim()
        .split('.')
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| EngineError::Config(format!("invalid version '{}'", version)))
        })
        .collect()
}

/// Fails when `version` is newer than this engine.
pub fn check_version(version: &str) -> Result<(), EngineError> {
    let found = version_parts(version)?;
    let supported = version_parts(ENGINE_VERSION)?;
    let len = found.len().max(supported.len());
    let padded = |v: &[u64]| -> Vec<u64> { (0..len).map(|i| v.get(i).copied().unwrap_or(0)).collect() };
    if padded(&found) > padded(&supported) {
        return Err(EngineError::IncompatibleVersion {
            found: version.to_string(),
            supported: ENGINE_VERSION.to_string(),
        });
    }
    Ok(())
}

impl MigrationConfig {
    /// Reads a configuration file in the relaxed dialect or strict JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        debug!("Loading migration configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        MigrationConfig::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, EngineError> {
        MigrationConfig::from_value(relaxed::parse(text)?)
    }

    /// Builds a configuration from an already parsed value tree.
    /// The version is checked before anything else is interpreted.
    pub fn from_value(value: JsonValue) -> Result<Self, EngineError> {
        if let Some(version) = value.get("version").and_then(scalar_text) {
            check_version(&version)?;
        }
        let config: MigrationConfig = serde_json::from_value(value)
            .map_err(|e| EngineError::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every column's key combination up front.
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(version) = &self.version {
            check_version(version)?;
        }
        for sheet in &self.sheets {
            for column in &sheet.columns {
                column
                    .strategy()
                    .map_err(|e| EngineError::Config(format!("sheet '{}', {}", sheet.name, config_message(&e))))?;
            }
        }
        Ok(())
    }

    /// Checks the supplied inputs against the declared ones.
    pub fn validate_inputs(&self, additional: usize, args: &[String]) -> Result<(), EngineError> {
        if additional < self.additional_input {
            return Err(EngineError::Config(format!(
                "{} additional input(s) required, {} supplied",
                self.additional_input, additional
            )));
        }
        if args.len() < self.args.len() {
            return Err(EngineError::Config(format!(
                "{} argument(s) required, {} supplied",
                self.args.len(),
                args.len()
            )));
        }
        for (i, (spec, value)) in self.args.iter().zip(args).enumerate() {
            if let ArgSpec::Choice { options, .. } = spec {
                let allowed: Vec<String> = options
                    .iter()
                    .map(|o| CellValue::from_json(o).display_value())
                    .collect();
                if !allowed.iter().any(|o| o == value) {
                    return Err(EngineError::Config(format!(
                        "argument {} ('{}') must be one of [{}], got '{}'",
                        i,
                        spec.description(),
                        allowed.join(", "),
                        value
                    )));
                }
            }
        }
        Ok(())
    }
}

fn config_message(error: &EngineError) -> String {
    match error {
        EngineError::Config(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Replaces an `_arg<N>` scalar with the N-th invocation argument.
pub fn substitute_arg(value: &JsonValue, args: &[String]) -> Result<JsonValue, EngineError> {
    let index = match value.as_str().and_then(|s| ARG_RE.captures(s)) {
        Some(caps) => caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok()),
        None => return Ok(value.clone()),
    };
    index
        .and_then(|i| args.get(i))
        .map(|arg| JsonValue::String(arg.clone()))
        .ok_or_else(|| {
            EngineError::Config(format!(
                "'{}' refers to a missing argument ({} supplied)",
                value.as_str().unwrap_or_default(),
                args.len()
            ))
        })
}

/// Reads an index start value, after argument substitution.
pub fn integer_value(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(value: JsonValue) -> ColumnSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_strategy_first_match_wins() {
        let spec = column(json!({"title": "A", "copy_from": ["T", "A"], "fill_with": 1}));
        assert!(matches!(spec.strategy().unwrap(), Strategy::Copy { .. }));

        let spec = column(json!({"title": "A", "index_start": 1, "fill_with": 1}));
        assert!(matches!(spec.strategy().unwrap(), Strategy::Index(_)));

        let spec = column(json!({"title": "A"}));
        assert_eq!(spec.strategy().unwrap(), Strategy::Empty);
    }

    #[test]
    fn test_strategy_rejects_meaningless_combinations() {
        let bad = [
            json!({"title": "A", "mapping": {"a": "b"}}),
            json!({"title": "A", "script": "pass"}),
            json!({"title": "A", "dependence": [], "script": "pass"}),
            json!({"title": "A", "dependence": [["T", "A"]]}),
            json!({"title": "A", "dependence": [["T", "A"]], "script": "pass", "transform": "concat"}),
        ];
        for value in bad {
            let spec = column(value.clone());
            assert!(
                matches!(spec.strategy(), Err(EngineError::Config(_))),
                "accepted {}",
                value
            );
        }
    }

    #[test]
    fn test_unknown_column_key_rejected() {
        let result: Result<ColumnSpec, _> =
            serde_json::from_value(json!({"title": "A", "copy_form": ["T", "A"]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_titles_and_refs_are_text() {
        let spec = column(json!({"title": 2024, "copy_from": ["Sheet1", 7]}));
        assert_eq!(spec.title, "2024");
        assert_eq!(spec.copy_from, Some(RefSpec("Sheet1".into(), "7".into())));
    }

    #[test]
    fn test_parse_relaxed_document() {
        let config = MigrationConfig::parse(
            "{
                additional_input: 1,
                process: { subsheets: [[Raw, [[2, 10], [0, 3]]], [Raw, [[0, 5], [1, 1]], false]], pre: tidy },
                args: [ {type: choice, description: Region, options: [North, South]}, {type: text} ],
                sheets: [ { name: Out, columns: [ {title: Id, index_start: _arg1} ] } ],
            }",
        )
        .unwrap();
        assert_eq!(config.additional_input, 1);
        assert_eq!(config.process.pre, vec!["tidy".to_string()]);
        assert!(config.process.post.is_empty());
        assert_eq!(
            config.process.subsheets,
            vec![
                SubsheetSpec { table: "Raw".into(), rows: (2, 10), cols: (0, 3), header: true },
                SubsheetSpec { table: "Raw".into(), rows: (0, 5), cols: (1, 1), header: false },
            ]
        );
        assert_eq!(config.args.len(), 2);
        assert_eq!(config.args[0].description(), "Region");
        assert_eq!(config.sheets[0].columns[0].title, "Id");
    }

    #[test]
    fn test_bad_column_reported_at_parse_time() {
        let err = MigrationConfig::parse("{sheets: [{name: S, columns: [{title: X, mapping: upper}]}]}")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sheet 'S'") && message.contains("column 'X'"), "{}", message);
    }

    #[test]
    fn test_version_gate() {
        assert!(check_version("1.0.3").is_ok());
        assert!(check_version("1.0").is_ok());
        assert!(check_version("0.9.12").is_ok());
        assert!(matches!(
            check_version("1.0.4"),
            Err(EngineError::IncompatibleVersion { .. })
        ));
        assert!(matches!(
            check_version("2"),
            Err(EngineError::IncompatibleVersion { .. })
        ));
        assert!(matches!(check_version("one"), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_newer_version_rejected_before_anything_else() {
        // The sheets list is malformed, but the version check comes first.
        let err = MigrationConfig::parse("{version: 9.0, sheets: 5}").unwrap_err();
        assert!(matches!(err, EngineError::IncompatibleVersion { .. }));
    }

    #[test]
    fn test_validate_inputs() {
        let config = MigrationConfig::parse(
            "{additional_input: 1, args: [{type: choice, options: [1, 2]}], sheets: []}",
        )
        .unwrap();
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(config.validate_inputs(1, &args(&["2"])).is_ok());
        assert!(config.validate_inputs(0, &args(&["2"])).is_err());
        assert!(config.validate_inputs(1, &args(&[])).is_err());
        assert!(config.validate_inputs(1, &args(&["3"])).is_err());
    }

    #[test]
    fn test_substitute_arg() {
        let args = vec!["20240101".to_string(), "5".to_string()];
        assert_eq!(substitute_arg(&json!("_arg1"), &args).unwrap(), json!("5"));
        assert_eq!(substitute_arg(&json!("_args"), &args).unwrap(), json!("_args"));
        assert_eq!(substitute_arg(&json!(3), &args).unwrap(), json!(3));
        assert!(substitute_arg(&json!("_arg2"), &args).is_err());
    }

    #[test]
    fn test_integer_value() {
        assert_eq!(integer_value(&json!(5)), Some(5));
        assert_eq!(integer_value(&json!(5.0)), Some(5));
        assert_eq!(integer_value(&json!(" 12 ")), Some(12));
        assert_eq!(integer_value(&json!(1.5)), None);
        assert_eq!(integer_value(&json!("x")), None);
    }
}
