//! FILENAME: core/engine/src/registry.rs
//! PURPOSE: Named functions a configuration may select by name.
//! CONTEXT: Configurations never carry host code. Anything beyond the
//! restricted script language is registered here by the embedding program and
//! referred to by name:
//! - mapping functions (`mapping: "<name>"` on a copied column)
//! - column transforms (`transform: "<name>"` on a dependence column)
//! - pre/post hooks (`process.pre` / `process.post`)

use std::collections::HashMap;

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::cell::CellValue;
use crate::column::Column;
use crate::error::{EngineError, ScriptError};
use crate::migrate::MigrationContext;
use crate::script::TransformContext;

pub type MappingFn = Box<dyn Fn(&CellValue) -> CellValue>;
pub type TransformFn = Box<dyn Fn(&mut TransformContext<'_>) -> Result<(), ScriptError>>;
pub type HookFn = Box<dyn Fn(&mut MigrationContext) -> Result<(), EngineError>>;

pub struct Registry {
    mappings: HashMap<String, MappingFn>,
    transforms: HashMap<String, TransformFn>,
    hooks: HashMap<String, HookFn>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn names<'a>(map: Vec<&'a String>) -> Vec<&'a str> {
            let mut v: Vec<&str> = map.into_iter().map(String::as_str).collect();
            v.sort_unstable();
            v
        }
        f.debug_struct("Registry")
            .field("mappings", &names(self.mappings.keys().collect()))
            .field("transforms", &names(self.transforms.keys().collect()))
            .field("hooks", &names(self.hooks.keys().collect()))
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_builtins()
    }
}

impl Registry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Registry {
            mappings: HashMap::new(),
            transforms: HashMap::new(),
            hooks: HashMap::new(),
        }
    }

    /// A registry preloaded with the built-in mapping functions and transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::empty();
        registry.register_mapping("datefix", datefix);
        registry.register_mapping("upper", |c| map_text(c, |s| s.to_uppercase()));
        registry.register_mapping("lower", |c| map_text(c, |s| s.to_lowercase()));
        registry.register_mapping("strip", |c| map_text(c, |s| s.trim().to_string()));
        registry.register_mapping("to_text", |c| CellValue::Text(c.display_value()));
        registry.register_mapping("to_number", |c| match c.as_number() {
            Some(n) => CellValue::Number(n),
            None => c.clone(),
        });
        registry.register_transform("coalesce", coalesce);
        registry.register_transform("concat", concat);
        registry
    }

    pub fn register_mapping(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&CellValue) -> CellValue + 'static,
    ) {
        self.mappings.insert(name.into(), Box::new(f));
    }

    pub fn register_transform(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut TransformContext<'_>) -> Result<(), ScriptError> + 'static,
    ) {
        self.transforms.insert(name.into(), Box::new(f));
    }

    pub fn register_hook(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut MigrationContext) -> Result<(), EngineError> + 'static,
    ) {
        self.hooks.insert(name.into(), Box::new(f));
    }

    pub fn mapping(&self, name: &str) -> Result<&MappingFn, EngineError> {
        self.mappings
            .get(name)
            .ok_or_else(|| EngineError::Config(format!("Unknown mapping function '{}'", name)))
    }

    pub fn transform(&self, name: &str) -> Result<&TransformFn, EngineError> {
        self.transforms
            .get(name)
            .ok_or_else(|| EngineError::Config(format!("Unknown transform '{}'", name)))
    }

    pub fn hook(&self, name: &str) -> Result<&HookFn, EngineError> {
        self.hooks
            .get(name)
            .ok_or_else(|| EngineError::Config(format!("Unknown hook '{}'", name)))
    }
}

/// Runs a mapping function over every non-empty cell of a column.
pub fn apply_mapping_fn(f: &MappingFn, column: &mut Column, rows: usize) {
    column.map_values(rows, |cell| {
        if cell.is_empty() {
            CellValue::Empty
        } else {
            f(cell)
        }
    });
}

fn map_text(cell: &CellValue, f: impl Fn(&str) -> String) -> CellValue {
    match cell {
        CellValue::Text(s) => CellValue::Text(f(s)),
        other => other.clone(),
    }
}

// ============================================================================
// BUILT-IN MAPPING FUNCTIONS
// ============================================================================

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Spreadsheet day zero. Serial 1 is 1900-01-01 and serial 61 is 1900-03-01,
/// skipping the fictitious 1900-02-29.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.floor();
    if !days.is_finite() || days.abs() > 3_000_000.0 {
        return None;
    }
    // Serials below 61 sit before the phantom leap day.
    let days = if (1.0..61.0).contains(&days) { days + 1.0 } else { days };
    if days >= 0.0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new((-days) as u64))
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Normalises a date to `YYYYMMDD` text. Spreadsheet serial numbers and
/// common date spellings are understood; anything else passes through.
pub fn datefix(cell: &CellValue) -> CellValue {
    let date = match cell {
        CellValue::Number(n) => serial_to_date(*n),
        CellValue::Text(s) => parse_date_text(s),
        _ => None,
    };
    match date {
        Some(d) => CellValue::Text(d.format("%Y%m%d").to_string()),
        None => cell.clone(),
    }
}

// ============================================================================
// BUILT-IN TRANSFORMS
// ============================================================================

/// Each row takes the first non-empty dependency value.
fn coalesce(ctx: &mut TransformContext<'_>) -> Result<(), ScriptError> {
    for (row, slot) in ctx.target.iter_mut().enumerate() {
        *slot = ctx
            .dependencies
            .iter()
            .map(|dep| dep.get(row).cloned().unwrap_or_default())
            .find(|v| !v.is_empty())
            .unwrap_or_default();
    }
    Ok(())
}

/// Joins the non-empty dependency values of each row. The first invocation
/// argument, when present, is the separator; a single space otherwise.
fn concat(ctx: &mut TransformContext<'_>) -> Result<(), ScriptError> {
    let separator = ctx.args.first().map(String::as_str).unwrap_or(" ");
    for (row, slot) in ctx.target.iter_mut().enumerate() {
        let parts: Vec<String> = ctx
            .dependencies
            .iter()
            .filter_map(|dep| dep.get(row))
            .filter(|v| !v.is_empty())
            .map(CellValue::display_value)
            .collect();
        *slot = if parts.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(parts.join(separator))
        };
    }
    Ok(())
}
