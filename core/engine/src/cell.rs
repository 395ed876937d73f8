//! FILENAME: core/engine/src/cell.rs
//! PURPOSE: Defines the value held by a single cell of a column.
//! CONTEXT: Every column variant ultimately yields `CellValue`s, whether they
//! are stored (plain columns) or computed on demand (filled/index columns).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Represents the raw data within a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Returns the display value of the cell as a String.
    /// Whole numbers are shown without a decimal part.
    pub fn display_value(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
        }
    }

    /// Attempts to coerce the value to a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Empty => None,
        }
    }

    /// Converts a configuration value into a cell value.
    /// Arrays and objects have no cell representation and are kept as their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => CellValue::Empty,
            JsonValue::Bool(b) => CellValue::Boolean(*b),
            JsonValue::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
            JsonValue::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// Formats a number without unnecessary decimal places.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value_drops_trailing_zeroes() {
        assert_eq!(CellValue::Number(42.0).display_value(), "42");
        assert_eq!(CellValue::Number(2.5).display_value(), "2.5");
        assert_eq!(CellValue::Empty.display_value(), "");
        assert_eq!(CellValue::Boolean(true).display_value(), "TRUE");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(CellValue::from_json(&json!(null)), CellValue::Empty);
        assert_eq!(CellValue::from_json(&json!(3)), CellValue::Number(3.0));
        assert_eq!(CellValue::from_json(&json!("x")), CellValue::from("x"));
        assert_eq!(CellValue::from_json(&json!([1, 2])), CellValue::from("[1,2]"));
    }

    #[test]
    fn test_as_number_coerces_text() {
        assert_eq!(CellValue::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(CellValue::from("abc").as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
    }
}
