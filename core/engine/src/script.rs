//! FILENAME: core/engine/src/script.rs
//! PURPOSE: The boundary between column construction and transform scripts.
//! CONTEXT: A `dependence` column hands its script source to a `ScriptCompiler`
//! and runs the resulting `ColumnTransform` against a `TransformContext`.
//! The context is the only state a transform can touch: it reads the row
//! count, the dependency values and the invocation arguments, and writes the
//! target buffer.
//!
//! SCRIPT SOURCE:
//! Configurations may spell a script as nested structure instead of one
//! string. `flatten_source` turns that structure into indented text:
//! - a string is one line
//! - a list is its items, in order
//! - an object is, per key, a `key:` header line followed by its value
//!   indented one level deeper

use serde_json::Value as JsonValue;

use crate::cell::CellValue;
use crate::error::ScriptError;
use crate::evaluator::run_program;

const INDENT: &str = "    ";

/// Everything a transform may see.
#[derive(Debug)]
pub struct TransformContext<'a> {
    pub row_count: usize,
    /// Pre-sized to the first dependency's length and filled with empty cells.
    pub target: &'a mut Vec<CellValue>,
    /// One value sequence per declared dependency, in declaration order.
    pub dependencies: &'a [Vec<CellValue>],
    pub args: &'a [String],
}

/// A compiled transform, ready to run any number of times.
pub trait ColumnTransform {
    fn run(&self, ctx: &mut TransformContext<'_>) -> Result<(), ScriptError>;
}

/// Turns configuration-described script source into a runnable transform.
pub trait ScriptCompiler {
    fn compile(&self, source: &JsonValue) -> Result<Box<dyn ColumnTransform>, ScriptError>;
}

/// Flattens nested script source into indented text.
pub fn flatten_source(source: &JsonValue) -> Result<String, ScriptError> {
    let mut out = String::new();
    flatten_into(source, 0, &mut out)?;
    Ok(out)
}

fn flatten_into(source: &JsonValue, depth: usize, out: &mut String) -> Result<(), ScriptError> {
    match source {
        JsonValue::String(line) => {
            out.push_str(&INDENT.repeat(depth));
            out.push_str(line);
            out.push('\n');
        }
        JsonValue::Array(items) => {
            for item in items {
                flatten_into(item, depth, out)?;
            }
        }
        JsonValue::Object(blocks) => {
            for (header, body) in blocks {
                let header = header.trim_end();
                let header = header.strip_suffix(':').unwrap_or(header);
                out.push_str(&INDENT.repeat(depth));
                out.push_str(header);
                out.push_str(":\n");
                flatten_into(body, depth + 1, out)?;
            }
        }
        other => {
            return Err(ScriptError::Source(format!(
                "expected text, a list or an object, found {}",
                other
            )))
        }
    }
    Ok(())
}

// ============================================================================
// INTERPRETED SCRIPTS
// ============================================================================

/// Compiles scripts for the built-in interpreter.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpretedCompiler;

impl ScriptCompiler for InterpretedCompiler {
    fn compile(&self, source: &JsonValue) -> Result<Box<dyn ColumnTransform>, ScriptError> {
        let text = flatten_source(source)?;
        let program = script_parser::parse(&text)?;
        Ok(Box::new(InterpretedTransform { program }))
    }
}

#[derive(Debug, Clone)]
pub struct InterpretedTransform {
    program: script_parser::Program,
}

impl ColumnTransform for InterpretedTransform {
    fn run(&self, ctx: &mut TransformContext<'_>) -> Result<(), ScriptError> {
        run_program(&self.program, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_string_list_and_object() {
        let source = json!([
            "total = 0",
            {"for i in range(l)": ["total += 1", {"if total > 1": "pass"}]},
            "tgt[0] = total"
        ]);
        assert_eq!(
            flatten_source(&source).unwrap(),
            "total = 0\n\
             for i in range(l):\n\
             \x20   total += 1\n\
             \x20   if total > 1:\n\
             \x20       pass\n\
             tgt[0] = total\n"
        );
    }

    #[test]
    fn test_flatten_header_with_colon() {
        let source = json!({"if True:": "pass"});
        assert_eq!(flatten_source(&source).unwrap(), "if True:\n    pass\n");
    }

    #[test]
    fn test_flatten_rejects_scalars() {
        assert!(matches!(
            flatten_source(&json!(["x = 1", 5])),
            Err(ScriptError::Source(_))
        ));
    }

    #[test]
    fn test_compile_and_run() {
        let transform = InterpretedCompiler
            .compile(&json!("for i in range(l): tgt[i] = dpd[0][i] * 2"))
            .unwrap();
        let deps = vec![vec![CellValue::from(1.0), CellValue::from(2.5)]];
        let mut target = vec![CellValue::Empty; 2];
        let mut ctx = TransformContext {
            row_count: 2,
            target: &mut target,
            dependencies: &deps,
            args: &[],
        };
        transform.run(&mut ctx).unwrap();
        assert_eq!(target, vec![CellValue::from(2.0), CellValue::from(5.0)]);
    }

    #[test]
    fn test_compile_reports_parse_errors() {
        let err = InterpretedCompiler.compile(&json!("for i in"));
        assert!(matches!(err, Err(ScriptError::Parse(_))));
    }
}
