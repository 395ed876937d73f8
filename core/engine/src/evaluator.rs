//! FILENAME: core/engine/src/evaluator.rs
//! PURPOSE: Runs parsed transform scripts against a transform context.
//! CONTEXT: The parser crate turns script text into a `Program`; this module
//! walks it. A script sees exactly four bindings:
//!
//! - `l`    the row count
//! - `tgt`  the target buffer, pre-sized and filled with None
//! - `dpd`  one list per dependency column, in declaration order
//! - `args` the invocation arguments, as text
//!
//! Only `tgt` is read back when the script ends. Every other binding, and any
//! variable the script creates, is dropped with the interpreter.
//!
//! SUPPORTED FEATURES:
//! - Values: None, booleans, numbers, text, lists
//! - Operators with Python semantics: + - * / // % **, comparisons,
//!   in / not in, and / or / not (short-circuiting, returning an operand)
//! - Indexing with negative indices; nested indexed assignment
//! - Functions: len, str, int, float, bool, abs, round, min, max, range
//! - Text methods: upper, lower, strip, lstrip, rstrip, startswith, endswith,
//!   replace, split, zfill, join, isdigit
//! - List methods: append (as a statement), index, count

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use script_parser::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};

use crate::cell::{format_number, CellValue};
use crate::error::ScriptError;
use crate::script::TransformContext;

/// Upper bound on the length of a list or text built by `range`, `*` and
/// `zfill`.
const MAX_SEQUENCE_LEN: usize = 10_000_000;

/// A value inside a running script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    None,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ScriptValue>),
}

impl ScriptValue {
    pub fn from_cell(cell: &CellValue) -> Self {
        match cell {
            CellValue::Empty => ScriptValue::None,
            CellValue::Number(n) => ScriptValue::Number(*n),
            CellValue::Text(s) => ScriptValue::Text(s.clone()),
            CellValue::Boolean(b) => ScriptValue::Bool(*b),
        }
    }

    /// Converts back to a cell. Lists have no cell representation.
    pub fn to_cell(&self) -> Result<CellValue, ScriptError> {
        match self {
            ScriptValue::None => Ok(CellValue::Empty),
            ScriptValue::Bool(b) => Ok(CellValue::Boolean(*b)),
            ScriptValue::Number(n) => Ok(CellValue::Number(*n)),
            ScriptValue::Text(s) => Ok(CellValue::Text(s.clone())),
            ScriptValue::List(_) => Err(ScriptError::Type(
                "a list cannot be stored in a cell".to_string(),
            )),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::None => "NoneType",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Number(n) if n.fract() == 0.0 => "int",
            ScriptValue::Number(_) => "float",
            ScriptValue::Text(_) => "str",
            ScriptValue::List(_) => "list",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ScriptValue::None => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Number(n) => *n != 0.0,
            ScriptValue::Text(s) => !s.is_empty(),
            ScriptValue::List(items) => !items.is_empty(),
        }
    }

    /// Numbers and booleans take part in arithmetic; nothing else does.
    fn numeric(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            ScriptValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// The text `str()` produces.
    pub fn to_text(&self) -> String {
        match self {
            ScriptValue::None => "None".to_string(),
            ScriptValue::Bool(true) => "True".to_string(),
            ScriptValue::Bool(false) => "False".to_string(),
            ScriptValue::Number(n) => format_number(*n),
            ScriptValue::Text(s) => s.clone(),
            ScriptValue::List(items) => {
                let inner: Vec<String> = items.iter().map(ScriptValue::repr).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    fn repr(&self) -> String {
        match self {
            ScriptValue::Text(s) => format!("'{}'", s),
            other => other.to_text(),
        }
    }
}

fn type_error(message: impl Into<String>) -> ScriptError {
    ScriptError::Type(message.into())
}

fn value_error(message: impl Into<String>) -> ScriptError {
    ScriptError::Value(message.into())
}

/// How control leaves a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Runs `program` against `ctx`, replacing `ctx.target` with the final
/// contents of `tgt`.
pub fn run_program(program: &Program, ctx: &mut TransformContext<'_>) -> Result<(), ScriptError> {
    let mut interpreter = Interpreter::new(ctx);
    match interpreter.exec_block(&program.statements)? {
        Flow::Normal => {}
        Flow::Break => return Err(ScriptError::OutsideLoop("break")),
        Flow::Continue => return Err(ScriptError::OutsideLoop("continue")),
    }
    *ctx.target = interpreter.take_target()?;
    Ok(())
}

struct Interpreter {
    vars: HashMap<String, ScriptValue>,
}

impl Interpreter {
    fn new(ctx: &TransformContext<'_>) -> Self {
        let mut vars = HashMap::new();
        vars.insert("l".to_string(), ScriptValue::Number(ctx.row_count as f64));
        vars.insert(
            "tgt".to_string(),
            ScriptValue::List(ctx.target.iter().map(ScriptValue::from_cell).collect()),
        );
        vars.insert(
            "dpd".to_string(),
            ScriptValue::List(
                ctx.dependencies
                    .iter()
                    .map(|dep| ScriptValue::List(dep.iter().map(ScriptValue::from_cell).collect()))
                    .collect(),
            ),
        );
        vars.insert(
            "args".to_string(),
            ScriptValue::List(ctx.args.iter().cloned().map(ScriptValue::Text).collect()),
        );
        Interpreter { vars }
    }

    fn take_target(&mut self) -> Result<Vec<CellValue>, ScriptError> {
        match self.vars.remove("tgt") {
            Some(ScriptValue::List(items)) => items
                .iter()
                .enumerate()
                .map(|(row, item)| {
                    item.to_cell().map_err(|_| {
                        type_error(format!("tgt[{}] holds a list, which cannot be stored in a cell", row))
                    })
                })
                .collect(),
            Some(other) => Err(type_error(format!(
                "tgt must remain a list, found '{}'",
                other.type_name()
            ))),
            None => Err(ScriptError::UndefinedName("tgt".to_string())),
        }
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn exec_block(&mut self, statements: &[Statement]) -> Result<Flow, ScriptError> {
        for statement in statements {
            let flow = self.exec(statement)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, statement: &Statement) -> Result<Flow, ScriptError> {
        match statement {
            Statement::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)?;
            }
            Statement::Expression(Expression::MethodCall {
                receiver,
                method,
                args,
            }) if method == "append" => self.append(receiver, args)?,
            Statement::Expression(expr) => {
                self.eval(expr)?;
            }
            Statement::For {
                variable,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable)? {
                    ScriptValue::List(items) => items,
                    ScriptValue::Text(s) => s
                        .chars()
                        .map(|c| ScriptValue::Text(c.to_string()))
                        .collect(),
                    other => {
                        return Err(type_error(format!(
                            "'{}' object is not iterable",
                            other.type_name()
                        )))
                    }
                };
                for item in items {
                    self.vars.insert(variable.clone(), item);
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                }
            }
            Statement::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if self.eval_ref(condition)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(otherwise);
            }
            Statement::Pass => {}
            Statement::Break => return Ok(Flow::Break),
            Statement::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Expression, value: ScriptValue) -> Result<(), ScriptError> {
        match target {
            Expression::Name(name) => {
                self.vars.insert(name.clone(), value);
            }
            _ => *self.place_mut(target)? = value,
        }
        Ok(())
    }

    fn append(&mut self, receiver: &Expression, args: &[Expression]) -> Result<(), ScriptError> {
        if args.len() != 1 {
            return Err(type_error(format!(
                "append() takes exactly one argument ({} given)",
                args.len()
            )));
        }
        let value = self.eval(&args[0])?;
        if !receiver.is_assignable() {
            // Appending to a temporary has no visible effect.
            return match self.eval_ref(receiver)?.as_ref() {
                ScriptValue::List(_) => Ok(()),
                other => Err(no_attribute(other, "append")),
            };
        }
        match self.place_mut(receiver)? {
            ScriptValue::List(items) => {
                items.push(value);
                Ok(())
            }
            other => Err(no_attribute(other, "append")),
        }
    }

    /// Resolves a name or index chain to the storage it denotes.
    fn place_mut(&mut self, expr: &Expression) -> Result<&mut ScriptValue, ScriptError> {
        let mut indices = Vec::new();
        let mut node = expr;
        let root = loop {
            match node {
                Expression::Name(name) => break name,
                Expression::Index { target, index } => {
                    indices.push(self.eval(index)?);
                    node = target;
                }
                _ => return Err(type_error("cannot assign to this expression")),
            }
        };

        let mut place = self
            .vars
            .get_mut(root)
            .ok_or_else(|| ScriptError::UndefinedName(root.clone()))?;
        for index in indices.iter().rev() {
            place = match place {
                ScriptValue::List(items) => {
                    let i = normalize_index(index, items.len())?;
                    &mut items[i]
                }
                other => {
                    return Err(type_error(format!(
                        "'{}' object does not support item assignment",
                        other.type_name()
                    )))
                }
            };
        }
        Ok(place)
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    /// Evaluates without cloning when the expression names existing storage.
    fn eval_ref(&self, expr: &Expression) -> Result<Cow<'_, ScriptValue>, ScriptError> {
        match expr {
            Expression::Name(name) => self
                .vars
                .get(name)
                .map(Cow::Borrowed)
                .ok_or_else(|| ScriptError::UndefinedName(name.clone())),
            Expression::Index { target, index } => {
                let index = self.eval_ref(index)?;
                match self.eval_ref(target)? {
                    Cow::Borrowed(container) => index_value(container, &index),
                    Cow::Owned(container) => {
                        index_value(&container, &index).map(|v| Cow::Owned(v.into_owned()))
                    }
                }
            }
            other => self.eval(other).map(Cow::Owned),
        }
    }

    fn eval(&self, expr: &Expression) -> Result<ScriptValue, ScriptError> {
        match expr {
            Expression::Literal(value) => Ok(literal(value)),
            Expression::Name(_) | Expression::Index { .. } => {
                self.eval_ref(expr).map(Cow::into_owned)
            }
            Expression::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(ScriptValue::List),
            Expression::Call { function, args } => {
                let args = self.eval_args(args)?;
                let refs: Vec<&ScriptValue> = args.iter().map(|a| a.as_ref()).collect();
                call_builtin(function, &refs)
            }
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval_ref(receiver)?;
                let args = self.eval_args(args)?;
                let refs: Vec<&ScriptValue> = args.iter().map(|a| a.as_ref()).collect();
                call_method(&receiver, method, &refs)
            }
            Expression::BinaryOp { left, op, right } => self.eval_binary(left, *op, right),
            Expression::UnaryOp { op, operand } => {
                let operand = self.eval_ref(operand)?;
                unary(*op, &operand)
            }
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval_ref(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn eval_args(&self, args: &[Expression]) -> Result<Vec<Cow<'_, ScriptValue>>, ScriptError> {
        args.iter().map(|arg| self.eval_ref(arg)).collect()
    }

    fn eval_binary(
        &self,
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
    ) -> Result<ScriptValue, ScriptError> {
        match op {
            BinaryOperator::Or => {
                let l = self.eval(left)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval(right)
                }
            }
            BinaryOperator::And => {
                let l = self.eval(left)?;
                if l.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(l)
                }
            }
            _ => {
                let l = self.eval_ref(left)?;
                let r = self.eval_ref(right)?;
                binary(op, &l, &r)
            }
        }
    }
}

fn literal(value: &Value) -> ScriptValue {
    match value {
        Value::Number(n) => ScriptValue::Number(*n),
        Value::String(s) => ScriptValue::Text(s.clone()),
        Value::Boolean(b) => ScriptValue::Bool(*b),
        Value::None => ScriptValue::None,
    }
}

fn no_attribute(value: &ScriptValue, attribute: &str) -> ScriptError {
    type_error(format!(
        "'{}' object has no attribute '{}'",
        value.type_name(),
        attribute
    ))
}

// ============================================================================
// INDEXING
// ============================================================================

fn whole_number(value: &ScriptValue) -> Option<i64> {
    match value {
        ScriptValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
        ScriptValue::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn normalize_index(index: &ScriptValue, len: usize) -> Result<usize, ScriptError> {
    let n = whole_number(index).ok_or_else(|| {
        type_error(format!("indices must be integers, not '{}'", index.type_name()))
    })?;
    let i = if n < 0 { n + len as i64 } else { n };
    if i < 0 || i >= len as i64 {
        return Err(ScriptError::Index(format!(
            "index {} out of range for length {}",
            n, len
        )));
    }
    Ok(i as usize)
}

fn index_value<'v>(
    container: &'v ScriptValue,
    index: &ScriptValue,
) -> Result<Cow<'v, ScriptValue>, ScriptError> {
    match container {
        ScriptValue::List(items) => {
            let i = normalize_index(index, items.len())?;
            Ok(Cow::Borrowed(&items[i]))
        }
        ScriptValue::Text(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(index, chars.len())?;
            Ok(Cow::Owned(ScriptValue::Text(chars[i].to_string())))
        }
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

// ============================================================================
// OPERATORS
// ============================================================================

fn values_equal(l: &ScriptValue, r: &ScriptValue) -> bool {
    if let (Some(a), Some(b)) = (l.numeric(), r.numeric()) {
        return a == b;
    }
    match (l, r) {
        (ScriptValue::None, ScriptValue::None) => true,
        (ScriptValue::Text(a), ScriptValue::Text(b)) => a == b,
        (ScriptValue::List(a), ScriptValue::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => false,
    }
}

fn compare(l: &ScriptValue, r: &ScriptValue) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (l.numeric(), r.numeric()) {
        return a.partial_cmp(&b);
    }
    match (l, r) {
        (ScriptValue::Text(a), ScriptValue::Text(b)) => Some(a.cmp(b)),
        (ScriptValue::List(a), ScriptValue::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

fn contains(container: &ScriptValue, item: &ScriptValue) -> Result<bool, ScriptError> {
    match (container, item) {
        (ScriptValue::List(items), _) => Ok(items.iter().any(|x| values_equal(x, item))),
        (ScriptValue::Text(haystack), ScriptValue::Text(needle)) => {
            Ok(haystack.contains(needle.as_str()))
        }
        (ScriptValue::Text(_), other) => Err(type_error(format!(
            "'in <string>' requires string as left operand, not '{}'",
            other.type_name()
        ))),
        (other, _) => Err(type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn unsupported(op: BinaryOperator, l: &ScriptValue, r: &ScriptValue) -> ScriptError {
    type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        l.type_name(),
        r.type_name()
    ))
}

fn repeat_count(times: &ScriptValue) -> Result<usize, ScriptError> {
    let n = whole_number(times).ok_or_else(|| {
        type_error(format!(
            "can't multiply sequence by non-int of type '{}'",
            times.type_name()
        ))
    })?;
    Ok(n.max(0) as usize)
}

/// Length of `unit` items repeated `times` times, bounded by `MAX_SEQUENCE_LEN`.
fn repeated_len(unit: usize, times: usize) -> Result<usize, ScriptError> {
    match unit.checked_mul(times) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(total),
        _ => Err(value_error(format!(
            "repeating a sequence of length {} by {} is too large",
            unit, times
        ))),
    }
}

fn binary(op: BinaryOperator, l: &ScriptValue, r: &ScriptValue) -> Result<ScriptValue, ScriptError> {
    use BinaryOperator::*;
    use ScriptValue::{Bool, List, Number, Text};

    match op {
        Or => Ok(if l.is_truthy() { l.clone() } else { r.clone() }),
        And => Ok(if l.is_truthy() { r.clone() } else { l.clone() }),
        Equal => Ok(Bool(values_equal(l, r))),
        NotEqual => Ok(Bool(!values_equal(l, r))),
        LessThan | GreaterThan | LessEqual | GreaterEqual => {
            let ord = compare(l, r).ok_or_else(|| {
                type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op,
                    l.type_name(),
                    r.type_name()
                ))
            })?;
            Ok(Bool(match op {
                LessThan => ord == Ordering::Less,
                GreaterThan => ord == Ordering::Greater,
                LessEqual => ord != Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        In => contains(r, l).map(Bool),
        NotIn => contains(r, l).map(|found| Bool(!found)),
        Add => match (l, r) {
            (Text(a), Text(b)) => Ok(Text(format!("{}{}", a, b))),
            (List(a), List(b)) => Ok(List(a.iter().chain(b).cloned().collect())),
            _ => match (l.numeric(), r.numeric()) {
                (Some(a), Some(b)) => Ok(Number(a + b)),
                _ => Err(unsupported(op, l, r)),
            },
        },
        Multiply => match (l, r) {
            (Text(s), times) | (times, Text(s)) if times.numeric().is_some() => {
                let n = repeat_count(times)?;
                if repeated_len(s.len(), n)? == 0 {
                    return Ok(Text(String::new()));
                }
                Ok(Text(s.repeat(n)))
            }
            (List(items), times) | (times, List(items)) if times.numeric().is_some() => {
                let total = repeated_len(items.len(), repeat_count(times)?)?;
                Ok(List(items.iter().cloned().cycle().take(total).collect()))
            }
            _ => match (l.numeric(), r.numeric()) {
                (Some(a), Some(b)) => Ok(Number(a * b)),
                _ => Err(unsupported(op, l, r)),
            },
        },
        Subtract | Divide | FloorDivide | Modulo | Power => {
            let (a, b) = match (l.numeric(), r.numeric()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(unsupported(op, l, r)),
            };
            arithmetic(op, a, b).map(Number)
        }
    }
}

fn arithmetic(op: BinaryOperator, a: f64, b: f64) -> Result<f64, ScriptError> {
    match op {
        BinaryOperator::Subtract => Ok(a - b),
        BinaryOperator::Divide => {
            if b == 0.0 {
                return Err(value_error("division by zero"));
            }
            Ok(a / b)
        }
        BinaryOperator::FloorDivide => {
            if b == 0.0 {
                return Err(value_error("integer division by zero"));
            }
            Ok((a / b).floor())
        }
        BinaryOperator::Modulo => {
            if b == 0.0 {
                return Err(value_error("modulo by zero"));
            }
            Ok(a - b * (a / b).floor())
        }
        BinaryOperator::Power => {
            if a == 0.0 && b < 0.0 {
                return Err(value_error("zero cannot be raised to a negative power"));
            }
            let result = a.powf(b);
            if result.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(value_error("math domain error"));
            }
            Ok(result)
        }
        other => Err(type_error(format!("'{}' is not an arithmetic operator", other))),
    }
}

fn unary(op: UnaryOperator, operand: &ScriptValue) -> Result<ScriptValue, ScriptError> {
    match op {
        UnaryOperator::Not => Ok(ScriptValue::Bool(!operand.is_truthy())),
        UnaryOperator::Negate | UnaryOperator::Plus => {
            let n = operand.numeric().ok_or_else(|| {
                type_error(format!(
                    "bad operand type for unary {}: '{}'",
                    op,
                    operand.type_name()
                ))
            })?;
            Ok(ScriptValue::Number(if op == UnaryOperator::Negate { -n } else { n }))
        }
    }
}

// ============================================================================
// BUILT-IN FUNCTIONS
// ============================================================================

fn exact<'v, const N: usize>(
    name: &str,
    args: &[&'v ScriptValue],
) -> Result<[&'v ScriptValue; N], ScriptError> {
    args.try_into().map_err(|_| {
        type_error(format!(
            "{}() takes exactly {} argument(s) ({} given)",
            name,
            N,
            args.len()
        ))
    })
}

fn number_arg(name: &str, value: &ScriptValue) -> Result<f64, ScriptError> {
    value.numeric().ok_or_else(|| {
        type_error(format!(
            "{}() expected a number, got '{}'",
            name,
            value.type_name()
        ))
    })
}

fn int_arg(name: &str, value: &ScriptValue) -> Result<i64, ScriptError> {
    whole_number(value).ok_or_else(|| {
        type_error(format!(
            "{}() expected an integer, got '{}'",
            name,
            value.type_name()
        ))
    })
}

fn text_arg<'v>(name: &str, value: &'v ScriptValue) -> Result<&'v str, ScriptError> {
    match value {
        ScriptValue::Text(s) => Ok(s),
        other => Err(type_error(format!(
            "{}() expected a str, got '{}'",
            name,
            other.type_name()
        ))),
    }
}

fn parse_number(name: &str, text: &str) -> Result<f64, ScriptError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| value_error(format!("invalid literal for {}(): '{}'", name, text)))
}

fn call_builtin(name: &str, args: &[&ScriptValue]) -> Result<ScriptValue, ScriptError> {
    match name {
        "len" => {
            let [value] = exact::<1>(name, args)?;
            match value {
                ScriptValue::List(items) => Ok(ScriptValue::Number(items.len() as f64)),
                ScriptValue::Text(s) => Ok(ScriptValue::Number(s.chars().count() as f64)),
                other => Err(type_error(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            }
        }
        "str" => match args {
            [] => Ok(ScriptValue::Text(String::new())),
            _ => Ok(ScriptValue::Text(exact::<1>(name, args)?[0].to_text())),
        },
        "int" | "float" => {
            let [value] = exact::<1>(name, args)?;
            let n = match value {
                ScriptValue::Text(s) => parse_number(name, s)?,
                other => number_arg(name, other)?,
            };
            Ok(ScriptValue::Number(if name == "int" { n.trunc() } else { n }))
        }
        "bool" => match args {
            [] => Ok(ScriptValue::Bool(false)),
            _ => Ok(ScriptValue::Bool(exact::<1>(name, args)?[0].is_truthy())),
        },
        "abs" => {
            let [value] = exact::<1>(name, args)?;
            Ok(ScriptValue::Number(number_arg(name, value)?.abs()))
        }
        "round" => {
            let (x, digits) = match args {
                [x] => (number_arg(name, x)?, 0),
                [x, digits] => (number_arg(name, x)?, int_arg(name, digits)?),
                _ => {
                    return Err(type_error(format!(
                        "round() takes 1 or 2 arguments ({} given)",
                        args.len()
                    )))
                }
            };
            let factor = 10f64.powi(digits.clamp(-300, 300) as i32);
            Ok(ScriptValue::Number((x * factor).round_ties_even() / factor))
        }
        "min" | "max" => {
            let items: Vec<&ScriptValue> = match args {
                [ScriptValue::List(items)] => items.iter().collect(),
                _ => args.to_vec(),
            };
            let mut best = *items
                .first()
                .ok_or_else(|| value_error(format!("{}() arg is an empty sequence", name)))?;
            for item in &items[1..] {
                let ord = compare(item, best).ok_or_else(|| {
                    type_error(format!(
                        "{}() cannot compare '{}' and '{}'",
                        name,
                        item.type_name(),
                        best.type_name()
                    ))
                })?;
                let better = if name == "min" {
                    ord == Ordering::Less
                } else {
                    ord == Ordering::Greater
                };
                if better {
                    best = *item;
                }
            }
            Ok(best.clone())
        }
        "range" => {
            let (start, stop, step) = match args {
                [stop] => (0, int_arg(name, stop)?, 1),
                [start, stop] => (int_arg(name, start)?, int_arg(name, stop)?, 1),
                [start, stop, step] => (
                    int_arg(name, start)?,
                    int_arg(name, stop)?,
                    int_arg(name, step)?,
                ),
                _ => {
                    return Err(type_error(format!(
                        "range() takes 1 to 3 arguments ({} given)",
                        args.len()
                    )))
                }
            };
            range(start, stop, step)
        }
        other => Err(ScriptError::UnknownFunction(other.to_string())),
    }
}

fn range(start: i64, stop: i64, step: i64) -> Result<ScriptValue, ScriptError> {
    if step == 0 {
        return Err(value_error("range() step must not be zero"));
    }
    // Widened so that spans between extreme bounds cannot overflow.
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    let len = if span <= 0 { 0 } else { (span - 1) / step.abs() + 1 };
    if len > MAX_SEQUENCE_LEN as i128 {
        return Err(value_error(format!("range() of {} items is too large", len)));
    }
    Ok(ScriptValue::List(
        (0..len)
            .map(|k| ScriptValue::Number((start + k * step) as f64))
            .collect(),
    ))
}

// ============================================================================
// METHODS
// ============================================================================

fn call_method(
    receiver: &ScriptValue,
    method: &str,
    args: &[&ScriptValue],
) -> Result<ScriptValue, ScriptError> {
    match receiver {
        ScriptValue::Text(s) => text_method(s, method, args),
        ScriptValue::List(items) => list_method(items, method, args),
        other => Err(no_attribute(other, method)),
    }
}

fn text_method(s: &str, method: &str, args: &[&ScriptValue]) -> Result<ScriptValue, ScriptError> {
    let text = |t: String| Ok(ScriptValue::Text(t));
    match method {
        "upper" => {
            exact::<0>(method, args)?;
            text(s.to_uppercase())
        }
        "lower" => {
            exact::<0>(method, args)?;
            text(s.to_lowercase())
        }
        "isdigit" => {
            exact::<0>(method, args)?;
            Ok(ScriptValue::Bool(
                !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
            ))
        }
        "strip" | "lstrip" | "rstrip" => {
            let chars: Option<Vec<char>> = match args {
                [] => None,
                [chars] => Some(text_arg(method, chars)?.chars().collect()),
                _ => return Err(type_error(format!("{}() takes at most 1 argument", method))),
            };
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            text(match method {
                "lstrip" => s.trim_start_matches(matches).to_string(),
                "rstrip" => s.trim_end_matches(matches).to_string(),
                _ => s.trim_matches(matches).to_string(),
            })
        }
        "startswith" => {
            let [prefix] = exact::<1>(method, args)?;
            Ok(ScriptValue::Bool(s.starts_with(text_arg(method, prefix)?)))
        }
        "endswith" => {
            let [suffix] = exact::<1>(method, args)?;
            Ok(ScriptValue::Bool(s.ends_with(text_arg(method, suffix)?)))
        }
        "replace" => {
            let [from, to] = exact::<2>(method, args)?;
            text(s.replace(text_arg(method, from)?, text_arg(method, to)?))
        }
        "split" => {
            let parts: Vec<ScriptValue> = match args {
                [] => s
                    .split_whitespace()
                    .map(|p| ScriptValue::Text(p.to_string()))
                    .collect(),
                [sep] => {
                    let sep = text_arg(method, sep)?;
                    if sep.is_empty() {
                        return Err(value_error("empty separator"));
                    }
                    s.split(sep).map(|p| ScriptValue::Text(p.to_string())).collect()
                }
                _ => return Err(type_error("split() takes at most 1 argument")),
            };
            Ok(ScriptValue::List(parts))
        }
        "zfill" => {
            let [width] = exact::<1>(method, args)?;
            let width = int_arg(method, width)?.max(0) as usize;
            if width > MAX_SEQUENCE_LEN {
                return Err(value_error(format!("zfill() width {} is too large", width)));
            }
            let len = s.chars().count();
            if len >= width {
                return text(s.to_string());
            }
            let (sign, digits) = match s.strip_prefix(|c: char| c == '+' || c == '-') {
                Some(rest) => (&s[..1], rest),
                None => ("", s),
            };
            text(format!("{}{}{}", sign, "0".repeat(width - len), digits))
        }
        "join" => {
            let [items] = exact::<1>(method, args)?;
            let items = match items {
                ScriptValue::List(items) => items,
                other => {
                    return Err(type_error(format!(
                        "can only join a list, not '{}'",
                        other.type_name()
                    )))
                }
            };
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    ScriptValue::Text(p) => parts.push(p.as_str()),
                    other => {
                        return Err(type_error(format!(
                            "sequence item {}: expected str, found '{}'",
                            i,
                            other.type_name()
                        )))
                    }
                }
            }
            text(parts.join(s))
        }
        other => Err(no_attribute(&ScriptValue::Text(String::new()), other)),
    }
}

fn list_method(
    items: &[ScriptValue],
    method: &str,
    args: &[&ScriptValue],
) -> Result<ScriptValue, ScriptError> {
    match method {
        "append" => Err(type_error("append() can only be used as a statement")),
        "index" => {
            let [wanted] = exact::<1>(method, args)?;
            items
                .iter()
                .position(|x| values_equal(x, wanted))
                .map(|i| ScriptValue::Number(i as f64))
                .ok_or_else(|| value_error(format!("{} is not in list", wanted.repr())))
        }
        "count" => {
            let [wanted] = exact::<1>(method, args)?;
            let n = items.iter().filter(|x| values_equal(x, wanted)).count();
            Ok(ScriptValue::Number(n as f64))
        }
        other => Err(no_attribute(&ScriptValue::List(Vec::new()), other)),
    }
}
