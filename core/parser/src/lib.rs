//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the transform-script parser.
//! CONTEXT: Columns declared with `dependence` carry a small script that fills
//! the target buffer from the dependency columns. This crate turns that script
//! text into a statement tree; evaluation lives in the engine.
//!
//! PIPELINE: Script Text --> Lexer --> Tokens --> Parser --> Program --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Statements: assignment (incl. indexed targets, += and -=), for-in loops,
//!   if/elif/else, pass, break, continue, expression statements
//! - Indentation-delimited blocks, or a single-line body after the colon
//! - Arithmetic: + - * / // % ** and unary -
//! - Comparison: == != < > <= >= in, not in
//! - Logic: and, or, not, conditional expressions (a if c else b)
//! - Indexing, list literals, built-in calls, method calls
//!
//! There is no `while`, `def` or `import`: every script terminates
//! and can only reach the bindings the evaluator hands it.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

#[cfg(test)]
mod tests;

pub use ast::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser};
pub use token::Token;
