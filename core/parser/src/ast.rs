//! FILENAME: core/parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for transform scripts.
//! CONTEXT: After the Lexer tokenizes the script text, the Parser converts
//! those tokens into this tree. The engine's evaluator then walks it with the
//! four bindings a transform can see (`l`, `tgt`, `dpd`, `args`).

/// A parsed script: the top-level statements in source order.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A single statement.
#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    /// `target = value`. The target is always a `Name` or an `Index` chain
    /// rooted at a `Name`; the parser rejects anything else.
    Assign { target: Expression, value: Expression },

    /// An expression evaluated for its effect, e.g. `out.append(x)`.
    Expression(Expression),

    /// `for variable in iterable:` followed by a block.
    For {
        variable: String,
        iterable: Expression,
        body: Vec<Statement>,
    },

    /// `if` / `elif` branches in order, then the optional `else` block.
    If {
        branches: Vec<(Expression, Vec<Statement>)>,
        otherwise: Vec<Statement>,
    },

    Pass,
    Break,
    Continue,
}

/// Represents a parsed expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A literal value: number, string, boolean or None.
    Literal(Value),

    /// A variable or binding name such as `tgt` or `i`.
    Name(String),

    /// A list literal: `[a, b, c]`.
    List(Vec<Expression>),

    /// Subscript: `target[index]`.
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },

    /// A call to a built-in function: `len(x)`.
    Call { function: String, args: Vec<Expression> },

    /// A method call on a value: `name.strip()`.
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },

    /// A binary operation: left op right.
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand.
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// `then if condition else otherwise`.
    Conditional {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
}

impl Expression {
    /// True for expressions that may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expression::Name(_) => true,
            Expression::Index { target, .. } => target.is_assignable(),
            _ => false,
        }
    }
}

/// Literal values that can appear in scripts.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    None,
}

/// Binary operators, listed from lowest to highest precedence group.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Or,
    And,

    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    In,
    NotIn,

    Add,
    Subtract,

    Multiply,
    Divide,
    FloorDivide,
    Modulo,

    Power,
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            BinaryOperator::Or => "or",
            BinaryOperator::And => "and",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::In => "in",
            BinaryOperator::NotIn => "not in",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::FloorDivide => "//",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "**",
        };
        write!(f, "{}", symbol)
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Not => write!(f, "not"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::None => write!(f, "None"),
        }
    }
}
