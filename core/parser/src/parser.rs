//! FILENAME: core/parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into a Program.
//! CONTEXT: This is the second stage of the parsing pipeline. It takes tokens
//! from the Lexer and builds the statement tree the engine evaluates.
//!
//! GRAMMAR:
//!   program        --> statement* EOF
//!   statement      --> for_stmt | if_stmt | simple_line
//!   for_stmt       --> "for" IDENTIFIER "in" expression ":" suite
//!   if_stmt        --> "if" expression ":" suite ("elif" expression ":" suite)* ("else" ":" suite)?
//!   suite          --> NEWLINE INDENT statement+ DEDENT | simple_line
//!   simple_line    --> simple_stmt (";" simple_stmt)* ";"? NEWLINE
//!   simple_stmt    --> "pass" | "break" | "continue"
//!                    | expression (("=" | "+=" | "-=") expression)?
//!   expression     --> disjunction ("if" disjunction "else" expression)?
//!   disjunction    --> conjunction ("or" conjunction)*
//!   conjunction    --> inversion ("and" inversion)*
//!   inversion      --> "not" inversion | comparison
//!   comparison     --> additive (comp_op additive)*
//!   comp_op        --> "==" | "!=" | "<" | ">" | "<=" | ">=" | "in" | "not" "in"
//!   additive       --> multiplicative (("+" | "-") multiplicative)*
//!   multiplicative --> unary (("*" | "/" | "//" | "%") unary)*
//!   unary          --> ("-" | "+") unary | power
//!   power          --> postfix ("**" unary)?
//!   postfix        --> primary ("[" expression "]" | "." IDENTIFIER "(" arguments? ")")*
//!   primary        --> NUMBER | STRING | "True" | "False" | "None"
//!                    | IDENTIFIER ("(" arguments? ")")?
//!                    | "(" expression ")" | "[" arguments? "]"
//!   arguments      --> expression ("," expression)* ","?

use crate::ast::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};
use crate::lexer::Lexer;
use crate::token::Token;

/// Parser errors with descriptive messages.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
    /// 1-based source line the parser had reached.
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error (line {}): {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    /// Line of `current_token`, captured before the lexer moves past it.
    current_line: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_line = lexer.line();
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
            current_line,
        }
    }

    /// Parses the entire input and returns the program.
    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();

        // A script may legitimately start indented when it was flattened from
        // a nested structure; treat a leading indent as the top level.
        let mut leading_indent = false;
        if self.current_token == Token::Indent {
            leading_indent = true;
            self.advance();
        }

        while self.current_token != Token::EOF {
            if leading_indent && self.current_token == Token::Dedent {
                self.advance();
                leading_indent = false;
                continue;
            }
            statements.extend(self.parse_statement()?);
        }

        Ok(Program { statements })
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current_line = self.lexer.line();
        self.current_token = self.lexer.next_token();
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.current_line)
    }

    /// Checks if the current token matches the expected token.
    /// If it matches, advances and returns Ok. Otherwise returns an error.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected {}, found {}",
                expected, self.current_token
            )))
        }
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn parse_statement(&mut self) -> ParseResult<Vec<Statement>> {
        match self.current_token {
            Token::For => Ok(vec![self.parse_for()?]),
            Token::If => Ok(vec![self.parse_if()?]),
            Token::Indent => Err(self.error("Unexpected indentation")),
            Token::BadDedent => Err(self.error("Unindent does not match any outer indentation level")),
            Token::Elif | Token::Else => Err(self.error(format!(
                "'{}' without a matching 'if'",
                self.current_token
            ))),
            _ => self.parse_simple_line(),
        }
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        self.expect(Token::For)?;

        let variable = match self.current_token.clone() {
            Token::Identifier(name) => {
                self.advance();
                name
            }
            other => {
                return Err(self.error(format!("Expected loop variable, found {}", other)));
            }
        };

        self.expect(Token::In)?;
        let iterable = self.parse_expression()?;
        self.expect(Token::Colon)?;
        let body = self.parse_suite()?;

        Ok(Statement::For {
            variable,
            iterable,
            body,
        })
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.expect(Token::If)?;

        let mut branches = Vec::new();
        let condition = self.parse_expression()?;
        self.expect(Token::Colon)?;
        branches.push((condition, self.parse_suite()?));

        while self.current_token == Token::Elif {
            self.advance();
            let condition = self.parse_expression()?;
            self.expect(Token::Colon)?;
            branches.push((condition, self.parse_suite()?));
        }

        let mut otherwise = Vec::new();
        if self.current_token == Token::Else {
            self.advance();
            self.expect(Token::Colon)?;
            otherwise = self.parse_suite()?;
        }

        Ok(Statement::If {
            branches,
            otherwise,
        })
    }

    /// Parses a block body: either an indented block or the rest of the line.
    fn parse_suite(&mut self) -> ParseResult<Vec<Statement>> {
        if self.current_token != Token::Newline {
            return self.parse_simple_line();
        }

        self.advance();
        if self.current_token != Token::Indent {
            return Err(self.error("Expected an indented block"));
        }
        self.advance();

        let mut body = Vec::new();
        while self.current_token != Token::Dedent {
            if self.current_token == Token::EOF {
                return Err(self.error("Unexpected end of script inside block"));
            }
            body.extend(self.parse_statement()?);
        }
        self.advance();

        Ok(body)
    }

    fn parse_simple_line(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = vec![self.parse_simple_statement()?];

        while self.current_token == Token::Semicolon {
            self.advance();
            if self.current_token == Token::Newline {
                break;
            }
            statements.push(self.parse_simple_statement()?);
        }

        match self.current_token {
            Token::Newline => {
                self.advance();
                Ok(statements)
            }
            // The lexer always closes the last line, but be lenient with
            // a dedent emitted right after a one-line body.
            Token::EOF | Token::Dedent => Ok(statements),
            ref other => Err(self.error(format!(
                "Unexpected token after statement: {}",
                other
            ))),
        }
    }

    fn parse_simple_statement(&mut self) -> ParseResult<Statement> {
        match self.current_token {
            Token::Pass => {
                self.advance();
                return Ok(Statement::Pass);
            }
            Token::Break => {
                self.advance();
                return Ok(Statement::Break);
            }
            Token::Continue => {
                self.advance();
                return Ok(Statement::Continue);
            }
            _ => {}
        }

        let expr = self.parse_expression()?;

        let augmented = match self.current_token {
            Token::Assign => None,
            Token::PlusAssign => Some(BinaryOperator::Add),
            Token::MinusAssign => Some(BinaryOperator::Subtract),
            _ => return Ok(Statement::Expression(expr)),
        };

        if !expr.is_assignable() {
            return Err(self.error("Cannot assign to this expression"));
        }

        self.advance();
        let right = self.parse_expression()?;

        let value = match augmented {
            None => right,
            Some(op) => Expression::BinaryOp {
                left: Box::new(expr.clone()),
                op,
                right: Box::new(right),
            },
        };

        Ok(Statement::Assign {
            target: expr,
            value,
        })
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    /// Entry point for expression parsing.
    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let then = self.parse_disjunction()?;

        if self.current_token != Token::If {
            return Ok(then);
        }

        self.advance();
        let condition = self.parse_disjunction()?;
        self.expect(Token::Else)?;
        let otherwise = self.parse_expression()?;

        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_disjunction(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_conjunction()?;

        while self.current_token == Token::Or {
            self.advance();
            let right = self.parse_conjunction()?;
            left = binary(left, BinaryOperator::Or, right);
        }

        Ok(left)
    }

    fn parse_conjunction(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_inversion()?;

        while self.current_token == Token::And {
            self.advance();
            let right = self.parse_inversion()?;
            left = binary(left, BinaryOperator::And, right);
        }

        Ok(left)
    }

    fn parse_inversion(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::Not {
            self.advance();
            let operand = self.parse_inversion()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }

        self.parse_comparison()
    }

    /// Parses comparison expressions (==, !=, <, >, <=, >=, in, not in).
    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current_token {
                Token::Equals => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                Token::In => BinaryOperator::In,
                Token::Not => {
                    // Only `not in` is valid in operator position.
                    self.advance();
                    if self.current_token != Token::In {
                        return Err(self.error("Expected 'in' after 'not'"));
                    }
                    BinaryOperator::NotIn
                }
                _ => break,
            };

            self.advance();
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    /// Parses additive expressions (+ and -).
    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    /// Parses multiplicative expressions (*, /, //, %).
    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::DoubleSlash => BinaryOperator::FloorDivide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    /// Parses unary expressions (negation and unary plus).
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = match self.current_token {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };

        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    /// Parses exponentiation (**), which binds tighter than unary minus on its left.
    fn parse_power(&mut self) -> ParseResult<Expression> {
        let left = self.parse_postfix()?;

        if self.current_token == Token::DoubleAsterisk {
            self.advance();
            let right = self.parse_unary()?;
            return Ok(binary(left, BinaryOperator::Power, right));
        }

        Ok(left)
    }

    /// Parses subscripts and method calls trailing a primary expression.
    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_token {
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expression::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::Dot => {
                    self.advance();
                    let method = match self.current_token.clone() {
                        Token::Identifier(name) => {
                            self.advance();
                            name
                        }
                        other => {
                            return Err(self.error(format!(
                                "Expected method name after '.', found {}",
                                other
                            )));
                        }
                    };
                    self.expect(Token::LParen)?;
                    let args = self.parse_arguments(Token::RParen)?;
                    expr = Expression::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Parses primary expressions (literals, names, calls, parentheses, lists).
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current_token.clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expression::Literal(Value::Number(n)))
            }

            Token::String(s) => {
                self.advance();
                Ok(Expression::Literal(Value::String(s)))
            }

            Token::True => {
                self.advance();
                Ok(Expression::Literal(Value::Boolean(true)))
            }

            Token::False => {
                self.advance();
                Ok(Expression::Literal(Value::Boolean(false)))
            }

            Token::None => {
                self.advance();
                Ok(Expression::Literal(Value::None))
            }

            Token::Identifier(name) => {
                self.advance();

                if self.current_token == Token::LParen {
                    self.advance();
                    let args = self.parse_arguments(Token::RParen)?;
                    return Ok(Expression::Call {
                        function: name,
                        args,
                    });
                }

                Ok(Expression::Name(name))
            }

            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::LBracket => {
                self.advance();
                let items = self.parse_arguments(Token::RBracket)?;
                Ok(Expression::List(items))
            }

            Token::EOF | Token::Newline => Err(self.error("Unexpected end of expression")),

            Token::Illegal(ch) => Err(self.error(format!("Illegal character: {}", ch))),

            token => Err(self.error(format!("Unexpected token: {}", token))),
        }
    }

    /// Parses a comma-separated list up to and including `close`.
    /// The opening delimiter has already been consumed.
    fn parse_arguments(&mut self, close: Token) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();

        while self.current_token != close {
            args.push(self.parse_expression()?);

            if self.current_token == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(close)?;
        Ok(args)
    }
}

fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    Expression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Convenience function to parse script text directly.
pub fn parse(input: &str) -> ParseResult<Program> {
    let mut parser = Parser::new(input);
    parser.parse()
}
