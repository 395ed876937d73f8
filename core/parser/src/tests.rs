//! FILENAME: core/parser/src/tests.rs
//! PURPOSE: Consolidated unit tests for the script parser crate.

use crate::ast::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};
use crate::lexer::Lexer;
use crate::parser::parse;
use crate::token::Token;

fn name(s: &str) -> Expression {
    Expression::Name(s.to_string())
}

fn num(n: f64) -> Expression {
    Expression::Literal(Value::Number(n))
}

fn index(target: Expression, idx: Expression) -> Expression {
    Expression::Index {
        target: Box::new(target),
        index: Box::new(idx),
    }
}

fn tokens(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token();
        if token == Token::EOF {
            break;
        }
        out.push(token);
    }
    out
}

// ========================================
// LEXER TESTS
// ========================================

#[test]
fn lexer_tokenizes_assignment() {
    assert_eq!(
        tokens("tgt[i] = 1"),
        vec![
            Token::Identifier("tgt".to_string()),
            Token::LBracket,
            Token::Identifier("i".to_string()),
            Token::RBracket,
            Token::Assign,
            Token::Number(1.0),
            Token::Newline,
        ]
    );
}

#[test]
fn lexer_handles_both_quote_styles() {
    assert_eq!(
        tokens("'Hi ' \"there\""),
        vec![
            Token::String("Hi ".to_string()),
            Token::String("there".to_string()),
            Token::Newline,
        ]
    );
}

#[test]
fn lexer_handles_escapes_in_strings() {
    let mut lexer = Lexer::new(r"'it\'s\n'");
    assert_eq!(lexer.next_token(), Token::String("it's\n".to_string()));
}

#[test]
fn lexer_tokenizes_multi_char_operators() {
    assert_eq!(
        tokens("== != <= >= ** // += -="),
        vec![
            Token::Equals,
            Token::NotEqual,
            Token::LessEqual,
            Token::GreaterEqual,
            Token::DoubleAsterisk,
            Token::DoubleSlash,
            Token::PlusAssign,
            Token::MinusAssign,
            Token::Newline,
        ]
    );
}

#[test]
fn lexer_recognizes_keywords_case_sensitively() {
    assert_eq!(
        tokens("for in True none"),
        vec![
            Token::For,
            Token::In,
            Token::True,
            Token::Identifier("none".to_string()),
            Token::Newline,
        ]
    );
}

#[test]
fn lexer_emits_indent_and_dedent() {
    assert_eq!(
        tokens("for i in x:\n    pass\ny = 1\n"),
        vec![
            Token::For,
            Token::Identifier("i".to_string()),
            Token::In,
            Token::Identifier("x".to_string()),
            Token::Colon,
            Token::Newline,
            Token::Indent,
            Token::Pass,
            Token::Newline,
            Token::Dedent,
            Token::Identifier("y".to_string()),
            Token::Assign,
            Token::Number(1.0),
            Token::Newline,
        ]
    );
}

#[test]
fn lexer_closes_open_blocks_at_end_of_input() {
    let toks = tokens("if a:\n    if b:\n        pass");
    let tail: Vec<Token> = toks[toks.len() - 3..].to_vec();
    assert_eq!(tail, vec![Token::Newline, Token::Dedent, Token::Dedent]);
}

#[test]
fn lexer_skips_blank_and_comment_lines() {
    assert_eq!(
        tokens("\n   \n# note\nx = 1 # trailing\n"),
        vec![
            Token::Identifier("x".to_string()),
            Token::Assign,
            Token::Number(1.0),
            Token::Newline,
        ]
    );
}

#[test]
fn lexer_ignores_newlines_inside_brackets() {
    assert_eq!(
        tokens("x = [1,\n     2]"),
        vec![
            Token::Identifier("x".to_string()),
            Token::Assign,
            Token::LBracket,
            Token::Number(1.0),
            Token::Comma,
            Token::Number(2.0),
            Token::RBracket,
            Token::Newline,
        ]
    );
}

#[test]
fn lexer_flags_inconsistent_dedent() {
    let toks = tokens("if a:\n    pass\n  pass\n");
    assert!(toks.contains(&Token::BadDedent));
}

// ========================================
// PARSER TESTS - EXPRESSIONS
// ========================================

fn parse_expr(input: &str) -> Expression {
    let program = parse(input).unwrap();
    match program.statements.into_iter().next() {
        Some(Statement::Expression(expr)) => expr,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn parser_respects_arithmetic_precedence() {
    assert_eq!(
        parse_expr("1 + 2 * 3"),
        Expression::BinaryOp {
            left: Box::new(num(1.0)),
            op: BinaryOperator::Add,
            right: Box::new(Expression::BinaryOp {
                left: Box::new(num(2.0)),
                op: BinaryOperator::Multiply,
                right: Box::new(num(3.0)),
            }),
        }
    );
}

#[test]
fn parser_binds_power_tighter_than_negation() {
    assert_eq!(
        parse_expr("-2 ** 2"),
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(Expression::BinaryOp {
                left: Box::new(num(2.0)),
                op: BinaryOperator::Power,
                right: Box::new(num(2.0)),
            }),
        }
    );
}

#[test]
fn parser_parses_nested_index() {
    assert_eq!(
        parse_expr("dpd[0][i]"),
        index(index(name("dpd"), num(0.0)), name("i"))
    );
}

#[test]
fn parser_parses_not_in() {
    assert_eq!(
        parse_expr("x not in y"),
        Expression::BinaryOp {
            left: Box::new(name("x")),
            op: BinaryOperator::NotIn,
            right: Box::new(name("y")),
        }
    );
}

#[test]
fn parser_parses_conditional_expression() {
    assert_eq!(
        parse_expr("'a' if x > 1 else 'b'"),
        Expression::Conditional {
            condition: Box::new(Expression::BinaryOp {
                left: Box::new(name("x")),
                op: BinaryOperator::GreaterThan,
                right: Box::new(num(1.0)),
            }),
            then: Box::new(Expression::Literal(Value::String("a".to_string()))),
            otherwise: Box::new(Expression::Literal(Value::String("b".to_string()))),
        }
    );
}

#[test]
fn parser_parses_calls_and_methods() {
    assert_eq!(
        parse_expr("str(x).strip()"),
        Expression::MethodCall {
            receiver: Box::new(Expression::Call {
                function: "str".to_string(),
                args: vec![name("x")],
            }),
            method: "strip".to_string(),
            args: vec![],
        }
    );
}

#[test]
fn parser_parses_list_literal_with_trailing_comma() {
    assert_eq!(
        parse_expr("[1, 'a', None,]"),
        Expression::List(vec![
            num(1.0),
            Expression::Literal(Value::String("a".to_string())),
            Expression::Literal(Value::None),
        ])
    );
}

#[test]
fn parser_parses_boolean_logic() {
    assert_eq!(
        parse_expr("not a and b or c"),
        Expression::BinaryOp {
            left: Box::new(Expression::BinaryOp {
                left: Box::new(Expression::UnaryOp {
                    op: UnaryOperator::Not,
                    operand: Box::new(name("a")),
                }),
                op: BinaryOperator::And,
                right: Box::new(name("b")),
            }),
            op: BinaryOperator::Or,
            right: Box::new(name("c")),
        }
    );
}

// ========================================
// PARSER TESTS - STATEMENTS
// ========================================

#[test]
fn parser_parses_one_line_for_loop() {
    let program = parse("for i in range(l): tgt[i] = 'Hi ' + dpd[0][i]").unwrap();
    assert_eq!(
        program,
        Program {
            statements: vec![Statement::For {
                variable: "i".to_string(),
                iterable: Expression::Call {
                    function: "range".to_string(),
                    args: vec![name("l")],
                },
                body: vec![Statement::Assign {
                    target: index(name("tgt"), name("i")),
                    value: Expression::BinaryOp {
                        left: Box::new(Expression::Literal(Value::String("Hi ".to_string()))),
                        op: BinaryOperator::Add,
                        right: Box::new(index(index(name("dpd"), num(0.0)), name("i"))),
                    },
                }],
            }],
        }
    );
}

#[test]
fn parser_parses_block_if_elif_else() {
    let script = "\
if x == 1:
    y = 'one'
elif x == 2:
    y = 'two'
else:
    y = 'many'
";
    let program = parse(script).unwrap();
    match &program.statements[0] {
        Statement::If {
            branches,
            otherwise,
        } => {
            assert_eq!(branches.len(), 2);
            assert_eq!(otherwise.len(), 1);
        }
        other => panic!("expected if statement, got {:?}", other),
    }
}

#[test]
fn parser_attaches_else_after_one_line_if() {
    let program = parse("if a: x = 1\nelse: x = 2\n").unwrap();
    assert_eq!(program.statements.len(), 1);
}

#[test]
fn parser_parses_nested_blocks() {
    let script = "\
for i in range(l):
    if dpd[0][i] is_missing:
        pass
";
    // `is_missing` is not an operator, so this must fail cleanly.
    assert!(parse(script).is_err());

    let script = "\
for i in range(l):
    if dpd[0][i] == None:
        continue
    tgt[i] = dpd[0][i]
";
    let program = parse(script).unwrap();
    match &program.statements[0] {
        Statement::For { body, .. } => assert_eq!(body.len(), 2),
        other => panic!("expected for loop, got {:?}", other),
    }
}

#[test]
fn parser_desugars_augmented_assignment() {
    let program = parse("total += 1").unwrap();
    assert_eq!(
        program.statements[0],
        Statement::Assign {
            target: name("total"),
            value: Expression::BinaryOp {
                left: Box::new(name("total")),
                op: BinaryOperator::Add,
                right: Box::new(num(1.0)),
            },
        }
    );
}

#[test]
fn parser_splits_semicolon_statements() {
    let program = parse("a = 1; b = 2;").unwrap();
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn parser_accepts_uniformly_indented_script() {
    let program = parse("    a = 1\n    b = 2\n").unwrap();
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn parser_accepts_empty_script() {
    assert_eq!(parse("").unwrap(), Program::default());
    assert_eq!(parse("# only a comment\n").unwrap(), Program::default());
}

// ========================================
// PARSER TESTS - ERRORS
// ========================================

#[test]
fn parser_rejects_assignment_to_call() {
    let err = parse("len(x) = 3").unwrap_err();
    assert!(err.message.contains("assign"));
}

#[test]
fn parser_rejects_missing_block() {
    assert!(parse("for i in x:\npass\n").is_err());
}

#[test]
fn parser_rejects_stray_else() {
    assert!(parse("else: x = 1").is_err());
}

#[test]
fn parser_reports_line_numbers() {
    let err = parse("a = 1\nb = = 2\n").unwrap_err();
    assert_eq!(err.line, 2);
}

#[test]
fn parser_rejects_unterminated_string() {
    assert!(parse("x = 'abc").is_err());
}
