//! FILENAME: core/parser/src/token.rs
//! PURPOSE: Token definitions for the script lexer.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed by the parser.
//! Layout tokens (Newline, Indent, Dedent) carry the block structure.

/// Tokens recognized by the script lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Identifier(String),

    // Keywords
    For,
    In,
    If,
    Elif,
    Else,
    And,
    Or,
    Not,
    True,
    False,
    None,
    Pass,
    Break,
    Continue,

    // Operators
    Plus,
    Minus,
    Asterisk,
    DoubleAsterisk,
    Slash,
    DoubleSlash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    Equals,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,

    // Layout
    Newline,
    Indent,
    Dedent,
    /// A dedent that does not line up with any enclosing block.
    BadDedent,

    // Special
    EOF,
    Illegal(char),
}

impl Token {
    /// Maps a bare word onto its keyword token, if it is one.
    pub fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "for" => Token::For,
            "in" => Token::In,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            "pass" => Token::Pass,
            "break" => Token::Break,
            "continue" => Token::Continue,
            _ => return None,
        };
        Some(token)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "'{}'", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::If => write!(f, "if"),
            Token::Elif => write!(f, "elif"),
            Token::Else => write!(f, "else"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::None => write!(f, "None"),
            Token::Pass => write!(f, "pass"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Asterisk => write!(f, "*"),
            Token::DoubleAsterisk => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::DoubleSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::Assign => write!(f, "="),
            Token::PlusAssign => write!(f, "+="),
            Token::MinusAssign => write!(f, "-="),
            Token::Equals => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::LessThan => write!(f, "<"),
            Token::GreaterThan => write!(f, ">"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterEqual => write!(f, ">="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::Newline => write!(f, "NEWLINE"),
            Token::Indent => write!(f, "INDENT"),
            Token::Dedent => write!(f, "DEDENT"),
            Token::BadDedent => write!(f, "BAD_DEDENT"),
            Token::EOF => write!(f, "EOF"),
            Token::Illegal(c) => write!(f, "ILLEGAL({})", c),
        }
    }
}
