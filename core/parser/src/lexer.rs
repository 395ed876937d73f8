//! FILENAME: core/parser/src/lexer.rs
//! PURPOSE: Scans raw script text and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. Besides the usual
//! number/string/identifier scanning it tracks indentation, turning leading
//! whitespace into Indent/Dedent tokens and line ends into Newline tokens.
//!
//! LAYOUT RULES:
//! - Blank lines and comment-only lines produce no tokens.
//! - Line ends inside ( ) or [ ] are ordinary whitespace.
//! - A tab counts as four columns.
//! - At end of input a final Newline (if the last line had content) and one
//!   Dedent per open block are emitted before EOF.

use crate::token::Token;
use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::Chars;

const TAB_WIDTH: usize = 4;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    /// Indentation widths of the open blocks. The bottom entry is always 0.
    indent_stack: Vec<usize>,
    pending: VecDeque<Token>,
    at_line_start: bool,
    nesting: usize,
    line: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
            indent_stack: vec![0],
            pending: VecDeque::new(),
            at_line_start: true,
            nesting: 0,
            line: 1,
            finished: false,
        }
    }

    /// The 1-based line the lexer is currently on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop_front() {
            return token;
        }
        if self.finished {
            return Token::EOF;
        }

        if self.at_line_start && self.nesting == 0 {
            if let Some(token) = self.read_indentation() {
                return token;
            }
        }

        self.skip_inline_whitespace();

        match self.input.next() {
            None => self.finish(),

            Some('\n') => {
                self.line += 1;
                if self.nesting > 0 {
                    return self.next_token();
                }
                self.at_line_start = true;
                Token::Newline
            }

            Some('#') => {
                self.skip_comment();
                self.next_token()
            }

            Some('+') => self.with_equals(Token::PlusAssign, Token::Plus),
            Some('-') => self.with_equals(Token::MinusAssign, Token::Minus),
            Some('*') => self.doubled('*', Token::DoubleAsterisk, Token::Asterisk),
            Some('/') => self.doubled('/', Token::DoubleSlash, Token::Slash),
            Some('%') => Token::Percent,
            Some('=') => self.with_equals(Token::Equals, Token::Assign),
            Some('!') => self.with_equals(Token::NotEqual, Token::Illegal('!')),
            Some('<') => self.with_equals(Token::LessEqual, Token::LessThan),
            Some('>') => self.with_equals(Token::GreaterEqual, Token::GreaterThan),
            Some(',') => Token::Comma,
            Some(':') => Token::Colon,
            Some(';') => Token::Semicolon,

            Some('(') => {
                self.nesting += 1;
                Token::LParen
            }
            Some(')') => {
                self.nesting = self.nesting.saturating_sub(1);
                Token::RParen
            }
            Some('[') => {
                self.nesting += 1;
                Token::LBracket
            }
            Some(']') => {
                self.nesting = self.nesting.saturating_sub(1);
                Token::RBracket
            }

            Some('.') => match self.input.peek() {
                Some(ch) if ch.is_ascii_digit() => self.read_number('.'),
                _ => Token::Dot,
            },

            Some(quote @ ('"' | '\'')) => self.read_string(quote),

            Some(ch) if ch.is_ascii_digit() => self.read_number(ch),

            Some(ch) if is_letter(ch) => self.read_identifier(ch),

            Some(ch) => Token::Illegal(ch),
        }
    }

    /// Measures the indentation of the next non-blank line and emits the
    /// matching layout token, if any.
    fn read_indentation(&mut self) -> Option<Token> {
        let width = loop {
            let mut width = 0;
            while let Some(&ch) = self.input.peek() {
                match ch {
                    ' ' => width += 1,
                    '\t' => width += TAB_WIDTH,
                    '\r' => {}
                    _ => break,
                }
                self.input.next();
            }

            match self.input.peek() {
                Some('\n') => {
                    self.input.next();
                    self.line += 1;
                }
                Some('#') => {
                    self.skip_comment();
                }
                None => return None,
                Some(_) => break width,
            }
        };

        self.at_line_start = false;
        let current = self.indent_stack.last().copied().unwrap_or(0);

        if width > current {
            self.indent_stack.push(width);
            return Some(Token::Indent);
        }

        while self.indent_stack.len() > 1
            && self.indent_stack.last().copied().unwrap_or(0) > width
        {
            self.indent_stack.pop();
            self.pending.push_back(Token::Dedent);
        }
        if self.indent_stack.last().copied().unwrap_or(0) != width {
            self.pending.push_back(Token::BadDedent);
        }

        self.pending.pop_front()
    }

    fn finish(&mut self) -> Token {
        self.finished = true;
        if !self.at_line_start {
            self.pending.push_back(Token::Newline);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending.push_back(Token::Dedent);
        }
        self.pending.pop_front().unwrap_or(Token::EOF)
    }

    fn skip_inline_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.input.next();
            } else {
                break;
            }
        }
    }

    /// Skips to the end of the line, leaving the line break in place.
    fn skip_comment(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if ch == '\n' {
                break;
            }
            self.input.next();
        }
    }

    /// Handles two-character operators ending in '=' (e.g. ==, <=, +=).
    fn with_equals(&mut self, combined: Token, single: Token) -> Token {
        if self.input.peek() == Some(&'=') {
            self.input.next();
            combined
        } else {
            single
        }
    }

    /// Handles doubled operators (** and //).
    fn doubled(&mut self, ch: char, combined: Token, single: Token) -> Token {
        if self.input.peek() == Some(&ch) {
            self.input.next();
            combined
        } else {
            single
        }
    }

    fn read_string(&mut self, quote: char) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.input.next() {
            match ch {
                c if c == quote => return Token::String(result),
                '\\' => match self.input.next() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some(other) => result.push(other),
                    None => break,
                },
                '\n' => {
                    // Strings never span lines.
                    self.line += 1;
                    self.at_line_start = true;
                    return Token::Illegal(quote);
                }
                c => result.push(c),
            }
        }
        Token::Illegal(quote)
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut has_dot = first_char == '.';

        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                if ch != '_' {
                    number_str.push(ch);
                }
                self.input.next();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                number_str.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        match number_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Illegal(first_char),
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(&ch) = self.input.peek() {
            if is_letter(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        Token::keyword(&ident).unwrap_or(Token::Identifier(ident))
    }
}

/// Returns true if `ch` can start an identifier.
fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}
