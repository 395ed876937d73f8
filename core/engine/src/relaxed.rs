//! FILENAME: core/engine/src/relaxed.rs
//! PURPOSE: Reads the relaxed configuration dialect into a JSON value tree.
//! CONTEXT: The dialect is a superset of JSON meant for hand editing:
//!
//! - keys and scalar values may be left unquoted; an unquoted scalar runs up
//!   to the next `' " , : [ ] { }` or line break and is trimmed at both ends
//! - an unquoted scalar spelling an integer, a decimal number, `true`,
//!   `false` or `null` becomes that value; anything else is a string
//! - strings may use single or double quotes
//! - trailing commas are allowed
//! - `#` starts a comment that runs to the end of the line where a key, a
//!   list item or a `,` is expected; right after a `:` it begins the value,
//!   so `fill_with: #N/A` reads the string `#N/A`
//!
//! Strict JSON is read unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::EngineError;

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?(0|[1-9]\d*)$").unwrap());
static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9]\d*)\.\d+([eE][+-]?\d+)?$").unwrap());

/// Characters that end an unquoted scalar.
fn is_delimiter(c: char) -> bool {
    matches!(c, '\'' | '"' | ',' | ':' | '[' | ']' | '{' | '}' | '\n' | '\r')
}

/// Parses relaxed configuration text.
pub fn parse(text: &str) -> Result<JsonValue, EngineError> {
    let mut reader = Reader {
        chars: text.chars().collect(),
        pos: 0,
        line: 1,
    };
    reader.skip_trivia();
    let value = reader.parse_value()?;
    reader.skip_trivia();
    if let Some(c) = reader.peek() {
        return Err(reader.error(format!("unexpected '{}' after the end of the document", c)));
    }
    Ok(value)
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Reader {
    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::Config(format!("line {}: {}", self.line, message.into()))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Skips whitespace and comments.
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), EngineError> {
        self.skip_whitespace();
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", wanted, c))),
            None => Err(self.error(format!("expected '{}', found end of input", wanted))),
        }
    }

    fn parse_value(&mut self) -> Result<JsonValue, EngineError> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.parse_quoted(quote).map(JsonValue::String)
            }
            Some(_) => {
                let raw = self.read_bare()?;
                Ok(classify(&raw))
            }
            None => Err(self.error("expected a value, found end of input")),
        }
    }

    fn parse_object(&mut self) -> Result<JsonValue, EngineError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(JsonValue::Object(map));
            }
            let key = match self.peek() {
                Some(quote @ ('"' | '\'')) => {
                    self.bump();
                    self.parse_quoted(quote)?
                }
                _ => self.read_bare()?,
            };
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_trivia();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(JsonValue::Object(map)),
                Some(c) => return Err(self.error(format!("expected ',' or '}}', found '{}'", c))),
                None => return Err(self.error("unclosed object")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<JsonValue, EngineError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some(']') {
                self.bump();
                return Ok(JsonValue::Array(items));
            }
            items.push(self.parse_value()?);

            self.skip_trivia();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(JsonValue::Array(items)),
                Some(c) => return Err(self.error(format!("expected ',' or ']', found '{}'", c))),
                None => return Err(self.error("unclosed list")),
            }
        }
    }

    /// Reads a quoted string; the opening quote is already consumed.
    fn parse_quoted(&mut self, quote: char) -> Result<String, EngineError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('b') => out.push('\u{8}'),
                    Some('f') => out.push('\u{c}'),
                    Some('u') => out.push(self.read_unicode_escape()?),
                    Some(other) => out.push(other),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn read_unicode_escape(&mut self) -> Result<char, EngineError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid \\u escape"))?;
            code = code * 16 + digit;
        }
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn read_bare(&mut self) -> Result<String, EngineError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.bump();
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a value, found '{}'", c)),
                None => self.error("expected a value, found end of input"),
            });
        }
        Ok(trimmed.to_string())
    }
}

/// Interprets an unquoted scalar.
fn classify(raw: &str) -> JsonValue {
    match raw {
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        "null" => return JsonValue::Null,
        _ => {}
    }
    if INTEGER_RE.is_match(raw) {
        if let Ok(n) = raw.parse::<i64>() {
            return JsonValue::Number(n.into());
        }
    }
    if INTEGER_RE.is_match(raw) || DECIMAL_RE.is_match(raw) {
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return JsonValue::Number(n);
        }
    }
    JsonValue::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_json_unchanged() {
        let text = r#"{"a": [1, 2.5, "x", true, null], "b": {"c": "d"}}"#;
        let expected: JsonValue = serde_json::from_str(text).unwrap();
        assert_eq!(parse(text).unwrap(), expected);
    }

    #[test]
    fn test_unquoted_keys_and_values() {
        let text = "
            # Demo configuration
            {
                version: 1.0.3,
                sheets: [
                    {
                        name: Staff List,   # spaces survive
                        columns: [
                            { title: Employee No, index_start: 1 },
                            { title: Dept, fill_with: _arg0, },
                        ],
                    },
                ],
            }
        ";
        assert_eq!(
            parse(text).unwrap(),
            json!({
                "version": "1.0.3",
                "sheets": [{
                    "name": "Staff List",
                    "columns": [
                        {"title": "Employee No", "index_start": 1},
                        {"title": "Dept", "fill_with": "_arg0"}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_hash_after_colon_is_a_value() {
        let text = "{fill_with: #N/A, title: #, note: '#1' # trailing
        }";
        assert_eq!(
            parse(text).unwrap(),
            json!({"fill_with": "#N/A", "title": "#", "note": "#1"})
        );
    }

    #[test]
    fn test_commented_out_entries() {
        let text = "{
            columns: [
                # {title: Old, fill_with: 0},
                {title: New, fill_with: 1},
            ],
            # retired: true,
        }";
        assert_eq!(
            parse(text).unwrap(),
            json!({"columns": [{"title": "New", "fill_with": 1}]})
        );
    }

    #[test]
    fn test_scalar_classification() {
        assert_eq!(classify("42"), json!(42));
        assert_eq!(classify("-7"), json!(-7));
        assert_eq!(classify("2.50"), json!(2.5));
        assert_eq!(classify("1e5"), json!("1e5"));
        assert_eq!(classify("007"), json!("007"));
        assert_eq!(classify("1.0.3"), json!("1.0.3"));
        assert_eq!(classify("false"), json!(false));
        assert_eq!(classify("None"), json!("None"));
    }

    #[test]
    fn test_single_quotes_and_escapes() {
        let text = r#"['it\'s', "say \"hi\"", 'tab\there', "é"]"#;
        assert_eq!(
            parse(text).unwrap(),
            json!(["it's", "say \"hi\"", "tab\there", "é"])
        );
    }

    #[test]
    fn test_quoted_script_keeps_brackets() {
        let text = "{script: 'for i in range(l): tgt[i] = dpd[0][i]'}";
        assert_eq!(
            parse(text).unwrap(),
            json!({"script": "for i in range(l): tgt[i] = dpd[0][i]"})
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse("{\n  a: 1\n  b: 2\n}").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{}", err);
        assert!(parse("[1, 2").is_err());
        assert!(parse("{a: 'open}").is_err());
        assert!(parse("[1] [2]").is_err());
    }
}
