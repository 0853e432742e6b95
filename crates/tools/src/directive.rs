//! Tool-Call Directive Parsing
//!
//! The completion service requests a tool by emitting
//! `TOOL: name(key="value", other=3)` somewhere in its output. Only the first
//! directive is considered. Arguments are literals only (strings, numbers,
//! booleans, null, lists, dicts); nothing is evaluated. An argument list
//! that does not parse yields empty arguments rather than no directive,
//! while unbalanced parentheses mean there is no directive at all.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A tool call parsed from model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDirective {
    /// The name of the tool to call
    pub name: String,
    /// Parsed keyword arguments (empty when the list did not parse)
    pub arguments: Map<String, Value>,
    /// The raw directive text, from `TOOL:` to the closing parenthesis
    pub raw: String,
}

fn directive_head() -> Option<&'static Regex> {
    static HEAD: OnceLock<Option<Regex>> = OnceLock::new();
    HEAD.get_or_init(|| Regex::new(r"TOOL:\s*([A-Za-z_][A-Za-z0-9_]*)\(").ok())
        .as_ref()
}

/// Instructions appended to the system message describing the directive
/// syntax.
pub fn build_directive_instructions() -> String {
    [
        "To use a tool, reply with a single line in this exact format:",
        "TOOL: tool_name(arg1=\"val\", arg2=123)",
        "",
        "Rules:",
        "- Arguments are keyword literals: quoted strings, numbers, true/false, null, lists.",
        "- Request at most one tool per reply, then stop and wait for its output.",
        "- Tool results arrive in a message starting with \"Tool output:\".",
        "- When you can answer directly, reply with the answer and no TOOL line.",
    ]
    .join("\n")
}

/// Find and parse the first directive in `text`.
pub fn parse_directive(text: &str) -> Option<ToolDirective> {
    let captures = directive_head()?.captures(text)?;
    let head = captures.get(0)?;
    let name = captures.get(1)?.as_str().to_string();

    let args_start = head.end();
    let close = find_closing_paren(&text[args_start..])? + args_start;
    let inner = &text[args_start..close];

    let arguments = match parse_arguments(inner) {
        Ok(arguments) => arguments,
        Err(err) => {
            tracing::debug!(tool = %name, error = %err, "Unparseable directive arguments; using none");
            Map::new()
        }
    };

    Some(ToolDirective {
        name,
        arguments,
        raw: text[head.start()..=close].to_string(),
    })
}

/// Byte offset of the parenthesis closing an already-open one, skipping
/// anything inside quotes.
fn find_closing_paren(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `key=literal, ...` into a JSON object.
pub(crate) fn parse_arguments(text: &str) -> Result<Map<String, Value>, LiteralError> {
    let mut cursor = Cursor::new(text);
    let mut args = Map::new();

    cursor.skip_ws();
    while !cursor.at_end() {
        let key = cursor.identifier()?;
        cursor.skip_ws();
        cursor.expect('=')?;
        cursor.skip_ws();
        let value = cursor.literal()?;
        if args.insert(key.clone(), value).is_some() {
            return Err(LiteralError(format!("duplicate argument '{key}'")));
        }
        cursor.skip_ws();
        if cursor.at_end() {
            break;
        }
        cursor.expect(',')?;
        cursor.skip_ws();
    }

    Ok(args)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LiteralError(String);

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deepest literal nesting accepted before arguments are rejected.
const MAX_NESTING: usize = 32;

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, what: &str) -> LiteralError {
        LiteralError(format!("{what} at position {}", self.pos))
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error(&format!("expected '{want}'"))),
        }
    }

    fn identifier(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {}
            _ => return Err(self.error("expected identifier")),
        }
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn literal(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            Some('"') | Some('\'') => self.string().map(Value::String),
            Some('[') => self.nested(|c| c.sequence('[', ']').map(Value::Array)),
            Some('(') => self.nested(|c| c.sequence('(', ')').map(Value::Array)),
            Some('{') => self.nested(|c| c.dict().map(Value::Object)),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => match self.identifier()?.as_str() {
                "true" | "True" => Ok(Value::Bool(true)),
                "false" | "False" => Ok(Value::Bool(false)),
                "null" | "None" => Ok(Value::Null),
                other => Err(LiteralError(format!("'{other}' is not a literal"))),
            },
            _ => Err(self.error("expected literal")),
        }
    }

    /// Run a container parser one level deeper, refusing past `MAX_NESTING`.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("literal nested too deeply"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self.peek().map_or(false, |c| {
            c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E' | '_')
        }) {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError(format!("invalid number '{raw}'")))
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Vec<Value>, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.literal()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(items),
                _ => return Err(self.error(&format!("expected ',' or '{close}'"))),
            }
        }
    }

    fn dict(&mut self) -> Result<Map<String, Value>, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(map);
            }
            let key = match self.literal()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(self.error("unsupported dict key")),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.literal()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(map),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}
