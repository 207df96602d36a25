//! Recursive descent parser for CSS stylesheets
//!
//! The parser only recovers the statement structure (rules, at-rules,
//! declarations and comments). Selectors, at-rule params and declaration
//! values are kept as raw text; values are tokenized later on demand by
//! [`crate::value`].

use super::ast::{NodeId, NodeKind, Stylesheet};
use crate::error::{CompilerError, Result};

/// Characters that end an at-rule name.
const AT_RULE_NAME_END: &[char] = &[
    ';', '{', '}', '(', ')', '\'', '"', '\\', '/', '[', ']', '#', ',',
];

pub struct Parser {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    sheet: Stylesheet,
}

/// Parses `source` into a stylesheet tree. `path` is used for error reporting.
pub fn parse(source: &str, path: &str) -> Result<Stylesheet> {
    Parser::new(source, path).parse()
}

impl Parser {
    pub fn new(source: &str, path: &str) -> Self {
        Self {
            input: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            sheet: Stylesheet::new(path),
        }
    }

    pub fn parse(mut self) -> Result<Stylesheet> {
        let root = self.sheet.root();
        self.parse_block_contents(root, true, 1)?;
        Ok(self.sheet)
    }

    fn parse_block_contents(&mut self, parent: NodeId, top_level: bool, open_line: usize) -> Result<()> {
        loop {
            self.skip_whitespace();

            match self.peek() {
                None => {
                    if top_level {
                        return Ok(());
                    }
                    return Err(self.error_at(open_line, "Unclosed block"));
                }
                Some('}') => {
                    if top_level {
                        return Err(self.error("Unexpected '}'"));
                    }
                    self.advance();
                    return Ok(());
                }
                Some(';') => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    let text = self.read_comment()?;
                    self.sheet
                        .append(parent, NodeKind::Comment { text }, line, column);
                }
                Some('@') => self.parse_at_rule(parent)?,
                Some(_) => {
                    if top_level || self.statement_opens_block() {
                        self.parse_rule(parent)?;
                    } else {
                        self.parse_declaration(parent)?;
                    }
                }
            }
        }
    }

    fn parse_rule(&mut self, parent: NodeId) -> Result<()> {
        let (line, column) = (self.line, self.column);
        let selector = self.read_until(&['{', ';', '}']);

        if self.peek() != Some('{') {
            return Err(self.error_at(
                line,
                format!("Expected '{{' after selector '{}'", selector.trim()),
            ));
        }
        self.advance();

        let rule = self.sheet.append(
            parent,
            NodeKind::Rule {
                selector: collapse_whitespace(&selector),
            },
            line,
            column,
        );
        self.parse_block_contents(rule, false, line)
    }

    fn parse_at_rule(&mut self, parent: NodeId) -> Result<()> {
        let (line, column) = (self.line, self.column);
        self.advance(); // consume '@'

        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || AT_RULE_NAME_END.contains(&ch) {
                break;
            }
            name.push(ch);
            self.advance();
        }
        if name.is_empty() {
            return Err(self.error_at(line, "At-rule without name"));
        }

        let params = self.read_until(&['{', ';', '}']).trim().to_string();

        match self.peek() {
            Some('{') => {
                self.advance();
                let at_rule = self.sheet.append(
                    parent,
                    NodeKind::AtRule {
                        name,
                        params,
                        has_block: true,
                    },
                    line,
                    column,
                );
                self.parse_block_contents(at_rule, false, line)
            }
            Some(';') => {
                self.advance();
                self.append_statement_at_rule(parent, name, params, line, column);
                Ok(())
            }
            // The last statement of a block may omit its semicolon.
            _ => {
                self.append_statement_at_rule(parent, name, params, line, column);
                Ok(())
            }
        }
    }

    fn append_statement_at_rule(
        &mut self,
        parent: NodeId,
        name: String,
        params: String,
        line: usize,
        column: usize,
    ) {
        self.sheet.append(
            parent,
            NodeKind::AtRule {
                name,
                params,
                has_block: false,
            },
            line,
            column,
        );
    }

    fn parse_declaration(&mut self, parent: NodeId) -> Result<()> {
        let (line, column) = (self.line, self.column);
        let property = self.read_until(&[':', ';', '{', '}']);

        if self.peek() != Some(':') {
            return Err(self.error_at(
                line,
                format!("Unknown word '{}', expected a declaration", property.trim()),
            ));
        }
        self.advance(); // consume ':'

        let property = property.trim().to_string();
        if property.is_empty() {
            return Err(self.error_at(line, "Declaration without property"));
        }

        let raw_value = self.read_until(&[';', '}']);
        if self.peek() == Some(';') {
            self.advance();
        }

        let (value, important) = split_important(raw_value.trim());
        self.sheet.append(
            parent,
            NodeKind::Declaration {
                property,
                value,
                important,
            },
            line,
            column,
        );
        Ok(())
    }

    /// Looks ahead to decide whether the statement at the cursor is a nested
    /// rule (`{` comes first) or a declaration.
    fn statement_opens_block(&self) -> bool {
        let mut index = self.position;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        while index < self.input.len() {
            let ch = self.input[index];
            if let Some(q) = quote {
                if ch == '\\' {
                    index += 1;
                } else if ch == q {
                    quote = None;
                }
                index += 1;
                continue;
            }
            match ch {
                '\\' => index += 1,
                '"' | '\'' => quote = Some(ch),
                '/' if self.input.get(index + 1) == Some(&'*') => {
                    index += 2;
                    while index + 1 < self.input.len()
                        && !(self.input[index] == '*' && self.input[index + 1] == '/')
                    {
                        index += 1;
                    }
                    index += 1;
                }
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '{' if depth == 0 => return true,
                ';' | '}' if depth == 0 => return false,
                _ => {}
            }
            index += 1;
        }
        false
    }

    /// Reads raw text up to (not including) the first terminator found
    /// outside of strings, comments and parentheses.
    fn read_until(&mut self, terminators: &[char]) -> String {
        let mut text = String::new();
        let mut depth = 0usize;

        while let Some(ch) = self.peek() {
            if depth == 0 && terminators.contains(&ch) {
                break;
            }
            match ch {
                '\\' => {
                    text.push(self.advance());
                    if self.peek().is_some() {
                        text.push(self.advance());
                    }
                }
                '"' | '\'' => self.read_string_into(&mut text),
                '/' if self.peek_at(1) == Some('*') => {
                    text.push(self.advance());
                    text.push(self.advance());
                    while let Some(inner) = self.peek() {
                        if inner == '*' && self.peek_at(1) == Some('/') {
                            text.push(self.advance());
                            text.push(self.advance());
                            break;
                        }
                        text.push(self.advance());
                    }
                }
                '(' | '[' => {
                    depth += 1;
                    text.push(self.advance());
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    text.push(self.advance());
                }
                _ => text.push(self.advance()),
            }
        }
        text
    }

    fn read_string_into(&mut self, text: &mut String) {
        let quote = self.advance();
        text.push(quote);
        while let Some(ch) = self.peek() {
            text.push(self.advance());
            if ch == '\\' {
                if self.peek().is_some() {
                    text.push(self.advance());
                }
            } else if ch == quote || ch == '\n' {
                break;
            }
        }
    }

    fn read_comment(&mut self) -> Result<String> {
        let start_line = self.line;
        self.advance(); // '/'
        self.advance(); // '*'
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error_at(start_line, "Unclosed comment")),
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(text);
                }
                Some(_) => text.push(self.advance()),
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.input[self.position];
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn error(&self, message: impl Into<String>) -> CompilerError {
        self.error_at(self.line, message)
    }

    fn error_at(&self, line: usize, message: impl Into<String>) -> CompilerError {
        CompilerError::parse(self.sheet.path(), line, message)
    }
}

fn split_important(value: &str) -> (String, bool) {
    let lowered = value.to_ascii_lowercase();
    if let Some(stripped) = lowered.strip_suffix("important") {
        let before_bang = stripped.trim_end();
        if let Some(without_bang) = before_bang.strip_suffix('!') {
            let end = without_bang.trim_end().len();
            return (value[..end].to_string(), true);
        }
    }
    (value.to_string(), false)
}

fn collapse_whitespace(selector: &str) -> String {
    selector.split_whitespace().collect::<Vec<_>>().join(" ")
}
