//! Declaration value tokenizer
//!
//! Splits a declaration value into a tree of words, strings, dividers,
//! whitespace, comments and function calls. Serializing the tree with
//! [`stringify`] reproduces the input text, so passes can rewrite single
//! function calls without disturbing the rest of the value.
//!
//! The serialized form doubles as the `tokens` tree of the usage schema.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValueNode {
    Word {
        value: String,
    },
    String {
        value: String,
        quote: char,
    },
    /// `,`, `/` or `:` together with its surrounding whitespace
    Div {
        value: String,
        before: String,
        after: String,
    },
    Space {
        value: String,
    },
    Comment {
        value: String,
    },
    Function {
        value: String,
        before: String,
        after: String,
        nodes: Vec<ValueNode>,
        /// Set on `var()` calls that reference a config key
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
}

impl ValueNode {
    pub fn word(value: impl Into<String>) -> Self {
        ValueNode::Word {
            value: value.into(),
        }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self, ValueNode::Space { .. } | ValueNode::Comment { .. })
    }

    /// Config key this node references, if it is a marked `var()` call.
    pub fn config_key(&self) -> Option<&str> {
        match self {
            ValueNode::Function { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}

pub fn parse(value: &str) -> Vec<ValueNode> {
    let mut tokenizer = Tokenizer {
        input: value.chars().collect(),
        position: 0,
    };
    tokenizer.parse_nodes(false)
}

pub fn stringify(nodes: &[ValueNode]) -> String {
    let mut output = String::new();
    for node in nodes {
        write_node(node, &mut output);
    }
    output
}

fn write_node(node: &ValueNode, output: &mut String) {
    match node {
        ValueNode::Word { value } | ValueNode::Space { value } => output.push_str(value),
        ValueNode::String { value, quote } => {
            output.push(*quote);
            output.push_str(value);
            output.push(*quote);
        }
        ValueNode::Div {
            value,
            before,
            after,
        } => {
            output.push_str(before);
            output.push_str(value);
            output.push_str(after);
        }
        ValueNode::Comment { value } => {
            output.push_str("/*");
            output.push_str(value);
            output.push_str("*/");
        }
        ValueNode::Function {
            value,
            before,
            after,
            nodes,
            ..
        } => {
            output.push_str(value);
            output.push('(');
            output.push_str(before);
            for child in nodes {
                write_node(child, output);
            }
            output.push_str(after);
            output.push(')');
        }
    }
}

/// Visits every node depth first, parents before their children.
pub fn walk_mut<F>(nodes: &mut [ValueNode], visit: &mut F) -> Result<()>
where
    F: FnMut(&mut ValueNode) -> Result<()>,
{
    for node in nodes.iter_mut() {
        visit(node)?;
        if let ValueNode::Function { nodes: children, .. } = node {
            walk_mut(children, visit)?;
        }
    }
    Ok(())
}

/// Rebuilds the tree bottom up, letting `map` replace any node.
pub fn map_nodes<F>(nodes: &[ValueNode], map: &mut F) -> Result<Vec<ValueNode>>
where
    F: FnMut(ValueNode) -> Result<ValueNode>,
{
    let mut mapped = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = match node {
            ValueNode::Function {
                value,
                before,
                after,
                nodes: children,
                key,
            } => ValueNode::Function {
                value: value.clone(),
                before: before.clone(),
                after: after.clone(),
                nodes: map_nodes(children, map)?,
                key: key.clone(),
            },
            other => other.clone(),
        };
        mapped.push(map(node)?);
    }
    Ok(mapped)
}

/// Collects every marked config key in document order.
pub fn config_keys(nodes: &[ValueNode]) -> Vec<&str> {
    let mut keys = Vec::new();
    collect_keys(nodes, &mut keys);
    keys
}

fn collect_keys<'a>(nodes: &'a [ValueNode], keys: &mut Vec<&'a str>) {
    for node in nodes {
        if let Some(key) = node.config_key() {
            keys.push(key);
        }
        if let ValueNode::Function { nodes: children, .. } = node {
            collect_keys(children, keys);
        }
    }
}

struct Tokenizer {
    input: Vec<char>,
    position: usize,
}

impl Tokenizer {
    fn parse_nodes(&mut self, in_function: bool) -> Vec<ValueNode> {
        let mut nodes = Vec::new();

        while let Some(ch) = self.peek() {
            match ch {
                c if c.is_whitespace() => {
                    let value = self.read_while(char::is_whitespace);
                    nodes.push(ValueNode::Space { value });
                }
                '"' | '\'' => nodes.push(self.read_string()),
                '/' if self.peek_at(1) == Some('*') => nodes.push(self.read_comment()),
                ',' | '/' | ':' => {
                    self.position += 1;
                    let before = match nodes.last() {
                        Some(ValueNode::Space { .. }) => match nodes.pop() {
                            Some(ValueNode::Space { value }) => value,
                            _ => String::new(),
                        },
                        _ => String::new(),
                    };
                    let after = self.read_while(char::is_whitespace);
                    nodes.push(ValueNode::Div {
                        value: ch.to_string(),
                        before,
                        after,
                    });
                }
                ')' if in_function => {
                    self.position += 1;
                    return nodes;
                }
                '(' => {
                    self.position += 1;
                    nodes.push(self.read_function(String::new()));
                }
                _ => {
                    let word = self.read_word();
                    if self.peek() == Some('(') {
                        self.position += 1;
                        nodes.push(self.read_function(word));
                    } else {
                        nodes.push(ValueNode::Word { value: word });
                    }
                }
            }
        }
        nodes
    }

    fn read_function(&mut self, name: String) -> ValueNode {
        if name.eq_ignore_ascii_case("url") && !matches!(self.peek_non_space(), Some('"') | Some('\'')) {
            return self.read_url(name);
        }

        let before = self.read_while(char::is_whitespace);
        let mut nodes = self.parse_nodes(true);
        let after = match nodes.last() {
            Some(ValueNode::Space { .. }) => match nodes.pop() {
                Some(ValueNode::Space { value }) => value,
                _ => String::new(),
            },
            _ => String::new(),
        };
        ValueNode::Function {
            value: name,
            before,
            after,
            nodes,
            key: None,
        }
    }

    /// Unquoted `url()` contents are a single word.
    fn read_url(&mut self, name: String) -> ValueNode {
        let before = self.read_while(char::is_whitespace);
        let mut contents = String::new();
        while let Some(ch) = self.peek() {
            self.position += 1;
            if ch == ')' {
                break;
            }
            contents.push(ch);
            if ch == '\\' {
                if let Some(escaped) = self.peek() {
                    contents.push(escaped);
                    self.position += 1;
                }
            }
        }
        let trimmed = contents.trim_end();
        let after = contents[trimmed.len()..].to_string();
        let nodes = if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![ValueNode::word(trimmed)]
        };
        ValueNode::Function {
            value: name,
            before,
            after,
            nodes,
            key: None,
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | ',' | '/' | ':' | '"' | '\'') {
                break;
            }
            if ch == '\\' {
                word.push(ch);
                self.position += 1;
                if let Some(escaped) = self.peek() {
                    word.push(escaped);
                    self.position += 1;
                }
                continue;
            }
            word.push(ch);
            self.position += 1;
        }
        // A lone ')' outside a function is kept as a word.
        if word.is_empty() {
            if let Some(ch) = self.peek() {
                self.position += 1;
                word.push(ch);
            }
        }
        word
    }

    fn read_string(&mut self) -> ValueNode {
        let quote = self.input[self.position];
        self.position += 1;
        let mut value = String::new();
        while let Some(ch) = self.peek() {
            self.position += 1;
            if ch == quote {
                break;
            }
            value.push(ch);
            if ch == '\\' {
                if let Some(escaped) = self.peek() {
                    value.push(escaped);
                    self.position += 1;
                }
            }
        }
        ValueNode::String { value, quote }
    }

    fn read_comment(&mut self) -> ValueNode {
        self.position += 2;
        let mut value = String::new();
        while let Some(ch) = self.peek() {
            if ch == '*' && self.peek_at(1) == Some('/') {
                self.position += 2;
                break;
            }
            value.push(ch);
            self.position += 1;
        }
        ValueNode::Comment { value }
    }

    fn read_while(&mut self, predicate: fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            text.push(ch);
            self.position += 1;
        }
        text
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn peek_non_space(&self) -> Option<char> {
        self.input[self.position..]
            .iter()
            .copied()
            .find(|ch| !ch.is_whitespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_text() {
        let values = [
            "1px solid cfg('border.color')",
            "cfg( bg ) , rgba(0, 0, 0, .5)",
            "12px/1.5 \"Helvetica Neue\", sans-serif",
            "calc(100% - cfg(gutter)) /* note */",
            "url(data:image/png;base64,abc) no-repeat",
            "var(--makeup-button\\.color)",
        ];
        for value in values {
            assert_eq!(stringify(&parse(value)), value, "Failed for '{}'", value);
        }
    }

    #[test]
    fn test_function_structure() {
        let nodes = parse("1px solid cfg( 'border.color' )");
        assert_eq!(nodes.len(), 5);
        match &nodes[4] {
            ValueNode::Function {
                value,
                before,
                after,
                nodes,
                ..
            } => {
                assert_eq!(value, "cfg");
                assert_eq!(before, " ");
                assert_eq!(after, " ");
                assert_eq!(
                    nodes,
                    &vec![ValueNode::String {
                        value: "border.color".to_string(),
                        quote: '\''
                    }]
                );
            }
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_divs_absorb_whitespace() {
        let nodes = parse("a , b");
        assert_eq!(
            nodes,
            vec![
                ValueNode::word("a"),
                ValueNode::Div {
                    value: ",".to_string(),
                    before: " ".to_string(),
                    after: " ".to_string()
                },
                ValueNode::word("b"),
            ]
        );
    }

    #[test]
    fn test_walk_mut_visits_nested_functions() {
        let mut nodes = parse("calc(cfg(a) + cfg(b))");
        let mut names = Vec::new();
        walk_mut(&mut nodes, &mut |node| {
            if let ValueNode::Function { value, .. } = node {
                names.push(value.clone());
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(names, vec!["calc", "cfg", "cfg"]);
    }

    #[test]
    fn test_config_keys_and_serialization() {
        let mut nodes = parse("var(--x) solid");
        if let ValueNode::Function { key, .. } = &mut nodes[0] {
            *key = Some("border.color".to_string());
        }
        assert_eq!(config_keys(&nodes), vec!["border.color"]);

        let json = serde_json::to_value(&nodes).unwrap();
        assert_eq!(json[0]["type"], "function");
        assert_eq!(json[0]["key"], "border.color");
        assert!(json[2].get("key").is_none());

        let back: Vec<ValueNode> = serde_json::from_value(json).unwrap();
        assert_eq!(back, nodes);
    }
}
