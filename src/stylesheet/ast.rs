//! Arena based stylesheet tree
//!
//! Nodes live in a flat vector and refer to their parent by index, so passes
//! can walk up the ancestor chain of any node without owning pointers.
//! Removing a node only detaches it from its parent; the slot stays in the
//! arena so previously collected ids never dangle.

use crate::error::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Syntactic kind of a stylesheet node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Rule {
        selector: String,
    },
    AtRule {
        name: String,
        params: String,
        has_block: bool,
    },
    Declaration {
        property: String,
        value: String,
        important: bool,
    },
    Comment {
        text: String,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct Stylesheet {
    path: String,
    nodes: Vec<Node>,
}

impl Stylesheet {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
                line: 1,
                column: 1,
            }],
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn location(&self, id: NodeId) -> SourceLocation {
        let node = self.node(id);
        SourceLocation::new(self.path.clone(), node.line, node.column)
    }

    /// Appends a new node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind, line: usize, column: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            line,
            column,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Convenience for building generated stylesheets.
    pub fn append_rule(&mut self, parent: NodeId, selector: impl Into<String>) -> NodeId {
        self.append(
            parent,
            NodeKind::Rule {
                selector: selector.into(),
            },
            0,
            0,
        )
    }

    pub fn append_declaration(
        &mut self,
        parent: NodeId,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> NodeId {
        self.append(
            parent,
            NodeKind::Declaration {
                property: property.into(),
                value: value.into(),
                important: false,
            },
            0,
            0,
        )
    }

    /// Detaches a node (and with it its subtree) from the tree.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Replaces the kind of a node in place, keeping its position and
    /// location. Children of the old node are detached.
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
        self.nodes[id.0].kind = kind;
    }

    pub fn set_declaration_value(&mut self, id: NodeId, new_value: String) {
        if let NodeKind::Declaration { value, .. } = &mut self.nodes[id.0].kind {
            *value = new_value;
        }
    }

    pub fn set_at_rule_params(&mut self, id: NodeId, new_params: String) {
        if let NodeKind::AtRule { params, .. } = &mut self.nodes[id.0].kind {
            *params = new_params;
        }
    }

    /// Lazily walks from the parent of `id` up to and including the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            sheet: self,
            next: self.parent(id),
        }
    }

    /// All attached nodes below `id` in document order, not including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    pub fn declarations(&self, scope: NodeId) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| matches!(self.kind(*id), NodeKind::Declaration { .. }))
            .collect()
    }

    pub fn at_rules_named(&self, scope: NodeId, at_rule_name: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| matches!(self.kind(*id), NodeKind::AtRule { name, .. } if name == at_rule_name))
            .collect()
    }

    pub fn is_rule(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Rule { .. })
    }

    /// Individual selectors of a rule, split on top level commas.
    pub fn selectors(&self, id: NodeId) -> Vec<String> {
        match self.kind(id) {
            NodeKind::Rule { selector } => split_selectors(selector),
            _ => Vec::new(),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.is_rule(*id))
            .count()
    }
}

pub struct Ancestors<'a> {
    sheet: &'a Stylesheet,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.sheet.parent(current);
        Some(current)
    }
}

/// Splits a selector list on commas that are not nested in parentheses,
/// brackets or strings.
pub fn split_selectors(selector: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in selector.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                current.push(ch);
            }
            '"' | '\'' if quote.is_none() => {
                quote = Some(ch);
                current.push(ch);
            }
            c if Some(c) == quote => {
                quote = None;
                current.push(ch);
            }
            '(' | '[' if quote.is_none() => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' if quote.is_none() => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if quote.is_none() && depth == 0 => {
                selectors.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        selectors.push(last.to_string());
    }
    selectors
}
