//! Usage records and the usage schema
//!
//! Compiling a stylesheet records a [`Usage`] for every `cfg()` call. The
//! schema form, [`SchemaUsage`], is recovered from compiled CSS and carries
//! the value tree with every config reference marked, which is what the
//! compatibility generator resolves.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config_key::deserialize_key;
use crate::error::{CompilerError, Result, SourceErrorKind};
use crate::stylesheet::{self, NodeKind};
use crate::value::{self, ValueNode};

/// File extension of usage files written next to compiled stylesheets.
pub const USAGE_FILE_EXTENSION: &str = "makeup.json";

/// One `cfg()` occurrence after rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Selectors of the rule containing the declaration, e.g. `[".a", ".b > .a"]`
    pub selectors: Vec<String>,
    pub property: String,
    /// Declaration value before `cfg()` was rewritten
    pub original_value: String,
    /// Fully resolved config key
    pub key: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageFile {
    pub path: String,
    pub usages: Vec<Usage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaUsage {
    pub selectors: Vec<String>,
    pub property: String,
    pub value: String,
    pub tokens: Vec<ValueNode>,
}

impl SchemaUsage {
    pub fn keys(&self) -> Vec<&str> {
        value::config_keys(&self.tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFile {
    pub path: String,
    pub usages: Vec<SchemaUsage>,
}

/// `styles/button.css` -> `styles/button.makeup.json`
pub fn usage_file_path(path: &Path) -> std::path::PathBuf {
    path.with_extension(USAGE_FILE_EXTENSION)
}

/// Re-reads compiled CSS and records every declaration referencing a
/// custom property under `custom_property_prefix`.
pub fn extract_schema(css: &str, path: &str, custom_property_prefix: &str) -> Result<SchemaFile> {
    let sheet = stylesheet::parse(css, path)?;
    let mut usages = Vec::new();

    for declaration in sheet.declarations(sheet.root()) {
        let (property, value) = match sheet.kind(declaration) {
            NodeKind::Declaration { property, value, .. } if value.contains("var(") => (property, value),
            _ => continue,
        };
        let tokens = mark_config_references(value, custom_property_prefix);
        if value::config_keys(&tokens).is_empty() {
            continue;
        }

        let rule = sheet.parent(declaration).filter(|parent| sheet.is_rule(*parent));
        let Some(rule) = rule else {
            return Err(CompilerError::at(
                sheet.location(declaration),
                SourceErrorKind::OutsideRule {
                    function: "var".to_string(),
                },
            ));
        };

        usages.push(SchemaUsage {
            selectors: sheet.selectors(rule),
            property: property.clone(),
            value: value.clone(),
            tokens,
        });
    }

    log::debug!("Extracted {} schema usages from {}", usages.len(), path);
    Ok(SchemaFile {
        path: path.to_string(),
        usages,
    })
}

/// Parses a declaration value, marking `var(--<prefix>key)` calls with `key`.
pub fn mark_config_references(value: &str, custom_property_prefix: &str) -> Vec<ValueNode> {
    let mut nodes = value::parse(value);
    // The visitor never fails.
    let _ = value::walk_mut(&mut nodes, &mut |node| {
        if let ValueNode::Function {
            value: name,
            nodes: arguments,
            key,
            ..
        } = node
        {
            if *name != "var" {
                return Ok(());
            }
            let mut significant = arguments.iter().filter(|argument| !argument.is_trivia());
            if let (Some(ValueNode::Word { value: argument }), None) = (significant.next(), significant.next()) {
                *key = extract_config_key(argument, custom_property_prefix);
            }
        }
        Ok(())
    });
    nodes
}

/// `--makeup-button\.color` -> `button.color` for the prefix `makeup-`.
pub fn extract_config_key(custom_property: &str, custom_property_prefix: &str) -> Option<String> {
    let name = deserialize_key(custom_property)?;
    name.strip_prefix(custom_property_prefix)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPILED: &str = r".button, .link > .button {
  color: var(--makeup-button\.color);
  border: 1px solid var(--makeup-border\.color);
  margin: 0;
}

.other {
  padding: var(--unrelated);
}
";

    #[test]
    fn test_extract_schema() {
        let schema = extract_schema(COMPILED, "button.css", "makeup-").unwrap();
        assert_eq!(schema.path, "button.css");
        assert_eq!(schema.usages.len(), 2);

        let border = &schema.usages[1];
        assert_eq!(border.selectors, vec![".button", ".link > .button"]);
        assert_eq!(border.property, "border");
        assert_eq!(border.value, r"1px solid var(--makeup-border\.color)");
        assert_eq!(border.keys(), vec!["border.color"]);
    }

    #[test]
    fn test_unrelated_variables_are_not_marked() {
        let tokens = mark_config_references("var(--other) var(--makeup-a, red)", "makeup-");
        assert!(value::config_keys(&tokens).is_empty());

        let tokens = mark_config_references("calc(var(--makeup-gap) * 2)", "makeup-");
        assert_eq!(value::config_keys(&tokens), vec!["gap"]);
    }

    #[test]
    fn test_padded_var_calls_are_extracted() {
        let schema = extract_schema(".a { color: var( --makeup-fg ); margin: var(--other); }", "a.css", "makeup-").unwrap();
        assert_eq!(schema.usages.len(), 1);
        assert_eq!(schema.usages[0].property, "color");
        assert_eq!(schema.usages[0].keys(), vec!["fg"]);
    }

    #[test]
    fn test_marked_declaration_outside_rule() {
        let err = extract_schema("@media print { --x: var(--makeup-a); }", "a.css", "makeup-");
        assert!(matches!(
            err,
            Err(CompilerError::Source {
                kind: SourceErrorKind::OutsideRule { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_usage_serialization() {
        let usage = Usage {
            selectors: vec![".a".to_string()],
            property: "border-color".to_string(),
            original_value: "cfg()".to_string(),
            key: "border-color".to_string(),
            path: "a.css".to_string(),
        };
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["originalValue"], "cfg()");
        assert_eq!(json["key"], "border-color");
    }

    #[test]
    fn test_usage_file_path() {
        assert_eq!(
            usage_file_path(Path::new("styles/button.css")),
            Path::new("styles/button.makeup.json")
        );
    }

    #[test]
    fn test_extract_config_key() {
        assert_eq!(
            extract_config_key(r"--makeup-button\.color", "makeup-").as_deref(),
            Some("button.color")
        );
        assert_eq!(extract_config_key("--other", "makeup-"), None);
        assert_eq!(extract_config_key("--makeup-", "makeup-"), None);
    }
}
