//! Theme sources and the theme flattener
//!
//! A theme source is a nested document with a `components` tree and an
//! optional `tokens` tree. Flattening walks `components` depth first and
//! writes every primitive leaf into a table keyed by its dotted path. A node
//! whose children are all `$context` keys is *contextual*: each child value
//! lands in the table of that context instead of the contextless one.
//!
//! String values may reference tokens as `${name}` or `$name`.

pub mod css;
pub mod loader;

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::config_key::{context_name_from_context_key, is_context_key};
use crate::error::{CompilerError, Result, ThemeErrorKind};

pub use css::theme_to_css;
pub use loader::{load_theme, load_theme_dir, load_theme_file};

static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}|\$([^\s]+)").expect("valid token pattern"));

/// A primitive theme value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeValue {
    Text(String),
    Number(serde_yaml::Number),
}

impl fmt::Display for ThemeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeValue::Text(text) => f.write_str(text),
            ThemeValue::Number(number) => write!(f, "{}", number),
        }
    }
}

impl From<&str> for ThemeValue {
    fn from(text: &str) -> Self {
        ThemeValue::Text(text.to_string())
    }
}

impl From<i64> for ThemeValue {
    fn from(number: i64) -> Self {
        ThemeValue::Number(number.into())
    }
}

pub type FlattenedTheme = BTreeMap<String, ThemeValue>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTheme {
    pub contextless: FlattenedTheme,
    pub contextual: BTreeMap<String, FlattenedTheme>,
}

impl ProcessedTheme {
    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.contextual.keys().map(String::as_str)
    }

    /// Looks a key up in the table of `context`, or in the contextless table
    /// when no context is given.
    pub fn get(&self, key: &str, context: Option<&str>) -> Option<&ThemeValue> {
        match context {
            Some(context) => self.contextual.get(context)?.get(key),
            None => self.contextless.get(key),
        }
    }

    pub fn key_count(&self) -> usize {
        self.contextless.len() + self.contextual.values().map(BTreeMap::len).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeSource {
    pub components: Mapping,
    pub tokens: Option<Mapping>,
}

impl ThemeSource {
    /// True for a mapping whose `components` entry is itself a mapping.
    pub fn is_theme_source(value: &Value) -> bool {
        matches!(value.get("components"), Some(Value::Mapping(_)))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut document = match value {
            Value::Mapping(document) => document,
            other => {
                return Err(CompilerError::theme(
                    "",
                    ThemeErrorKind::NotAThemeSource {
                        reason: format!("expected a mapping, found {}", value_type(&other)),
                    },
                ))
            }
        };

        let components = match document.remove("components") {
            Some(Value::Mapping(components)) => components,
            Some(other) => {
                return Err(CompilerError::theme(
                    "components",
                    ThemeErrorKind::NotAThemeSource {
                        reason: format!("expected a mapping, found {}", value_type(&other)),
                    },
                ))
            }
            None => {
                return Err(CompilerError::theme(
                    "components",
                    ThemeErrorKind::NotAThemeSource {
                        reason: "missing 'components'".to_string(),
                    },
                ))
            }
        };

        let tokens = match document.remove("tokens") {
            Some(Value::Mapping(tokens)) => Some(tokens),
            None | Some(Value::Null) => None,
            Some(other) => {
                return Err(CompilerError::theme(
                    "tokens",
                    ThemeErrorKind::NotAThemeSource {
                        reason: format!("expected a mapping, found {}", value_type(&other)),
                    },
                ))
            }
        };

        Ok(Self { components, tokens })
    }

    pub fn from_yaml(source: &str) -> Result<Self> {
        Self::from_value(serde_yaml::from_str(source)?)
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(source)?)
    }
}

/// Flattens a theme source into contextless and contextual key tables.
pub fn process_theme(source: &ThemeSource) -> Result<ProcessedTheme> {
    let tokens = match &source.tokens {
        Some(tokens) => {
            let mut flattened = ProcessedTheme::default();
            Flattener {
                allow_contexts: false,
                tokens: None,
            }
            .flatten(tokens, &mut Vec::new(), &mut flattened)?;
            flattened.contextless
        }
        None => FlattenedTheme::new(),
    };
    log::debug!("Flattened {} theme tokens", tokens.len());

    let mut theme = ProcessedTheme::default();
    Flattener {
        allow_contexts: true,
        tokens: Some(&tokens),
    }
    .flatten(&source.components, &mut Vec::new(), &mut theme)?;

    log::debug!(
        "Flattened theme: {} contextless keys, {} contexts",
        theme.contextless.len(),
        theme.contextual.len()
    );
    Ok(theme)
}

/// Replaces `${name}` and `$name` placeholders with token values.
pub fn interpolate(value: &str, tokens: &FlattenedTheme) -> std::result::Result<String, String> {
    let mut output = String::with_capacity(value.len());
    let mut last = 0;
    for captures in TOKEN_REGEX.captures_iter(value) {
        let whole = captures.get(0).map(|m| (m.start(), m.end())).unwrap_or((last, last));
        let id = token_name(&captures);
        let token = tokens.get(id).ok_or_else(|| id.to_string())?;
        output.push_str(&value[last..whole.0]);
        output.push_str(&token.to_string());
        last = whole.1;
    }
    output.push_str(&value[last..]);
    Ok(output)
}

fn token_name<'t>(captures: &Captures<'t>) -> &'t str {
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

struct Flattener<'a> {
    allow_contexts: bool,
    tokens: Option<&'a FlattenedTheme>,
}

impl<'a> Flattener<'a> {
    fn flatten(&self, node: &Mapping, path: &mut Vec<String>, acc: &mut ProcessedTheme) -> Result<()> {
        for (key, child) in node {
            let key = mapping_key(key, path)?;
            path.push(key);
            let result = self.flatten_entry(child, path, acc);
            path.pop();
            result?;
        }
        Ok(())
    }

    fn flatten_entry(&self, node: &Value, path: &mut Vec<String>, acc: &mut ProcessedTheme) -> Result<()> {
        let nested = match node {
            Value::Mapping(nested) => nested,
            Value::Tagged(tagged) => return self.flatten_entry(&tagged.value, path, acc),
            other => {
                let value = self.primitive(other, path)?;
                acc.contextless.insert(path.join("."), value);
                return Ok(());
            }
        };

        if nested.is_empty() {
            return Err(CompilerError::theme(path.join("."), ThemeErrorKind::EmptyObject));
        }

        let contexts = nested
            .keys()
            .filter(|key| matches!(key, Value::String(key) if is_context_key(key)))
            .count();
        if contexts == 0 {
            return self.flatten(nested, path, acc);
        }
        if contexts != nested.len() {
            return Err(CompilerError::theme(path.join("."), ThemeErrorKind::MixedKeys));
        }
        if !self.allow_contexts {
            return Err(CompilerError::theme(
                path.join("."),
                ThemeErrorKind::ContextNotAllowed,
            ));
        }

        let joined = path.join(".");
        for (context_key, value) in nested {
            let context_key = context_key.as_str().unwrap_or_default();
            if matches!(value, Value::Mapping(_) | Value::Sequence(_)) {
                return Err(CompilerError::theme(
                    joined,
                    ThemeErrorKind::NonPrimitiveContextual,
                ));
            }
            let value = self.primitive(value, path)?;
            acc.contextual
                .entry(context_name_from_context_key(context_key).to_string())
                .or_default()
                .insert(joined.clone(), value);
        }
        Ok(())
    }

    fn primitive(&self, value: &Value, path: &[String]) -> Result<ThemeValue> {
        let value = match value {
            Value::String(text) => ThemeValue::Text(text.clone()),
            Value::Number(number) => ThemeValue::Number(number.clone()),
            Value::Tagged(tagged) => return self.primitive(&tagged.value, path),
            other => {
                return Err(CompilerError::theme(
                    path.join("."),
                    ThemeErrorKind::UnsupportedValue {
                        found: value_type(other).to_string(),
                    },
                ))
            }
        };

        match (value, self.tokens) {
            (ThemeValue::Text(text), Some(tokens)) => interpolate(&text, tokens)
                .map(ThemeValue::Text)
                .map_err(|token| {
                    CompilerError::theme(path.join("."), ThemeErrorKind::UnknownToken { token })
                }),
            (value, _) => Ok(value),
        }
    }
}

fn mapping_key(key: &Value, path: &[String]) -> Result<String> {
    match key {
        Value::String(key) => Ok(key.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(CompilerError::theme(
            path.join("."),
            ThemeErrorKind::UnsupportedValue {
                found: format!("{} key", value_type(other)),
            },
        )),
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(yaml: &str) -> Result<ProcessedTheme> {
        process_theme(&ThemeSource::from_yaml(yaml)?)
    }

    fn theme_error(result: Result<ProcessedTheme>) -> (String, ThemeErrorKind) {
        match result {
            Err(CompilerError::Theme { key, kind }) => (key, kind),
            other => panic!("Expected theme error, got {:?}", other),
        }
    }

    #[test]
    fn test_contextual_node_splits_into_contexts() {
        let theme = process(
            r#"
components:
  button:
    color:
      $light: white
      $dark: black
"#,
        )
        .unwrap();

        assert!(theme.contextless.is_empty());
        assert_eq!(theme.get("button.color", Some("light")), Some(&"white".into()));
        assert_eq!(theme.get("button.color", Some("dark")), Some(&"black".into()));
        assert_eq!(theme.contexts().collect::<Vec<_>>(), vec!["dark", "light"]);
    }

    #[test]
    fn test_nested_primitives_are_contextless() {
        let theme = process(
            r#"
components:
  button:
    padding: 4px
    border:
      width: 1
  typo:
    size: 14px
"#,
        )
        .unwrap();

        assert_eq!(theme.contextless.len(), 3);
        assert_eq!(theme.get("button.padding", None), Some(&"4px".into()));
        assert_eq!(theme.get("button.border.width", None), Some(&ThemeValue::from(1i64)));
        assert_eq!(theme.get("typo.size", None), Some(&"14px".into()));
        assert!(theme.contextual.is_empty());
    }

    #[test]
    fn test_mixed_keys_are_rejected() {
        let (key, kind) = theme_error(process(
            "components:\n  button:\n    color:\n      $light: 1\n      other: 2\n",
        ));
        assert_eq!(key, "button.color");
        assert_eq!(kind, ThemeErrorKind::MixedKeys);
    }

    #[test]
    fn test_empty_object_is_rejected() {
        let (key, kind) = theme_error(process("components:\n  button: {}\n"));
        assert_eq!(key, "button");
        assert_eq!(kind, ThemeErrorKind::EmptyObject);
    }

    #[test]
    fn test_contextual_values_must_be_primitive() {
        let (key, kind) = theme_error(process(
            "components:\n  color:\n    $light:\n      nested: 1\n",
        ));
        assert_eq!(key, "color");
        assert_eq!(kind, ThemeErrorKind::NonPrimitiveContextual);
    }

    #[test]
    fn test_unsupported_values() {
        let (key, kind) = theme_error(process("components:\n  flag: true\n"));
        assert_eq!(key, "flag");
        assert_eq!(
            kind,
            ThemeErrorKind::UnsupportedValue {
                found: "boolean".to_string()
            }
        );

        let (_, kind) = theme_error(process("components:\n  list: [1, 2]\n"));
        assert_eq!(
            kind,
            ThemeErrorKind::UnsupportedValue {
                found: "sequence".to_string()
            }
        );
    }

    #[test]
    fn test_token_interpolation() {
        let theme = process(
            r##"
tokens:
  brand:
    blue: "#0af"
  space: 4
components:
  button:
    border: 1px solid ${brand.blue}
    padding: $space
    color:
      $light: ${brand.blue}
      $dark: black
"##,
        )
        .unwrap();

        assert_eq!(
            theme.get("button.border", None),
            Some(&"1px solid #0af".into())
        );
        assert_eq!(theme.get("button.padding", None), Some(&"4".into()));
        assert_eq!(theme.get("button.color", Some("light")), Some(&"#0af".into()));
    }

    #[test]
    fn test_unknown_token() {
        let (key, kind) = theme_error(process(
            "tokens:\n  a: 1\ncomponents:\n  button:\n    size: ${missing}\n",
        ));
        assert_eq!(key, "button.size");
        assert_eq!(
            kind,
            ThemeErrorKind::UnknownToken {
                token: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_tokens_cannot_be_contextual() {
        let (key, kind) = theme_error(process(
            "tokens:\n  color:\n    $light: white\ncomponents:\n  a: 1\n",
        ));
        assert_eq!(key, "color");
        assert_eq!(kind, ThemeErrorKind::ContextNotAllowed);
    }

    #[test]
    fn test_flattening_is_deterministic() {
        let source = ThemeSource::from_yaml(
            "components:\n  z: 1\n  a:\n    $dark: 2\n    $light: 3\n  m: x\n",
        )
        .unwrap();
        let first = process_theme(&source).unwrap();
        let second = process_theme(&source).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_from_json_and_shape_checks() {
        let theme = process_theme(
            &ThemeSource::from_json(r#"{"components": {"a": {"b": "c"}}}"#).unwrap(),
        )
        .unwrap();
        assert_eq!(theme.get("a.b", None), Some(&"c".into()));

        assert!(ThemeSource::is_theme_source(
            &serde_yaml::from_str("components: {a: 1}").unwrap()
        ));
        assert!(!ThemeSource::is_theme_source(
            &serde_yaml::from_str("components: 1").unwrap()
        ));
        let (_, kind) = theme_error(ThemeSource::from_yaml("tokens: {}\n").map(|_| ProcessedTheme::default()));
        assert!(matches!(kind, ThemeErrorKind::NotAThemeSource { .. }));
    }

    #[test]
    fn test_processed_theme_serialization() {
        let theme = process(
            "components:\n  size: 2\n  color:\n    $dark: black\n",
        )
        .unwrap();
        let json = serde_json::to_value(&theme).unwrap();
        assert_eq!(json["contextless"]["size"], 2);
        assert_eq!(json["contextual"]["dark"]["color"], "black");

        let back: ProcessedTheme = serde_json::from_value(json).unwrap();
        assert_eq!(back, theme);
    }
}
