//! Reads compiled theme stylesheets back into key tables

use std::collections::BTreeMap;

use crate::config_key::unescape_identifier;
use crate::error::Result;
use crate::stylesheet::{self, NodeKind};

use super::ResolverOptions;

pub type PropertyTable = BTreeMap<String, String>;

/// Custom properties declared on `:root` and on single class selectors,
/// keyed by unescaped property and class names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomProperties {
    pub root: PropertyTable,
    pub classes: BTreeMap<String, PropertyTable>,
}

/// Contextless and per-context values with the prefix stripped from keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeTables {
    pub contextless: PropertyTable,
    pub contextual: BTreeMap<String, PropertyTable>,
}

pub fn read_custom_properties(css: &str, path: &str) -> Result<CustomProperties> {
    let sheet = stylesheet::parse(css, path)?;
    let mut properties = CustomProperties::default();

    for rule in sheet.children(sheet.root()) {
        if !sheet.is_rule(*rule) {
            continue;
        }
        let declared: Vec<(String, String)> = sheet
            .children(*rule)
            .iter()
            .filter_map(|child| match sheet.kind(*child) {
                NodeKind::Declaration { property, value, .. } if property.starts_with("--") => {
                    let name = unescape_identifier(property)?;
                    Some((name, value.trim().to_string()))
                }
                _ => None,
            })
            .collect();

        for selector in sheet.selectors(*rule) {
            let table = if selector == ":root" {
                &mut properties.root
            } else if let Some(class_name) = selector.strip_prefix('.').and_then(unescape_identifier) {
                properties.classes.entry(class_name).or_default()
            } else {
                continue;
            };
            table.extend(declared.iter().cloned());
        }
    }
    Ok(properties)
}

/// Parses a compiled theme stylesheet into contextless and contextual tables.
pub fn read_theme_stylesheet(css: &str, options: &ResolverOptions) -> Result<ThemeTables> {
    let properties = read_custom_properties(css, "theme.css")?;
    let property_prefix = format!("--{}", options.custom_property_prefix);
    let strip = |table: PropertyTable| -> PropertyTable {
        table
            .into_iter()
            .filter_map(|(name, value)| Some((name.strip_prefix(&property_prefix)?.to_string(), value)))
            .collect()
    };

    let mut tables = ThemeTables {
        contextless: strip(properties.root),
        contextual: BTreeMap::new(),
    };
    for (class_name, table) in properties.classes {
        if let Some(context) = class_name.strip_prefix(&options.context_class_name_prefix) {
            tables.contextual.insert(context.to_string(), strip(table));
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{process_theme, theme_to_css, ThemeSource};

    #[test]
    fn test_read_generated_theme() {
        let source = ThemeSource::from_yaml(
            "components:\n  gap: 4px\n  button:\n    color:\n      $light: white\n      $dark: black\n",
        )
        .unwrap();
        let css = theme_to_css(&process_theme(&source).unwrap(), "makeup-", "makeup/context/");

        let tables = read_theme_stylesheet(&css, &ResolverOptions::default()).unwrap();
        assert_eq!(tables.contextless.get("gap").map(String::as_str), Some("4px"));
        assert_eq!(
            tables.contextual["dark"].get("button.color").map(String::as_str),
            Some("black")
        );
        assert_eq!(tables.contextual.len(), 2);
    }

    #[test]
    fn test_unrelated_rules_are_ignored() {
        let css = ":root { --makeup-a: 1; color: red; --other: 2; }\n.button:hover { --makeup-b: 3; }\n.plain { --makeup-c: 4; }";
        let properties = read_custom_properties(css, "x.css").unwrap();
        assert_eq!(properties.root.len(), 2);
        assert!(properties.classes.contains_key("plain"));
        assert!(!properties.classes.keys().any(|name| name.contains("hover")));

        let tables = read_theme_stylesheet(css, &ResolverOptions::default()).unwrap();
        assert_eq!(tables.contextless.len(), 1);
        assert!(tables.contextual.is_empty());
    }
}
