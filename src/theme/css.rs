//! Renders a processed theme as custom property declarations

use super::{FlattenedTheme, ProcessedTheme};
use crate::config_key::{context_class_selector, serialize_key};
use crate::stylesheet::{to_css, NodeId, Stylesheet};

/// Contextless keys are declared on `:root`, every context gets a rule on
/// its marker class.
pub fn theme_to_css(
    theme: &ProcessedTheme,
    custom_property_prefix: &str,
    context_class_name_prefix: &str,
) -> String {
    let mut sheet = Stylesheet::new("theme.css");
    let root = sheet.root();

    let rule = sheet.append_rule(root, ":root");
    append_declarations(&mut sheet, rule, &theme.contextless, custom_property_prefix);

    for (context, table) in &theme.contextual {
        let rule = sheet.append_rule(root, context_class_selector(context_class_name_prefix, context));
        append_declarations(&mut sheet, rule, table, custom_property_prefix);
    }

    to_css(&sheet)
}

fn append_declarations(
    sheet: &mut Stylesheet,
    rule: NodeId,
    table: &FlattenedTheme,
    custom_property_prefix: &str,
) {
    for (key, value) in table {
        sheet.append_declaration(rule, serialize_key(key, custom_property_prefix), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{process_theme, ThemeSource};

    #[test]
    fn test_theme_to_css() {
        let source = ThemeSource::from_yaml(
            r#"
components:
  button:
    padding: 4px
    color:
      $light: white
      $dark: black
"#,
        )
        .unwrap();
        let theme = process_theme(&source).unwrap();
        let css = theme_to_css(&theme, "makeup-", "makeup/context/");

        assert_eq!(
            css,
            ":root {\n  --makeup-button\\.padding: 4px;\n}\n\n\
             .makeup\\/context\\/dark {\n  --makeup-button\\.color: black;\n}\n\n\
             .makeup\\/context\\/light {\n  --makeup-button\\.color: white;\n}\n"
        );
    }

    #[test]
    fn test_empty_theme_still_declares_root() {
        let css = theme_to_css(&ProcessedTheme::default(), "p-", "c/");
        assert_eq!(css, ":root {\n}\n");
    }
}
