//! Stylesheet transforms for the `cfg()` / `@component` / `@context` syntax
//!
//! The passes run in a fixed order: component expansion namespaces every
//! key, context composition turns `@context` into `composes`, and finally
//! `cfg()` calls become `var()` references while their usages are recorded.

pub mod cfg_to_var;
pub mod component;
pub mod context;

pub use cfg_to_var::CfgToVar;
pub use component::ComponentExpander;
pub use context::ContextComposer;

use crate::config_key::{contains_quotes, is_valid_config_key};
use crate::error::{CompilerError, Result, SourceErrorKind};
use crate::stylesheet::{NodeId, Stylesheet};
use crate::value::{stringify, ValueNode};

/// Rejects the `@keyword:` typo anywhere in the sheet.
pub fn assert_no_double_colon_at_rule(sheet: &Stylesheet, keyword: &str) -> Result<()> {
    let typo = format!("{}:", keyword);
    if let Some(at_rule) = sheet.at_rules_named(sheet.root(), &typo).first() {
        return Err(CompilerError::at(
            sheet.location(*at_rule),
            SourceErrorKind::DoubleColonAtRule {
                keyword: keyword.to_string(),
            },
        ));
    }
    Ok(())
}

/// Accepts resolved and root keys, reporting quoted keys separately.
pub fn assert_valid_config_key(sheet: &Stylesheet, node: NodeId, key: &str) -> Result<()> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    let kind = if contains_quotes(key) {
        SourceErrorKind::QuotedKey {
            key: key.to_string(),
        }
    } else {
        SourceErrorKind::InvalidKey {
            key: key.to_string(),
        }
    };
    Err(CompilerError::at(sheet.location(node), kind))
}

/// Extracts the single key argument of a config function call.
///
/// Returns `None` for an empty call such as `cfg()`; callers fall back to the
/// declaration's property name.
pub fn key_argument(
    sheet: &Stylesheet,
    declaration: NodeId,
    function: &ValueNode,
) -> Result<Option<String>> {
    let (name, nodes) = match function {
        ValueNode::Function { value, nodes, .. } => (value, nodes),
        _ => return Ok(None),
    };

    let arguments: Vec<&ValueNode> = nodes.iter().filter(|node| !node.is_trivia()).collect();
    if arguments.is_empty() {
        return Ok(None);
    }

    let commas = arguments
        .iter()
        .filter(|node| matches!(node, ValueNode::Div { value, .. } if value == ","))
        .count();
    if commas > 0 {
        return Err(CompilerError::at(
            sheet.location(declaration),
            SourceErrorKind::ArgumentCount {
                function: name.clone(),
                count: commas + 1,
            },
        ));
    }

    match arguments.as_slice() {
        [ValueNode::Word { value }] | [ValueNode::String { value, .. }] if !value.is_empty() => {
            Ok(Some(value.clone()))
        }
        _ => Err(CompilerError::at(
            sheet.location(declaration),
            SourceErrorKind::InvalidArgument {
                function: name.clone(),
                argument: stringify(std::slice::from_ref(function)),
            },
        )),
    }
}
