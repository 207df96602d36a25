//! Rewrites `cfg(key)` calls into native custom property references
//!
//! `border: 1px solid cfg('button.border')` becomes
//! `border: 1px solid var(--makeup-button\.border)` and a [`Usage`] is
//! recorded for the call.

use super::{assert_valid_config_key, key_argument};
use crate::config_key::{resolve_root_key, serialize_key};
use crate::error::{CompilerError, Result, SourceErrorKind};
use crate::schema::Usage;
use crate::stylesheet::{NodeId, NodeKind, Stylesheet};
use crate::value::{self, ValueNode};
use crate::CompilerOptions;

const VAR_FUNCTION: &str = "var";

pub struct CfgToVar<'a> {
    options: &'a CompilerOptions,
}

impl<'a> CfgToVar<'a> {
    pub fn new(options: &'a CompilerOptions) -> Self {
        Self { options }
    }

    /// Rewrites every config call in `sheet`, returning the recorded usages in
    /// document order.
    pub fn rewrite(&self, sheet: &mut Stylesheet) -> Result<Vec<Usage>> {
        let marker = format!("{}(", self.options.config_keyword);
        let mut usages = Vec::new();

        for declaration in sheet.declarations(sheet.root()) {
            let (property, original_value) = match sheet.kind(declaration) {
                NodeKind::Declaration { property, value, .. } if value.contains(&marker) => {
                    (property.clone(), value.clone())
                }
                _ => continue,
            };

            let rule = match sheet.parent(declaration) {
                Some(parent) if sheet.is_rule(parent) => parent,
                _ => {
                    return Err(CompilerError::at(
                        sheet.location(declaration),
                        SourceErrorKind::OutsideRule {
                            function: self.options.config_keyword.clone(),
                        },
                    ))
                }
            };

            let (rewritten, keys) = self.rewrite_value(sheet, declaration, &property, &original_value)?;
            let selectors = sheet.selectors(rule);
            for key in keys {
                usages.push(Usage {
                    selectors: selectors.clone(),
                    property: property.clone(),
                    original_value: original_value.clone(),
                    key,
                    path: sheet.path().to_string(),
                });
            }
            sheet.set_declaration_value(declaration, rewritten);
        }

        log::debug!("Rewrote {} config references in {}", usages.len(), sheet.path());
        Ok(usages)
    }

    fn rewrite_value(
        &self,
        sheet: &Stylesheet,
        declaration: NodeId,
        property: &str,
        value: &str,
    ) -> Result<(String, Vec<String>)> {
        let mut keys = Vec::new();
        let mut nodes = value::parse(value);

        value::walk_mut(&mut nodes, &mut |node| {
            if !matches!(node, ValueNode::Function { value, .. } if *value == self.options.config_keyword) {
                return Ok(());
            }
            let argument = key_argument(sheet, declaration, node)?;
            let key = argument.as_deref().unwrap_or(property);
            assert_valid_config_key(sheet, declaration, key)?;
            let key = resolve_root_key(key).to_string();

            if let ValueNode::Function {
                value,
                before,
                after,
                nodes,
                ..
            } = node
            {
                *value = VAR_FUNCTION.to_string();
                before.clear();
                after.clear();
                *nodes = vec![ValueNode::word(serialize_key(
                    &key,
                    &self.options.custom_property_prefix,
                ))];
            }
            keys.push(key);
            Ok(())
        })?;

        Ok((value::stringify(&nodes), keys))
    }
}
