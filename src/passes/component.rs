//! `@component` shorthand expansion
//!
//! ```css
//! @component button;
//!
//! .primary {
//!   @component primary;
//!   background: cfg(bg);
//!   font-size: cfg('/typo.size');
//! }
//! ```
//!
//! becomes
//!
//! ```css
//! .primary {
//!   background: cfg(button.primary.bg);
//!   font-size: cfg('typo.size');
//! }
//! ```

use std::collections::HashMap;

use super::{assert_no_double_colon_at_rule, assert_valid_config_key, key_argument};
use crate::config_key::{is_root_key, namespace_key, resolve_root_key, DEFAULT_CONTEXT_KEY};
use crate::error::{CompilerError, Result, SourceErrorKind};
use crate::stylesheet::{NodeId, NodeKind, Stylesheet};
use crate::value::{self, ValueNode};
use crate::CompilerOptions;

pub struct ComponentExpander<'a> {
    options: &'a CompilerOptions,
    /// Container -> component key, in document order
    associations: Vec<(NodeId, String)>,
}

impl<'a> ComponentExpander<'a> {
    pub fn new(options: &'a CompilerOptions) -> Self {
        Self {
            options,
            associations: Vec::new(),
        }
    }

    pub fn expand(&mut self, sheet: &mut Stylesheet) -> Result<()> {
        assert_no_double_colon_at_rule(sheet, &self.options.component_keyword)?;
        self.collect_associations(sheet)?;

        match self.associations.len() {
            0 => Ok(()),
            1 => {
                let (container, component) = self.associations[0].clone();
                let namespace = resolve_root_key(&component).to_string();
                log::debug!("Expanding single component '{}'", namespace);

                let sites = self.sites(sheet, container);
                let namespaced = sites.into_iter().map(|site| (site, namespace.clone())).collect();
                self.rewrite_sites(sheet, namespaced)
            }
            count => {
                log::debug!("Expanding {} nested components", count);
                let lookup: HashMap<NodeId, &str> = self
                    .associations
                    .iter()
                    .map(|(container, key)| (*container, key.as_str()))
                    .collect();

                // Namespaces are computed up front, before any node changes.
                let namespaced: Vec<(NodeId, String)> = self
                    .sites(sheet, sheet.root())
                    .into_iter()
                    .map(|site| (site, namespace_from_ancestors(sheet, &lookup, site)))
                    .filter(|(site, namespace)| !namespace.is_empty() || self.is_context_site(sheet, *site))
                    .collect();
                self.rewrite_sites(sheet, namespaced)
            }
        }
    }

    /// Records one component key per container and removes the at-rules.
    fn collect_associations(&mut self, sheet: &mut Stylesheet) -> Result<()> {
        let keyword = &self.options.component_keyword;
        let at_rules = sheet.at_rules_named(sheet.root(), keyword);

        for at_rule in &at_rules {
            let key = match sheet.kind(*at_rule) {
                NodeKind::AtRule { params, .. } => params.clone(),
                _ => continue,
            };
            assert_valid_config_key(sheet, *at_rule, &key)?;

            let container = match sheet.parent(*at_rule) {
                Some(container) => container,
                None => continue,
            };
            if self.associations.iter().any(|(existing, _)| *existing == container) {
                return Err(CompilerError::at(
                    sheet.location(*at_rule),
                    SourceErrorKind::DuplicateComponent {
                        keyword: keyword.clone(),
                    },
                ));
            }
            self.associations.push((container, key));
        }

        for at_rule in at_rules {
            sheet.remove(at_rule);
        }
        Ok(())
    }

    /// `cfg()` declarations and `@context` at-rules below `scope`.
    fn sites(&self, sheet: &Stylesheet, scope: NodeId) -> Vec<NodeId> {
        let marker = format!("{}(", self.options.config_keyword);
        sheet
            .descendants(scope)
            .into_iter()
            .filter(|id| match sheet.kind(*id) {
                NodeKind::Declaration { value, .. } => value.contains(&marker),
                NodeKind::AtRule { name, .. } => *name == self.options.context_keyword,
                _ => false,
            })
            .collect()
    }

    fn is_context_site(&self, sheet: &Stylesheet, id: NodeId) -> bool {
        matches!(sheet.kind(id), NodeKind::AtRule { .. })
    }

    fn rewrite_sites(&self, sheet: &mut Stylesheet, sites: Vec<(NodeId, String)>) -> Result<()> {
        for (site, namespace) in sites {
            match sheet.kind(site).clone() {
                NodeKind::Declaration { property, value, .. } => {
                    let rewritten = self.namespace_declaration(sheet, site, &property, &value, &namespace)?;
                    sheet.set_declaration_value(site, rewritten);
                }
                NodeKind::AtRule { params, .. } => {
                    let key = if params.is_empty() {
                        DEFAULT_CONTEXT_KEY
                    } else {
                        params.as_str()
                    };
                    let namespaced = namespace_checked(sheet, site, &namespace, key)?;
                    sheet.set_at_rule_params(site, namespaced);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn namespace_declaration(
        &self,
        sheet: &Stylesheet,
        declaration: NodeId,
        property: &str,
        value: &str,
        namespace: &str,
    ) -> Result<String> {
        let mut nodes = value::parse(value);
        value::walk_mut(&mut nodes, &mut |node| {
            if !matches!(node, ValueNode::Function { value, .. } if *value == self.options.config_keyword) {
                return Ok(());
            }
            let argument = key_argument(sheet, declaration, node)?;
            let key = argument.as_deref().unwrap_or(property);
            let namespaced = namespace_checked(sheet, declaration, namespace, key)?;

            if let ValueNode::Function { nodes, .. } = node {
                let replacement = match nodes.iter().find(|child| !child.is_trivia()) {
                    Some(ValueNode::Word { .. }) => ValueNode::word(namespaced),
                    Some(ValueNode::String { quote, .. }) => ValueNode::String {
                        value: namespaced,
                        quote: *quote,
                    },
                    _ => ValueNode::String {
                        value: namespaced,
                        quote: '\'',
                    },
                };
                *nodes = vec![replacement];
            }
            Ok(())
        })?;
        Ok(value::stringify(&nodes))
    }
}

/// Validates `key`, joins it onto `namespace` and validates the result.
fn namespace_checked(sheet: &Stylesheet, node: NodeId, namespace: &str, key: &str) -> Result<String> {
    assert_valid_config_key(sheet, node, key)?;
    let namespaced = namespace_key(namespace, key);
    assert_valid_config_key(sheet, node, &namespaced)?;
    Ok(namespaced)
}

/// Joins the component keys of all associated ancestors, outermost first.
/// A root component key ends the walk.
fn namespace_from_ancestors(sheet: &Stylesheet, lookup: &HashMap<NodeId, &str>, node: NodeId) -> String {
    let mut fragments = Vec::new();
    for ancestor in sheet.ancestors(node) {
        let Some(key) = lookup.get(&ancestor) else {
            continue;
        };
        if is_root_key(key) {
            fragments.push(resolve_root_key(key));
            break;
        }
        fragments.push(*key);
    }
    fragments.reverse();
    fragments.join(".")
}
