//! `@context` composition
//!
//! Every `@context [key];` becomes a `composes` declaration pointing at the
//! global marker class of that context:
//!
//! ```css
//! .button { @context dark; }
//! /* -> */
//! .button { composes: makeup/context/dark from global; }
//! ```

use super::{assert_no_double_colon_at_rule, assert_valid_config_key};
use crate::config_key::{context_class_name, resolve_root_key, DEFAULT_CONTEXT_KEY};
use crate::error::{CompilerError, Result, SourceErrorKind};
use crate::stylesheet::{NodeKind, Stylesheet};
use crate::CompilerOptions;

pub const COMPOSES_PROPERTY: &str = "composes";

pub struct ContextComposer<'a> {
    options: &'a CompilerOptions,
}

impl<'a> ContextComposer<'a> {
    pub fn new(options: &'a CompilerOptions) -> Self {
        Self { options }
    }

    /// Returns the number of replaced at-rules.
    pub fn compose(&self, sheet: &mut Stylesheet) -> Result<usize> {
        let keyword = &self.options.context_keyword;
        assert_no_double_colon_at_rule(sheet, keyword)?;

        let at_rules = sheet.at_rules_named(sheet.root(), keyword);
        for at_rule in &at_rules {
            let params = match sheet.kind(*at_rule) {
                NodeKind::AtRule { has_block: true, .. } => {
                    return Err(CompilerError::at(
                        sheet.location(*at_rule),
                        SourceErrorKind::AtRuleBlock {
                            keyword: keyword.clone(),
                        },
                    ));
                }
                NodeKind::AtRule { params, .. } => params.clone(),
                _ => continue,
            };
            let key = if params.is_empty() {
                DEFAULT_CONTEXT_KEY
            } else {
                params.as_str()
            };
            assert_valid_config_key(sheet, *at_rule, key)?;

            let class_name = context_class_name(
                &self.options.context_class_name_prefix,
                resolve_root_key(key),
            );
            sheet.replace(
                *at_rule,
                NodeKind::Declaration {
                    property: COMPOSES_PROPERTY.to_string(),
                    value: format!("{} from global", class_name),
                    important: false,
                },
            );
        }

        log::debug!("Composed {} context at-rules", at_rules.len());
        Ok(at_rules.len())
    }
}
