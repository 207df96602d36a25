//! Compatibility CSS for environments without custom properties
//!
//! Every usage from the schema is resolved against a processed theme and
//! emitted with literal values. Usages whose references all resolve in the
//! contextless table are grouped by selector list into plain rules. All
//! other usages are emitted once per context, scoped below the context's
//! marker class with a descendant combinator:
//!
//! ```css
//! .makeup\/context\/dark .button { color: black; }
//! ```

use crate::config_key::context_class_selector;
use crate::error::{CompilerError, Result};
use crate::schema::SchemaUsage;
use crate::stylesheet::{to_css, Stylesheet};
use crate::theme::{FlattenedTheme, ProcessedTheme};
use crate::value::{self, ValueNode};
use crate::CompilerOptions;

/// Declarations of one generated rule, in first-seen order.
#[derive(Debug, Default)]
struct RuleBlock {
    selector: String,
    declarations: Vec<(String, String)>,
}

impl RuleBlock {
    fn new(selector: String) -> Self {
        Self {
            selector,
            declarations: Vec::new(),
        }
    }

    /// A later declaration of the same property replaces the earlier one.
    fn set(&mut self, property: &str, value: String) {
        match self.declarations.iter_mut().find(|(existing, _)| existing == property) {
            Some((_, existing)) => *existing = value,
            None => self.declarations.push((property.to_string(), value)),
        }
    }
}

pub fn generate_compatibility_css(
    theme: &ProcessedTheme,
    usages: &[SchemaUsage],
    options: &CompilerOptions,
) -> Result<String> {
    let mut contextless: Vec<RuleBlock> = Vec::new();
    let mut contextual: Vec<&SchemaUsage> = Vec::new();

    for usage in usages {
        let keys = usage.keys();
        if keys.iter().all(|key| theme.contextless.contains_key(*key)) {
            let selector = usage.selectors.join(", ");
            let value = resolve_tokens(&usage.tokens, &theme.contextless, None, None)
                .map_err(|err| err.in_selector(&selector))?;
            block_for(&mut contextless, &selector).set(&usage.property, value);
            continue;
        }

        if let Some(missing) = keys.iter().find(|key| !is_known_anywhere(theme, key)) {
            return Err(CompilerError::unknown_key(*missing, None).in_selector(&usage.selectors.join(", ")));
        }
        contextual.push(usage);
    }

    let mut scoped: Vec<RuleBlock> = Vec::new();
    for (context, table) in &theme.contextual {
        let marker = context_class_selector(&options.context_class_name_prefix, context);
        for usage in &contextual {
            for selector in &usage.selectors {
                let value = resolve_tokens(&usage.tokens, table, Some(&theme.contextless), Some(context))
                    .map_err(|err| err.in_selector(selector))?;
                let scoped_selector = format!("{} {}", marker, selector);
                block_for(&mut scoped, &scoped_selector).set(&usage.property, value);
            }
        }
    }

    log::debug!(
        "Generated {} contextless and {} contextual compatibility rules",
        contextless.len(),
        scoped.len()
    );

    let mut sheet = Stylesheet::new("compatibility.css");
    let root = sheet.root();
    for block in contextless.into_iter().chain(scoped) {
        let rule = sheet.append_rule(root, block.selector);
        for (property, value) in block.declarations {
            sheet.append_declaration(rule, property, value);
        }
    }
    Ok(to_css(&sheet))
}

fn block_for<'b>(blocks: &'b mut Vec<RuleBlock>, selector: &str) -> &'b mut RuleBlock {
    let index = match blocks.iter().position(|block| block.selector == selector) {
        Some(index) => index,
        None => {
            blocks.push(RuleBlock::new(selector.to_string()));
            blocks.len() - 1
        }
    };
    &mut blocks[index]
}

fn is_known_anywhere(theme: &ProcessedTheme, key: &str) -> bool {
    theme.contextless.contains_key(key) || theme.contextual.values().any(|table| table.contains_key(key))
}

/// Replaces every marked reference with its literal value and serializes
/// the result. `fallback` is consulted for keys missing from `table`.
fn resolve_tokens(
    tokens: &[ValueNode],
    table: &FlattenedTheme,
    fallback: Option<&FlattenedTheme>,
    context: Option<&str>,
) -> Result<String> {
    let resolved = value::map_nodes(tokens, &mut |node| {
        let Some(key) = node.config_key().map(str::to_string) else {
            return Ok(node);
        };
        let value = table
            .get(&key)
            .or_else(|| fallback.and_then(|fallback| fallback.get(&key)))
            .ok_or_else(|| CompilerError::unknown_key(key.as_str(), context))?;
        Ok(ValueNode::word(value.to_string()))
    })?;
    Ok(value::stringify(&resolved))
}
