//! Config key validation, namespacing and CSS escaping
//!
//! A config key is a dot separated path such as `button.primary.background`.
//! Keys prefixed with `/` are *root keys*: they are never namespaced by an
//! enclosing `@component` and are used verbatim once the slash is removed.
//!
//! Keys end up inside CSS identifiers (custom property names and context
//! marker classes), so every character outside `[\w-]` is escaped on the way
//! out and unescaped again when compiled CSS is read back.

use cssparser::{serialize_identifier, serialize_name, Parser, ParserInput};
use once_cell::sync::Lazy;
use regex::Regex;

static CONFIG_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid config key pattern"));
static ROOT_CONFIG_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[A-Za-z0-9_.\-]+$").expect("valid root key pattern"));

/// Default key used by `@context` without parameters.
pub const DEFAULT_CONTEXT_KEY: &str = "context";

/// Checks the resolved grammar `[\w-.]+`.
pub fn is_valid_key(key: &str) -> bool {
    CONFIG_KEY_REGEX.is_match(key)
}

/// Checks the root grammar `/[\w-.]+`.
pub fn is_root_key(key: &str) -> bool {
    ROOT_CONFIG_KEY_REGEX.is_match(key)
}

/// A key is acceptable in authored CSS if it is either resolved or rooted.
pub fn is_valid_config_key(key: &str) -> bool {
    is_valid_key(key) || is_root_key(key)
}

pub fn contains_quotes(key: &str) -> bool {
    key.contains('"') || key.contains('\'') || key.contains('`')
}

/// Strips the leading `/` of a root key. Other keys are returned unchanged.
pub fn resolve_root_key(key: &str) -> &str {
    key.strip_prefix('/').unwrap_or(key)
}

/// Joins a key onto a component namespace.
///
/// Root keys ignore the namespace, and an empty namespace leaves the key as is.
pub fn namespace_key(namespace: &str, key: &str) -> String {
    if is_root_key(key) {
        return resolve_root_key(key).to_string();
    }
    if namespace.is_empty() {
        return key.to_string();
    }
    format!("{}.{}", namespace, key)
}

/// Context keys in theme sources start with `$`, e.g. `$dark`.
pub fn is_context_key(key: &str) -> bool {
    key.starts_with('$')
}

pub fn context_name_from_context_key(key: &str) -> &str {
    key.strip_prefix('$').unwrap_or(key)
}

/// Serializes `prefix + key` into an escaped custom property name.
///
/// ```
/// use makeup::config_key::serialize_key;
///
/// assert_eq!(serialize_key("button.color", "makeup-"), r"--makeup-button\.color");
/// ```
pub fn serialize_key(key: &str, prefix: &str) -> String {
    let mut serialized = String::from("--");
    // Writing into a String cannot fail.
    let _ = serialize_name(&format!("{}{}", prefix, key), &mut serialized);
    serialized
}

/// Inverse of [`serialize_key`]: returns `prefix + key` for an escaped
/// custom property name, or `None` if `name` is not a custom property.
pub fn deserialize_key(name: &str) -> Option<String> {
    let unescaped = unescape_identifier(name)?;
    unescaped.strip_prefix("--").map(str::to_string)
}

/// Decodes CSS escapes in a single identifier, e.g. `a\.b` becomes `a.b`.
pub fn unescape_identifier(escaped: &str) -> Option<String> {
    let mut input = ParserInput::new(escaped);
    let mut parser = Parser::new(&mut input);
    let ident = parser.expect_ident().ok()?.to_string();
    parser.expect_exhausted().ok()?;
    Some(ident)
}

/// The unescaped class name marking a context, e.g. `makeup/context/dark`.
pub fn context_class_name(class_name_prefix: &str, context: &str) -> String {
    format!("{}{}", class_name_prefix, context)
}

/// A class selector for a context marker class, e.g. `.makeup\/context\/dark`.
pub fn context_class_selector(class_name_prefix: &str, context: &str) -> String {
    let mut selector = String::from(".");
    let _ = serialize_identifier(
        &context_class_name(class_name_prefix, context),
        &mut selector,
    );
    selector
}

/// Reverses [`context_class_selector`], returning the context name.
pub fn context_from_class_selector(class_name_prefix: &str, selector: &str) -> Option<String> {
    let class_name = unescape_identifier(selector.trim().strip_prefix('.')?)?;
    class_name
        .strip_prefix(class_name_prefix)
        .map(str::to_string)
}
