//! Error types for the Makeup compiler and theme resolver

use std::fmt;
use thiserror::Error;

/// Position of a node inside a compiled source file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Grammar, arity and placement violations found in authored CSS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceErrorKind {
    #[error("Invalid config key: '{key}'")]
    InvalidKey { key: String },

    #[error("Do not put the config key in quotes: {key}")]
    QuotedKey { key: String },

    #[error("You can only specify a '@{keyword}' once per container")]
    DuplicateComponent { keyword: String },

    #[error("Use '@{keyword}' without a ':'")]
    DoubleColonAtRule { keyword: String },

    #[error("'@{keyword}' takes no block, end it with ';'")]
    AtRuleBlock { keyword: String },

    #[error("'{function}' accepts a single key, but {count} arguments were provided")]
    ArgumentCount { function: String, count: usize },

    #[error("The first parameter of '{function}' has to be a key, but you provided: {argument}")]
    InvalidArgument { function: String, argument: String },

    #[error("'{function}' must only be used in declarations contained in rules")]
    OutsideRule { function: String },
}

/// Shape violations found while flattening a theme source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThemeErrorKind {
    #[error("Empty nested config objects are not allowed")]
    EmptyObject,

    #[error("Mixing contextual keys and regular keys is not allowed")]
    MixedKeys,

    #[error("Contextual configs must be primitive values")]
    NonPrimitiveContextual,

    #[error("Unsupported value type '{found}'")]
    UnsupportedValue { found: String },

    #[error("Token '{token}' is unknown")]
    UnknownToken { token: String },

    #[error("Contextual keys are not allowed here")]
    ContextNotAllowed,

    #[error("Not a theme source: {reason}")]
    NotAThemeSource { reason: String },

    #[error("Theme source is already set by another file")]
    DuplicateSource,
}

/// Coarse classification of every [`CompilerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Grammar,
    Arity,
    Placement,
    ThemeShape,
    Resolution,
    Syntax,
    Io,
    Format,
}

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file} at line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{location}: {kind}")]
    Source {
        location: SourceLocation,
        kind: SourceErrorKind,
    },

    #[error("'{key}': {kind}")]
    Theme { key: String, kind: ThemeErrorKind },

    #[error("{}", unknown_key_message(.key, .context, .selector))]
    UnknownKey {
        key: String,
        context: Option<String>,
        selector: Option<String>,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

fn unknown_key_message(key: &str, context: &Option<String>, selector: &Option<String>) -> String {
    let mut message = match context {
        Some(context) => format!("Unknown key '{}' in context '{}'", key, context),
        None => format!("Unknown key '{}'", key),
    };
    if let Some(selector) = selector {
        message.push_str(&format!(" (in '{}')", selector));
    }
    message
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn at(location: SourceLocation, kind: SourceErrorKind) -> Self {
        Self::Source { location, kind }
    }

    pub fn theme(key: impl Into<String>, kind: ThemeErrorKind) -> Self {
        Self::Theme {
            key: key.into(),
            kind,
        }
    }

    pub fn unknown_key(key: impl Into<String>, context: Option<&str>) -> Self {
        Self::UnknownKey {
            key: key.into(),
            context: context.map(str::to_string),
            selector: None,
        }
    }

    /// Attaches the selector being generated to a resolution error.
    pub fn in_selector(self, selector: &str) -> Self {
        match self {
            Self::UnknownKey { key, context, .. } => Self::UnknownKey {
                key,
                context,
                selector: Some(selector.to_string()),
            },
            other => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) | Self::FileNotFound { .. } => ErrorCategory::Io,
            Self::Parse { .. } => ErrorCategory::Syntax,
            Self::Source { kind, .. } => match kind {
                SourceErrorKind::InvalidKey { .. }
                | SourceErrorKind::QuotedKey { .. }
                | SourceErrorKind::DuplicateComponent { .. }
                | SourceErrorKind::DoubleColonAtRule { .. }
                | SourceErrorKind::AtRuleBlock { .. } => ErrorCategory::Grammar,
                SourceErrorKind::ArgumentCount { .. } | SourceErrorKind::InvalidArgument { .. } => {
                    ErrorCategory::Arity
                }
                SourceErrorKind::OutsideRule { .. } => ErrorCategory::Placement,
            },
            Self::Theme { .. } => ErrorCategory::ThemeShape,
            Self::UnknownKey { .. } => ErrorCategory::Resolution,
            Self::InvalidFormat { .. } => ErrorCategory::Format,
        }
    }
}

impl From<serde_json::Error> for CompilerError {
    fn from(err: serde_json::Error) -> Self {
        CompilerError::InvalidFormat {
            message: format!("Invalid JSON: {}", err),
        }
    }
}

impl From<serde_yaml::Error> for CompilerError {
    fn from(err: serde_yaml::Error) -> Self {
        CompilerError::InvalidFormat {
            message: format!("Invalid YAML: {}", err),
        }
    }
}

/// Errors raised by the runtime theme resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Unknown theme '{name}', known themes are: {}", .known.join(", "))]
    UnknownTheme { name: String, known: Vec<String> },

    #[error("Failed to load stylesheet '{url}' for theme '{theme}': {message}")]
    StylesheetLoad {
        theme: String,
        url: String,
        message: String,
    },

    #[error("Could not resolve context/key '{key}'{}", .context.as_ref().map(|c| format!(" in context '{}'", c)).unwrap_or_default())]
    Unresolvable { key: String, context: Option<String> },
}
