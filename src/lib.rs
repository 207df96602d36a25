//! Makeup themeable CSS compiler
//!
//! Compiles stylesheets that reference theme values through `cfg()` into
//! plain CSS using custom properties, and produces everything needed to
//! theme them: custom-property stylesheets from theme sources, usage
//! schemas, fallback CSS for environments without custom properties, and a
//! runtime resolver for switching themes.
//!
//! # Features
//!
//! - `@component` shorthand namespacing the config keys of a subtree
//! - `@context` composition with global context marker classes
//! - Theme sources in YAML or JSON, merged from directories
//! - Contextual theme values (`$dark: black`) and token interpolation
//! - Usage records written next to every compiled stylesheet
//! - Compatibility CSS with every `var()` resolved against one theme
//!
//! # Basic Usage
//!
//! ```rust
//! use makeup::{compile_source, CompilerOptions, Result};
//!
//! fn main() -> Result<()> {
//!     let compiled = compile_source(
//!         ".button { color: cfg(button.color); }",
//!         "button.css",
//!         &CompilerOptions::default(),
//!     )?;
//!     assert!(compiled.css.contains("var(--makeup-button\\.color)"));
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Parse**: CSS source into an arena AST
//! 2. **Components**: expand `@component` and namespace `cfg()` keys
//! 3. **Contexts**: replace `@context` with `composes` declarations
//! 4. **Config references**: rewrite `cfg()` to `var()` and record usages
//! 5. **Print**: write the AST back to CSS

pub mod error;
pub mod config_key;
pub mod stylesheet;
pub mod value;

pub mod theme;
pub mod passes;
pub mod schema;
pub mod compat;
pub mod runtime;
pub mod cli;

use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

// Re-export commonly used types and functions
pub use error::{CompilerError, ErrorCategory, Result, RuntimeError};
pub use compat::generate_compatibility_css;
pub use passes::{CfgToVar, ComponentExpander, ContextComposer};
pub use schema::{extract_schema, SchemaFile, SchemaUsage, Usage, UsageFile};
pub use theme::{process_theme, theme_to_css, ProcessedTheme, ThemeSource, ThemeValue};
pub use runtime::{Readiness, ResolverOptions, Theme, ThemeChange, ThemeResolver};
pub use cli::Cli;

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compiler build information
pub const BUILD_INFO: CompilerInfo = CompilerInfo {
    version: VERSION,
    name: NAME,
    description: DESCRIPTION,
    supported_features: &["components", "contexts", "tokens", "usages", "compat"],
};

/// Compiler information structure
#[derive(Debug, Clone)]
pub struct CompilerInfo {
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub supported_features: &'static [&'static str],
}

/// Compilation options and settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Prefix of generated custom properties, `--makeup-button\.color`
    pub custom_property_prefix: String,

    /// Prefix of the global context marker classes
    pub context_class_name_prefix: String,

    /// Name of the config reference function
    pub config_keyword: String,

    /// Name of the at-rule namespacing a subtree
    pub component_keyword: String,

    /// Name of the at-rule composing a context
    pub context_keyword: String,

    /// Enable debug mode with extra logging
    pub debug_mode: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            custom_property_prefix: "makeup-".to_string(),
            context_class_name_prefix: "makeup/context/".to_string(),
            config_keyword: "cfg".to_string(),
            component_keyword: "component".to_string(),
            context_keyword: "context".to_string(),
            debug_mode: false,
        }
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Original source size in bytes
    pub source_size: u64,

    /// Compiled CSS size in bytes
    pub output_size: u64,

    /// Number of style rules in the compiled stylesheet
    pub rule_count: usize,

    /// Number of `cfg()` calls rewritten
    pub usage_count: usize,

    /// Number of `@context` rules composed
    pub context_count: usize,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Output of compiling one stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStylesheet {
    pub path: String,
    pub css: String,
    pub usages: Vec<Usage>,
}

impl CompiledStylesheet {
    pub fn usage_file(&self) -> UsageFile {
        UsageFile {
            path: self.path.clone(),
            usages: self.usages.clone(),
        }
    }
}

/// Compiles `input_path` into `output_dir`, writing `<stem>.css` and the
/// `<stem>.makeup.json` usage file.
pub fn compile_file(input_path: &Path, output_dir: &Path, options: &CompilerOptions) -> Result<CompilationStats> {
    let start_time = Instant::now();

    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!("Compiling '{}' into '{}'...", input_path.display(), output_dir.display());
        log::debug!("Compiler options: {:?}", options);
    }

    let source = fs::read_to_string(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path.display(), e),
    })?;

    let (compiled, mut stats) = compile_source_with_stats(&source, &input_path.to_string_lossy(), options)?;

    let stem = input_path.file_stem().ok_or_else(|| CompilerError::InvalidFormat {
        message: format!("'{}' has no file name", input_path.display()),
    })?;
    fs::create_dir_all(output_dir)?;
    let css_path = output_dir.join(format!("{}.css", stem.to_string_lossy()));
    fs::write(&css_path, &compiled.css)?;
    let usage_path = schema::usage_file_path(&css_path);
    fs::write(&usage_path, serde_json::to_string_pretty(&compiled.usage_file())?)?;

    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;

    if options.debug_mode {
        log::info!("Compilation successful!");
        log::info!("Wrote {} and {}", css_path.display(), usage_path.display());
        log::info!("Compile time: {}ms", stats.compile_time_ms);
        log::debug!("Full stats: {:?}", stats);
    }

    Ok(stats)
}

/// Compiles CSS source. `path` is recorded in every usage.
pub fn compile_source(source: &str, path: &str, options: &CompilerOptions) -> Result<CompiledStylesheet> {
    let (compiled, _stats) = compile_source_with_stats(source, path, options)?;
    Ok(compiled)
}

pub fn compile_source_with_stats(
    source: &str,
    path: &str,
    options: &CompilerOptions,
) -> Result<(CompiledStylesheet, CompilationStats)> {
    log::debug!("Parsing {} ({} bytes)", path, source.len());
    let mut sheet = stylesheet::parse(source, path)?;

    log::debug!("Expanding @{} rules", options.component_keyword);
    ComponentExpander::new(options).expand(&mut sheet)?;

    log::debug!("Composing @{} rules", options.context_keyword);
    let context_count = ContextComposer::new(options).compose(&mut sheet)?;

    log::debug!("Rewriting {}() calls", options.config_keyword);
    let usages = CfgToVar::new(options).rewrite(&mut sheet)?;

    let css = stylesheet::to_css(&sheet);
    let stats = CompilationStats {
        source_size: source.len() as u64,
        output_size: css.len() as u64,
        rule_count: sheet.rule_count(),
        usage_count: usages.len(),
        context_count,
        compile_time_ms: 0,
    };
    log::debug!("Compiled {}: {} usages, {} contexts", path, usages.len(), context_count);

    Ok((
        CompiledStylesheet {
            path: path.to_string(),
            css,
            usages,
        },
        stats,
    ))
}

pub fn supports_feature(feature: &str) -> bool {
    BUILD_INFO.supported_features.contains(&feature)
}

pub fn build_info() -> &'static CompilerInfo {
    &BUILD_INFO
}
