//! Loading theme sources from disk
//!
//! A theme is either a single YAML/JSON file or a directory of them. In a
//! directory every file contributes the document at the key path given by its
//! relative path, so `components/button.yaml` becomes `components.button`.

use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use super::ThemeSource;
use crate::error::{CompilerError, Result, ThemeErrorKind};

const THEME_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];
const IGNORED_FILES: &[&str] = &["package.json"];

/// Loads a theme from a file or a directory.
pub fn load_theme(path: &Path) -> Result<ThemeSource> {
    if path.is_dir() {
        load_theme_dir(path)
    } else {
        ThemeSource::from_value(load_theme_file(path)?)
    }
}

/// Reads one YAML or JSON document, picking the format by extension.
pub fn load_theme_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|_| CompilerError::FileNotFound {
        path: path.display().to_string(),
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        _ => Err(CompilerError::InvalidFormat {
            message: format!(
                "Theme file '{}' must be .yaml, .yml or .json",
                path.display()
            ),
        }),
    }
}

/// Merges every theme file below `dir` into one theme source.
pub fn load_theme_dir(dir: &Path) -> Result<ThemeSource> {
    let merged = merge_theme_dir(dir)?;
    ThemeSource::from_value(merged)
}

pub fn merge_theme_dir(dir: &Path) -> Result<Value> {
    let mut merged = Mapping::new();
    let mut file_count = 0;

    // Files before directories, so a file is always seen before paths below it.
    let walker = WalkDir::new(dir).sort_by(|a, b| {
        a.file_type()
            .is_dir()
            .cmp(&b.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    });
    for entry in walker {
        let entry = entry.map_err(|e| {
            CompilerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        if !entry.file_type().is_file() || !is_theme_file(entry.path()) {
            continue;
        }

        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let key_path: Vec<String> = relative
            .with_extension("")
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();

        log::debug!("Merging theme file {} at '{}'", relative.display(), key_path.join("."));
        let document = load_theme_file(entry.path())?;
        deep_set(&mut merged, &key_path, document)?;
        file_count += 1;
    }

    log::info!("Loaded {} theme files from {}", file_count, dir.display());
    Ok(Value::Mapping(merged))
}

fn is_theme_file(path: &Path) -> bool {
    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    if IGNORED_FILES.contains(&file_name) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| THEME_EXTENSIONS.contains(&ext))
}

/// Places `value` at `key_path` inside `merged`, creating intermediate
/// mappings as needed.
fn deep_set(merged: &mut Mapping, key_path: &[String], value: Value) -> Result<()> {
    let (leaf, parents) = match key_path.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };

    let mut needle = merged;
    for (depth, segment) in parents.iter().enumerate() {
        let entry = needle
            .entry(Value::String(segment.clone()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        needle = match entry {
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(CompilerError::theme(
                    parents[..=depth].join("."),
                    ThemeErrorKind::DuplicateSource,
                ))
            }
        };
    }

    let leaf_key = Value::String(leaf.clone());
    if needle.contains_key(&leaf_key) {
        return Err(CompilerError::theme(
            key_path.join("."),
            ThemeErrorKind::DuplicateSource,
        ));
    }
    needle.insert(leaf_key, value);
    Ok(())
}
