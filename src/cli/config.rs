// FILE: src/cli/config.rs

use crate::error::{CompilerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub custom_property_prefix: Option<String>,
    pub context_class_name_prefix: Option<String>,
    pub config_keyword: Option<String>,
    pub component_keyword: Option<String>,
    pub context_keyword: Option<String>,
    pub debug_mode: Option<bool>,
    pub output_directory: Option<String>,
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_and_json() {
        let temp_dir = TempDir::new().unwrap();
        let toml_path = temp_dir.path().join("makeup.toml");
        fs::write(&toml_path, "custom_property_prefix = \"ui-\"\noutput_directory = \"build\"\n").unwrap();
        let config = load(toml_path.to_str().unwrap()).unwrap();
        assert_eq!(config.custom_property_prefix.as_deref(), Some("ui-"));
        assert_eq!(config.output_directory.as_deref(), Some("build"));
        assert!(config.config_keyword.is_none());

        let json_path = temp_dir.path().join("makeup.json");
        fs::write(&json_path, r#"{ "config_keyword": "theme", "debug_mode": true }"#).unwrap();
        let config = load(json_path.to_str().unwrap()).unwrap();
        assert_eq!(config.config_keyword.as_deref(), Some("theme"));
        assert_eq!(config.debug_mode, Some(true));
    }

    #[test]
    fn test_load_rejects_other_formats() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("makeup.ini");
        fs::write(&path, "prefix=ui-").unwrap();
        assert!(matches!(
            load(path.to_str().unwrap()),
            Err(CompilerError::InvalidFormat { .. })
        ));
        assert!(matches!(
            load(temp_dir.path().join("missing.toml").to_str().unwrap()),
            Err(CompilerError::FileNotFound { .. })
        ));
    }
}
