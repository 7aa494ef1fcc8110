//! Compile configuration, read from and written to TOML.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    language::Language,
    magic::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, ENV_CONFIG_PATH},
    utils::error::{CoreError, CoreResult},
};

fn default_skip_dirs() -> Vec<String> {
    vec!["test".to_string(), ".git".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    pub program_name: String,
    pub description: String,

    /// Language used for sources that carry no path. `None` means Yak.
    pub language: Option<Language>,
    pub ignore_syntax_errors: bool,
    pub entry_files: Vec<String>,
    pub include_paths: Vec<String>,

    /// Directory names never descended into.
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            program_name: "main".to_string(),
            description: String::new(),
            language: None,
            ignore_syntax_errors: false,
            entry_files: Vec::new(),
            include_paths: Vec::new(),
            skip_dirs: default_skip_dirs(),
        }
    }
}

impl CompileConfig {
    /// Get the default path to the compile configuration file.
    pub fn default_path() -> PathBuf {
        // Check if the environment variable is set
        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            return config_path.into();
        }

        // Fallback to default paths based on OS
        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push(CONFIG_DIR_NAME);
        path.push(CONFIG_FILE_NAME);
        path
    }

    pub fn from_toml_str(toml_str: &str) -> CoreResult<Self> {
        toml::from_str(toml_str).map_err(|e| CoreError::ManifestParseError {
            source: e,
            file: "<string>".to_string(),
        })
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> CoreResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;

        toml::from_str(&toml_str).map_err(|e| CoreError::ManifestParseError {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save_to_toml(&self, path: &Path) -> CoreResult<()> {
        let toml_str = toml::to_string(self).map_err(|e| CoreError::ManifestSerializeError {
            source: e,
            file: path.display().to_string(),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Language for sources that carry no path.
    pub fn default_language(&self) -> Language {
        self.language.unwrap_or_default()
    }

    /// Whether `path` crosses one of the skipped directories.
    pub fn is_skipped_path(&self, path: &str) -> bool {
        Path::new(path).components().any(|component| {
            let component = component.as_os_str().to_string_lossy();
            self.skip_dirs.iter().any(|dir| *dir == component)
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = CompileConfig::from_toml_str("program_name = \"demo\"\nlanguage = \"php\"\n").unwrap();
        assert_eq!(config.program_name, "demo");
        assert_eq!(config.language, Some(Language::Php));
        assert_eq!(config.skip_dirs, vec!["test".to_string(), ".git".to_string()]);
        assert!(!config.ignore_syntax_errors);
    }

    #[test]
    fn unknown_language_is_a_parse_error() {
        let err = CompileConfig::from_toml_str("language = \"cobol\"").unwrap_err();
        assert!(matches!(err, CoreError::ManifestParseError { .. }));
    }

    #[test]
    fn skipped_paths() {
        let config = CompileConfig::default();
        assert!(config.is_skipped_path("src/test/a.yak"));
        assert!(config.is_skipped_path(".git/config"));
        assert!(!config.is_skipped_path("src/testing/a.yak"));
        assert_eq!(config.default_language(), Language::Yak);
    }
}
