//! Parser configuration
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! root_label = "root"
//! non_projective_label = "nonproj"
//! punctuation = [",", ".", ":"]
//! trace = false
//! ```

use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0} must not be empty")]
    EmptyLabel(&'static str),
}

/// Labels and lexical resources shared by the parser and its post-passes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Label given to tokens attached to the root by the repair pass
    pub root_label: String,
    /// Label given to arcs lifted by the projectivizer
    pub non_projective_label: String,
    /// Forms treated as punctuation by the nearest-punctuation features
    pub punctuation: Vec<String>,
    /// Log every transition at trace level
    pub trace: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            root_label: "root".to_string(),
            non_projective_label: "nonproj".to_string(),
            punctuation: [",", ".", ":", ";", "?", "!", "``", "''", "-LRB-", "-RRB-", "--"]
                .into_iter()
                .map(String::from)
                .collect(),
            trace: false,
        }
    }
}

impl ParserConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_label.is_empty() {
            return Err(ConfigError::EmptyLabel("root_label"));
        }
        if self.non_projective_label.is_empty() {
            return Err(ConfigError::EmptyLabel("non_projective_label"));
        }
        Ok(())
    }

    pub(crate) fn punctuation_set(&self) -> FxHashSet<String> {
        self.punctuation.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config = ParserConfig::from_toml_str("").unwrap();
        assert_eq!(config, ParserConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = ParserConfig::from_toml_str(
            r#"
            non_projective_label = "np"
            punctuation = [".", ","]
            trace = true
            "#,
        )
        .unwrap();

        assert_eq!(config.root_label, "root");
        assert_eq!(config.non_projective_label, "np");
        assert_eq!(config.punctuation, vec![".", ","]);
        assert!(config.trace);
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        assert!(matches!(
            ParserConfig::from_toml_str("beam = 4"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            ParserConfig::from_toml_str("root_label = \"\""),
            Err(ConfigError::EmptyLabel("root_label"))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root_label = \"ROOT\"").unwrap();

        let config = ParserConfig::from_file(file.path()).unwrap();
        assert_eq!(config.root_label, "ROOT");

        let missing = ParserConfig::from_file("/nonexistent/depparse.toml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
