//! Format-agnostic configuration loading

use crate::{Error, Result, io};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;

/// Text formats understood for settings, schemas and fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Toml,
    Json,
    Yaml,
}

impl Format {
    /// Detect the format from a file extension.
    ///
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }

    /// Human-readable name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension and deserializes
/// transparently.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let format = Format::from_path(path)?;
        let content = io::read_text(path)?;
        self.parse(&content, format, path)
    }

    /// Parse configuration text already read from `path`.
    fn parse<T: DeserializeOwned>(&self, content: &str, format: Format, path: &Path) -> Result<T> {
        let parse_err = |message: String| Error::ConfigParse {
            path: path.to_path_buf(),
            format: format.name().into(),
            message,
        };

        match format {
            Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
            Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string())),
        }
    }
}
