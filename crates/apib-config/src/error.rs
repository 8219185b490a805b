use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::source::ConfigSource;

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {}: {source}", .attempted.display())]
    WorkingDirectory { attempted: PathBuf, source: io::Error },

    #[error("override config {} not found", .path.display())]
    OverrideNotFound { path: PathBuf },

    #[error("failed to read config {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

/// Every validation failure found while resolving one stack.
#[derive(Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(|err| format!("- {err}")).collect();
        f.write_str(&lines.join("\n"))
    }
}

/// One invalid value, with the dotted key and the layer that supplied it.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub key: &'static str,
    pub message: String,
    pub source: Option<ConfigSource>,
}

impl ConfigValidationError {
    pub(crate) fn new(
        key: &'static str,
        message: impl Into<String>,
        source: Option<&ConfigSource>,
    ) -> Self {
        Self {
            key,
            message: message.into(),
            source: source.cloned(),
        }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)?;
        match &self.source {
            Some(source) => write!(f, " ({})", source.describe()),
            None => Ok(()),
        }
    }
}
