//! Runtime configuration.
//!
//! # Responsibility
//! - Deserialize logging, reader and writer settings from JSON.
//! - Reject values the rest of the crate cannot honour.
//!
//! # Invariants
//! - Every field is optional in the JSON document and falls back to its
//!   default.
//! - A config returned by `from_json_str`/`from_path` has passed `validate`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type ConfigResult<T> = Result<T, ConfigError>;

const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_FILES: usize = 5;
const KNOWN_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "warning", "error"];

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read config `{path}`: {source}"),
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// File logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rotated log files; `None` disables file logging.
    pub log_dir: Option<String>,
    pub max_file_size_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Leniency switches for reading model files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Skip sheets that match no requested model instead of failing.
    pub ignore_other_sheets: bool,
    /// Skip header cells that match no attribute instead of failing.
    pub ignore_extra_attributes: bool,
}

/// Document properties handed to a sheet writer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub version: Option<String>,
    pub language: Option<String>,
    pub creator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetModelConfig {
    pub logging: LoggingConfig,
    pub reader: ReaderOptions,
    pub writer: WriterMetadata,
}

impl SheetModelConfig {
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// # Errors
    /// - Unknown log level.
    /// - `max_files` or `max_file_size_bytes` of zero.
    pub fn validate(&self) -> ConfigResult<()> {
        let level = self.logging.level.trim().to_ascii_lowercase();
        if !KNOWN_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unsupported log level `{}`; expected trace|debug|info|warn|error",
                self.logging.level
            )));
        }
        if self.logging.max_files == 0 {
            return Err(ConfigError::Invalid(
                "logging.max_files must be greater than 0".to_string(),
            ));
        }
        if self.logging.max_file_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "logging.max_file_size_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SheetModelConfig};
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SheetModelConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SheetModelConfig::default());
        assert_eq!(config.logging.max_files, 5);
        assert!(!config.reader.ignore_other_sheets);
        assert!(config.writer.title.is_none());
    }

    #[test]
    fn partial_sections_are_merged_with_defaults() {
        let config = SheetModelConfig::from_json_str(
            r#"{"logging": {"level": "WARN"}, "reader": {"ignore_extra_attributes": true},
                "writer": {"title": "Model", "creator": "lab"}}"#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "WARN");
        assert_eq!(config.logging.max_file_size_bytes, 10 * 1024 * 1024);
        assert!(config.reader.ignore_extra_attributes);
        assert_eq!(config.writer.title.as_deref(), Some("Model"));
        assert_eq!(config.writer.creator.as_deref(), Some("lab"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let error = SheetModelConfig::from_json_str(r#"{"logging": {"level": "loud"}}"#)
            .unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(message) if message.contains("loud")));

        let error = SheetModelConfig::from_json_str(r#"{"logging": {"max_files": 0}}"#)
            .unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));

        let error = SheetModelConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"reader": {{"ignore_other_sheets": true}}}}"#).unwrap();
        let config = SheetModelConfig::from_path(file.path()).unwrap();
        assert!(config.reader.ignore_other_sheets);

        let error = SheetModelConfig::from_path(file.path().with_extension("missing"))
            .unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
