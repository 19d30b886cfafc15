//! Engine configuration (`domainflow.toml`).
//!
//! ```toml
//! [engine]
//! read_tag = "get"
//! framed_tag = "framed"
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Every section and key is optional.

use std::path::Path;

use serde::Deserialize;
use tracing::Level;

use crate::error::ConfigError;

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Scheduling vocabulary (the `[engine]` section).
    #[serde(default)]
    pub engine: EngineSection,

    /// Logging options (the `[logging]` section).
    #[serde(default)]
    pub logging: LoggingSection,
}

/// The `[engine]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Tag that marks a read request in scenario expressions
    pub read_tag: String,

    /// Tag of operations that open a new execution frame
    pub framed_tag: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        EngineSection {
            read_tag: "get".to_string(),
            framed_tag: "framed".to_string(),
        }
    }
}

/// The `[logging]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Maximum level emitted by the CLI subscriber (`error` .. `trace`)
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: "warn".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate_sections()?;
        Ok(config)
    }

    pub(crate) fn validate_sections(&self) -> Result<(), ConfigError> {
        if self.engine.read_tag.is_empty() {
            return Err(ConfigError::Invalid("engine.read_tag is empty".to_string()));
        }
        if self.engine.read_tag == self.engine.framed_tag {
            return Err(ConfigError::Invalid(format!(
                "engine.read_tag and engine.framed_tag are both {:?}",
                self.engine.read_tag
            )));
        }
        self.log_level()?;
        Ok(())
    }

    /// Parsed logging level
    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.logging
            .level
            .parse::<Level>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.logging.level)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = EngineConfig::parse_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.engine.read_tag, "get");
        assert_eq!(config.log_level().unwrap(), Level::WARN);
    }

    #[test]
    fn test_parse_full_config() {
        let config = EngineConfig::parse_toml(
            r#"
            [engine]
            read_tag = "read"
            framed_tag = "frame"

            [logging]
            level = "trace"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.read_tag, "read");
        assert_eq!(config.engine.framed_tag, "frame");
        assert_eq!(config.log_level().unwrap(), Level::TRACE);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = EngineConfig::parse_toml("[engine]\nframed_tag = \"scope\"\n").unwrap();
        assert_eq!(config.engine.read_tag, "get");
        assert_eq!(config.engine.framed_tag, "scope");
    }

    #[test]
    fn test_reject_unknown_level() {
        let err = EngineConfig::parse_toml("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_reject_clashing_tags() {
        let err = EngineConfig::parse_toml("[engine]\nread_tag = \"x\"\nframed_tag = \"x\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(matches!(
            EngineConfig::parse_toml("[engine"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_path() {
        let err = EngineConfig::load(Path::new("/nonexistent/domainflow.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
