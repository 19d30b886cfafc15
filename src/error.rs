//! Error types.
//!
//! Malformed trees are programming errors and panic. Everything here is
//! recoverable: solver failures and configuration problems.

use std::fmt;
use std::io;

/// Failure reported by a [`Solver`](crate::workflow::Solver) for one bucket
#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// The domain could not solve the bucket
    Failed(String),
    /// The domain is known but cannot take work at the moment
    Unavailable(String),
}

impl SolveError {
    pub fn failed(message: impl Into<String>) -> Self {
        SolveError::Failed(message.into())
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Failed(msg) => write!(f, "solve failed: {}", msg),
            SolveError::Unavailable(domain) => write!(f, "domain unavailable: {}", domain),
        }
    }
}

impl std::error::Error for SolveError {}

/// Error raised while evaluating a workflow
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// A bucket failed to solve; the pass stopped before it
    Solve {
        index: usize,
        domain: String,
        source: SolveError,
    },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::Solve {
                index,
                domain,
                source,
            } => write!(f, "bucket {} ({}): {}", index, domain, source),
        }
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkflowError::Solve { source, .. } => Some(source),
        }
    }
}

/// Error raised while loading configuration or scenario files
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
    /// The document parsed but describes something inconsistent
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_workflow_error_display_and_source() {
        let err = WorkflowError::Solve {
            index: 2,
            domain: "solver".to_string(),
            source: SolveError::failed("no model"),
        };
        assert_eq!(err.to_string(), "bucket 2 (solver): solve failed: no model");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_error_from_toml() {
        let parse = toml::from_str::<toml::Table>("= nope").unwrap_err();
        let err: ConfigError = parse.into();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("Parse error"));
    }
}
