use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::errors::ConfigValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Minimum log level for console output
    pub level: String,

    /// Enable trace-level logging for frame contents
    pub trace_frames: bool,

    /// Whether to include source code location in logs
    pub include_location: bool,

    /// Whether to include thread IDs in logs
    pub thread_ids: bool,

    /// Whether to include thread names in logs
    pub thread_names: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            trace_frames: false,
            include_location: false,
            thread_ids: false,
            thread_names: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match self.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(ConfigValidationError::logging(format!(
                "unknown log level: {other}"
            ))),
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO, // Fallback to INFO if invalid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let config = Config {
            level: "invalid".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            level: "debug".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_level_filter() {
        let config = Config {
            level: "debug".to_string(),
            ..Default::default()
        };
        assert_eq!(config.level_filter(), LevelFilter::DEBUG);

        let config = Config {
            level: "invalid".to_string(),
            ..Default::default()
        };
        assert_eq!(config.level_filter(), LevelFilter::INFO); // fallback
    }
}
