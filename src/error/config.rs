//! Configuration loading errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "E_CONFIG_IO",
            ConfigError::Parse { .. } => "E_CONFIG_PARSE",
            ConfigError::InvalidValue { .. } => "E_CONFIG_VALUE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "PARLANCE_STREAM_PROTOCOL",
            value: "smoke".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for PARLANCE_STREAM_PROTOCOL: smoke");
        assert_eq!(err.error_code(), "E_CONFIG_VALUE");
    }
}
