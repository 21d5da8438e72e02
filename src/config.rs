//! Client configuration.
//!
//! Layered as defaults, then the JSON config file, then environment
//! variables. Use the builder methods to override in code.
//!
//! ```ignore
//! use parlance::config::ClientConfig;
//!
//! let config = ClientConfig::load()?
//!     .with_provider("anthropic")
//!     .with_model("claude-sonnet-4-20250514");
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::provider;
use crate::stream::StreamProtocol;

pub const ENV_API_URL: &str = "PARLANCE_API_URL";
pub const ENV_PROVIDER: &str = "PARLANCE_PROVIDER";
pub const ENV_MODEL: &str = "PARLANCE_MODEL";
pub const ENV_STREAM_PROTOCOL: &str = "PARLANCE_STREAM_PROTOCOL";

/// Unit revealed per typing tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingMode {
    #[default]
    Character,
    Word,
}

/// Typing simulator pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Lower bound of the per-unit delay (ms)
    pub min_delay_ms: u64,
    /// Upper bound of the per-unit delay (ms)
    pub max_delay_ms: u64,
    /// Track the observed gap between content updates
    pub adaptive_speed: bool,
    pub mode: TypingMode,
    /// Number of recent update gaps averaged for adaptive speed
    pub history_len: usize,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 2,
            max_delay_ms: 8,
            adaptive_speed: true,
            mode: TypingMode::Character,
            history_len: 5,
        }
    }
}

impl TypingConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.min_delay_ms))
    }
}

/// Persistence batcher thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Character delta that forces an immediate write
    pub batch_threshold: usize,
    /// Debounce window (ms)
    pub debounce_ms: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 50,
            debounce_ms: 100,
        }
    }
}

impl BatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub chat_path: String,
    pub title_path: String,
    pub provider: String,
    /// `None` selects the provider's default model
    pub model: Option<String>,
    pub stream_protocol: StreamProtocol,
    pub typing: TypingConfig,
    pub batcher: BatcherConfig,
    pub title_max_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8081".to_string(),
            chat_path: "/api/chat".to_string(),
            title_path: "/api/gettitle".to_string(),
            provider: "google".to_string(),
            model: None,
            stream_protocol: StreamProtocol::DataStream,
            typing: TypingConfig::default(),
            batcher: BatcherConfig::default(),
            title_max_chars: 50,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location: `<config dir>/parlance/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("parlance").join("config.json"))
    }

    /// Defaults, overlaid with the default config file if present, then the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env()
    }

    /// Read a config file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        config.validate()
    }

    /// Apply `PARLANCE_*` environment overrides.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(url) = env_value(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(provider) = env_value(ENV_PROVIDER) {
            self.provider = provider;
        }
        if let Some(model) = env_value(ENV_MODEL) {
            self.model = Some(model);
        }
        if let Some(protocol) = env_value(ENV_STREAM_PROTOCOL) {
            self.stream_protocol =
                protocol
                    .parse()
                    .map_err(|value| ConfigError::InvalidValue {
                        key: ENV_STREAM_PROTOCOL,
                        value,
                    })?;
        }
        self.validate()
    }

    /// Reject values the rest of the crate cannot work with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if provider::provider(&self.provider).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "provider",
                value: self.provider,
            });
        }
        if self.typing.min_delay_ms > self.typing.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                key: "typing.min_delay_ms",
                value: self.typing.min_delay_ms.to_string(),
            });
        }
        if self.batcher.batch_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batcher.batch_threshold",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }

    /// Set the backend base URL (builder pattern)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_stream_protocol(mut self, protocol: StreamProtocol) -> Self {
        self.stream_protocol = protocol;
        self
    }

    pub fn with_typing(mut self, typing: TypingConfig) -> Self {
        self.typing = typing;
        self
    }

    pub fn with_batcher(mut self, batcher: BatcherConfig) -> Self {
        self.batcher = batcher;
        self
    }

    pub fn chat_url(&self) -> String {
        join_url(&self.api_base_url, &self.chat_path)
    }

    pub fn title_url(&self) -> String {
        join_url(&self.api_base_url, &self.title_path)
    }

    /// Configured model, or the provider's default.
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .or_else(|| provider::default_model_for(&self.provider).map(str::to_string))
            .unwrap_or_default()
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for key in [ENV_API_URL, ENV_PROVIDER, ENV_MODEL, ENV_STREAM_PROTOCOL] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.chat_url(), "http://localhost:8081/api/chat");
        assert_eq!(config.title_url(), "http://localhost:8081/api/gettitle");
        assert_eq!(config.resolved_model(), "gemini-1.5-flash");
        assert_eq!(config.batcher.batch_threshold, 50);
        assert_eq!(config.batcher.debounce(), Duration::from_millis(100));
        assert_eq!(config.typing.min_delay(), Duration::from_millis(2));
        assert_eq!(config.typing.mode, TypingMode::Character);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"provider":"anthropic","typing":{{"mode":"word"}},"batcher":{{"debounce_ms":250}}}}"#
        )
        .unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.typing.mode, TypingMode::Word);
        assert_eq!(config.typing.max_delay_ms, 8);
        assert_eq!(config.batcher.debounce_ms, 250);
        assert_eq!(config.batcher.batch_threshold, 50);
        assert_eq!(config.resolved_model(), "claude-opus-4-20250514");
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            ClientConfig::load_from(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ClientConfig::load_from(&dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"provider":"acme"}}"#).unwrap();
        assert!(matches!(
            ClientConfig::load_from(file.path()),
            Err(ConfigError::InvalidValue { key: "provider", .. })
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_API_URL, "https://chat.example.com/");
        std::env::set_var(ENV_MODEL, "gemini-2.0-flash");
        std::env::set_var(ENV_STREAM_PROTOCOL, "text");

        let config = ClientConfig::default().apply_env().unwrap();
        assert_eq!(config.chat_url(), "https://chat.example.com/api/chat");
        assert_eq!(config.resolved_model(), "gemini-2.0-flash");
        assert_eq!(config.stream_protocol, StreamProtocol::Text);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_protocol() {
        clear_env();
        std::env::set_var(ENV_STREAM_PROTOCOL, "smoke-signals");
        let result = ClientConfig::default().apply_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: ENV_STREAM_PROTOCOL,
                ..
            })
        ));
        clear_env();
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new()
            .with_api_base_url("http://127.0.0.1:9000")
            .with_provider("openai")
            .with_stream_protocol(StreamProtocol::Text);
        assert_eq!(config.chat_url(), "http://127.0.0.1:9000/api/chat");
        assert_eq!(config.resolved_model(), "gpt-4-turbo-preview");
    }
}
