//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::channel::{BackoffConfig, ManagerConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub backoff: BackoffConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Stream channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// URL of the page hosting the client; decides channel host and scheme
    #[serde(default = "default_page_url")]
    pub page_url: String,

    /// Stream to follow
    #[serde(default = "default_stream")]
    pub stream: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_page_url() -> String {
    "http://localhost:8000/".to_string()
}

fn default_stream() -> String {
    "public".to_string()
}

fn default_connect_timeout() -> u64 {
    2000
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            stream: default_stream(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("livefeed").join("config.toml")),
            Some(PathBuf::from("/etc/livefeed/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Channel overrides
        if let Some(page_url) = lookup("LIVEFEED_PAGE_URL") {
            self.channel.page_url = page_url;
        }
        if let Some(stream) = lookup("LIVEFEED_STREAM") {
            self.channel.stream = stream;
        }
        if let Some(timeout) = lookup("LIVEFEED_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.channel.connect_timeout_ms = ms;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("LIVEFEED_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LIVEFEED_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Connection manager settings derived from this config
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            connect_timeout_ms: self.channel.connect_timeout_ms,
            backoff: self.backoff.clone(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Livefeed Configuration
#
# Environment variables override these settings:
# - LIVEFEED_PAGE_URL
# - LIVEFEED_STREAM
# - LIVEFEED_CONNECT_TIMEOUT_MS
# - LIVEFEED_LOG_LEVEL
# - LIVEFEED_LOG_FORMAT

[channel]
# Page hosting the client. https pages use wss://, http pages use ws://
page_url = "http://localhost:8000/"

# Stream to follow (public, followed, tag__<name>, ...)
stream = "public"

# Timeout for a single connect attempt (ms)
connect_timeout_ms = 2000

[backoff]
# Delay before the first reconnect attempt (ms)
initial_delay_ms = 1000

# Upper bound for the reconnect delay (ms)
max_delay_ms = 30000

# Growth factor per consecutive failure
factor = 1.5

# Random spread as a fraction of the delay (0.0 disables)
jitter = 0.2

# Stop retrying after this many consecutive failures (unset = never)
# max_attempts = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.channel.stream, "public");
        assert_eq!(config.channel.connect_timeout_ms, 2000);
        assert_eq!(config.backoff.initial_delay_ms, 1000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.channel.page_url, "http://localhost:8000/");
        assert_eq!(config.backoff.max_delay_ms, 30_000);
        assert_eq!(config.backoff.factor, 1.5);
        assert!(config.backoff.max_attempts.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [channel]
            stream = "followed"

            [backoff]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.channel.stream, "followed");
        assert_eq!(config.channel.page_url, "http://localhost:8000/");
        assert_eq!(config.backoff.max_attempts, Some(5));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[channel]\npage_url = \"https://social.example.org/\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.channel.page_url, "https://social.example.org/");
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/livefeed.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[channel\nstream = ").unwrap();
        match Config::load(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("LIVEFEED_STREAM", "tag__rust"),
            ("LIVEFEED_CONNECT_TIMEOUT_MS", "500"),
            ("LIVEFEED_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.channel.stream, "tag__rust");
        assert_eq!(config.channel.connect_timeout_ms, 500);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");

        let manager = config.manager_config();
        assert_eq!(manager.connect_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_numeric_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| {
            (key == "LIVEFEED_CONNECT_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(config.channel.connect_timeout_ms, 2000);
    }
}
