//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/booktalk/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/booktalk/` (~/.config/booktalk/)
//! - State/Logs: `$XDG_STATE_HOME/booktalk/` (~/.local/state/booktalk/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Assistant server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Audio playback configuration
    #[serde(default)]
    pub audio: AudioConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Assistant server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Base URL of the assistant service, including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds (non-streaming calls)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Language hint sent with every request
    #[serde(default = "default_language")]
    pub language: String,

    /// Use the SSE streaming endpoint for turns (live progress). When off,
    /// turns use the one-shot endpoint with its offline-notice fallback.
    #[serde(default = "default_streaming")]
    pub streaming: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            language: default_language(),
            streaming: default_streaming(),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("server.base_url must not be empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "server.base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "server.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_language() -> String {
    "en".to_string()
}

fn default_streaming() -> bool {
    true
}

/// Audio playback configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    /// Enable/disable spoken replies
    #[serde(default = "default_audio_enabled")]
    pub enabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_audio_enabled(),
        }
    }
}

fn default_audio_enabled() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.server.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/booktalk/config.toml` (~/.config/booktalk/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("booktalk").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/booktalk/` (~/.local/state/booktalk/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("booktalk")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/booktalk/booktalk.log` (~/.local/state/booktalk/booktalk.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("booktalk.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://localhost:8000/api");
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.server.language, "en");
        assert!(config.server.streaming);
        assert!(config.audio.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
base_url = "https://books.example.com/api"
language = "zh"

[audio]
enabled = false

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.base_url, "https://books.example.com/api");
        assert_eq!(config.server.language, "zh");
        assert_eq!(config.server.timeout_secs, 30);
        assert!(!config.audio.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());

        let config = ServerConfig {
            base_url: "".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            base_url: "localhost:8000".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbase_url = \"http://127.0.0.1:9000/api\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.base_url, "http://127.0.0.1:9000/api");
    }

    #[test]
    fn test_load_from_rejects_invalid_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbase_url = \"not-a-url\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
