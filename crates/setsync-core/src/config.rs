//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/setsync/config.toml)
//! 3. Environment variables (SETSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{EngineSettings, RetryPolicy};

/// Environment variable prefix
const ENV_PREFIX: &str = "SETSYNC";

/// Keys accepted by [`Config::set_value`]
pub const CONFIG_KEYS: &[&str] = &[
    "server_url",
    "debounce_ms",
    "success_tint_ms",
    "request_timeout_secs",
    "max_retries",
    "retry_backoff_ms",
    "log_level",
    "log_file",
];

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Base URL of the workout server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Quiet period before a provisional edit is written
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a saved row stays tinted
    #[serde(default = "default_success_tint_ms")]
    pub success_tint_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient failures (0 = log and drop)
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            debounce_ms: default_debounce_ms(),
            success_tint_ms: default_success_tint_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SETSYNC_SERVER_URL, SETSYNC_DEBOUNCE_MS, ...)
    /// 2. Config file (~/.config/setsync/config.toml or SETSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path (e.g. `--config`) or the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Unparsable numeric values are ignored.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.server_url = val;
            }
        }

        if let Some(val) = env_parse(&format!("{}_DEBOUNCE_MS", ENV_PREFIX)) {
            self.debounce_ms = val;
        }

        if let Some(val) = env_parse(&format!("{}_MAX_RETRIES", ENV_PREFIX)) {
            self.max_retries = val;
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }
    }

    /// Set a single value by key, as `setsync config set` does
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "server_url" => self.server_url = value.to_string(),
            "debounce_ms" => self.debounce_ms = parse_value(key, value)?,
            "success_tint_ms" => self.success_tint_ms = parse_value(key, value)?,
            "request_timeout_secs" => self.request_timeout_secs = parse_value(key, value)?,
            "max_retries" => self.max_retries = parse_value(key, value)?,
            "retry_backoff_ms" => self.retry_backoff_ms = parse_value(key, value)?,
            "log_level" => self.log_level = value.to_string(),
            "log_file" => {
                self.log_file = if value.is_empty() || value == "none" {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            _ => bail!(
                "Unknown config key '{}'. Valid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SETSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("setsync")
            .join("config.toml")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Engine timing derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            success_tint: Duration::from_millis(self.success_tint_ms),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
                ..RetryPolicy::default()
            },
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid value for {}: '{}'", key, value))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_success_tint_ms() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "SETSYNC_SERVER_URL",
        "SETSYNC_DEBOUNCE_MS",
        "SETSYNC_MAX_RETRIES",
        "SETSYNC_LOG_LEVEL",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.success_tint_ms, 300);
        assert_eq!(config.max_retries, 0);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_engine_settings() {
        let config = Config {
            debounce_ms: 250,
            max_retries: 2,
            ..Config::default()
        };
        let settings = config.engine_settings();
        assert_eq!(settings.debounce, Duration::from_millis(250));
        assert_eq!(settings.success_tint, Duration::from_millis(300));
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.retry.backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_env_override_server_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SETSYNC_SERVER_URL", "http://gym.local:8080");
        config.apply_env_overrides();
        assert_eq!(config.server_url, "http://gym.local:8080");

        // Empty string keeps the current value
        env::set_var("SETSYNC_SERVER_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.server_url, "http://gym.local:8080");
    }

    #[test]
    fn test_env_override_numbers() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SETSYNC_DEBOUNCE_MS", "400");
        env::set_var("SETSYNC_MAX_RETRIES", "3");
        config.apply_env_overrides();
        assert_eq!(config.debounce_ms, 400);
        assert_eq!(config.max_retries, 3);

        env::set_var("SETSYNC_DEBOUNCE_MS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.debounce_ms, 400);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            server_url = "http://example.com"
            debounce_ms = 750
            max_retries = 1
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.server_url, "http://example.com");
        assert_eq!(config.debounce_ms, 750);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.success_tint_ms, 300);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_path(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set_value("server_url", "http://10.0.0.2:5000").unwrap();
        config.set_value("log_file", "/tmp/setsync.log").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut config = Config::default();
        assert!(config.set_value("debounce_ms", "fast").is_err());
        assert!(config.set_value("color", "blue").is_err());

        config.set_value("max_retries", " 2 ").unwrap();
        assert_eq!(config.max_retries, 2);

        config.set_value("log_file", "/var/log/setsync.log").unwrap();
        config.set_value("log_file", "none").unwrap();
        assert!(config.log_file.is_none());
    }
}
