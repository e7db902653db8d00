//! Application configuration management.
//!
//! This module handles loading and saving the application configuration
//! (API endpoint, request timeout, expiry policy and last used username) and
//! resolving it, together with environment overrides, into a `ClientConfig`.
//!
//! Configuration is stored at `~/.config/jobboard/config.json`; the session
//! itself lives under the platform data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/data directory paths
const APP_NAME: &str = "jobboard";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing overrides it (local development server)
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "JOBBOARD_API_URL";

/// Environment variable overriding the request timeout (seconds)
pub const TIMEOUT_ENV: &str = "JOBBOARD_TIMEOUT_SECS";

/// HTTP request timeout in seconds.
/// A dead backend surfaces as a timeout error instead of a hung command.
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Maximum number of retries for retryable failures.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds, doubled after each retry.
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// What the auth service does when an authenticated request comes back 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Drop the session and redirect to login
    #[default]
    Logout,
    /// Only report the expiry; the session stays until the user logs out
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub expiry_policy: ExpiryPolicy,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Resolve client settings, letting the process environment override
    /// the file.
    pub fn client_config(&self) -> ClientConfig {
        self.client_config_with(|key| std::env::var(key).ok())
    }

    fn client_config_with(&self, env: impl Fn(&str) -> Option<String>) -> ClientConfig {
        let base_url = env(API_URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs = match env(TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(secs),
                _ => {
                    warn!(value = %raw, "Ignoring invalid {}", TIMEOUT_ENV);
                    self.timeout_secs
                }
            },
            None => self.timeout_secs,
        };

        let mut config = ClientConfig::new(base_url).with_expiry_policy(self.expiry_policy);
        if let Some(secs) = timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Settings for `ApiClient` and `AuthService`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub expiry_policy: ExpiryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            expiry_policy: ExpiryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.expiry_policy = policy;
        self
    }
}
