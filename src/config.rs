//! Configuration loading and persistence.
//!
//! Settings live in `config.json` inside the config directory, with
//! environment variable overrides on top. The legacy GCM API key is never
//! written to disk; it only comes from `WEBPUSH_GCM_API_KEY`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the configuration directory.
pub const ENV_CONFIG_DIR: &str = "WEBPUSH_CONFIG_DIR";
/// Legacy GCM API key.
pub const ENV_GCM_API_KEY: &str = "WEBPUSH_GCM_API_KEY";
/// Overrides [`Config::default_ttl`].
pub const ENV_DEFAULT_TTL: &str = "WEBPUSH_DEFAULT_TTL";
/// Overrides [`Config::max_in_flight`].
pub const ENV_MAX_IN_FLIGHT: &str = "WEBPUSH_MAX_IN_FLIGHT";
/// Overrides [`Config::request_timeout_secs`].
pub const ENV_REQUEST_TIMEOUT: &str = "WEBPUSH_REQUEST_TIMEOUT";

const CONFIG_FILE: &str = "config.json";

/// Configuration for sending push messages.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// TTL in seconds used when a notification does not specify one.
    pub default_ttl: u32,
    /// Maximum concurrent sends in a dispatch pool.
    pub max_in_flight: usize,
    /// Timeout in seconds for a single push request.
    pub request_timeout_secs: u64,
    /// User-Agent sent to push services.
    pub user_agent: String,
    /// Legacy GCM API key - NOT serialized to disk.
    #[serde(skip)]
    pub legacy_api_key: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("default_ttl", &self.default_ttl)
            .field("max_in_flight", &self.max_in_flight)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("legacy_api_key", &self.legacy_api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 86_400,
            max_in_flight: 4,
            request_timeout_secs: 10,
            user_agent: format!("webpush-aesgcm/{}", env!("CARGO_PKG_VERSION")),
            legacy_api_key: None,
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `WEBPUSH_CONFIG_DIR` wins; otherwise the platform config dir
    /// (e.g. `~/.config/webpush`).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("webpush"))
    }

    /// Loads configuration from the config directory, with environment
    /// variable overrides applied.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_dir()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads `config.json` from `dir`. A missing file yields defaults.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("[Config] No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup. Unparseable numbers are ignored
    /// with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_GCM_API_KEY).filter(|k| !k.is_empty()) {
            self.legacy_api_key = Some(key);
        }

        if let Some(ttl) = lookup(ENV_DEFAULT_TTL) {
            match ttl.parse::<u32>() {
                Ok(ttl) => self.default_ttl = ttl,
                Err(_) => log::warn!("[Config] Ignoring invalid {ENV_DEFAULT_TTL}={ttl}"),
            }
        }

        if let Some(max) = lookup(ENV_MAX_IN_FLIGHT) {
            match max.parse::<usize>() {
                Ok(max) => self.max_in_flight = max,
                Err(_) => log::warn!("[Config] Ignoring invalid {ENV_MAX_IN_FLIGHT}={max}"),
            }
        }

        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
            match timeout.parse::<u64>() {
                Ok(timeout) => self.request_timeout_secs = timeout,
                Err(_) => log::warn!("[Config] Ignoring invalid {ENV_REQUEST_TIMEOUT}={timeout}"),
            }
        }
    }

    /// Persists the configuration to `dir/config.json`.
    /// Note: the legacy API key is NOT saved.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
