use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    coordinate::{Coordinate, DEFAULT_COORDINATE, DEFAULT_EPSILON_DEG},
    error::ProviderError,
    model::Units,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_GEOLOCATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Runtime configuration. Read from disk, never written back.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "imperial"
/// debounce_ms = 300
///
/// [default_location]
/// lat = 51.5072
/// lon = -0.1276
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub units: Units,
    pub default_location: Coordinate,
    pub request_timeout_ms: u64,
    pub geolocation_timeout_ms: u64,
    pub debounce_ms: u64,
    pub epsilon_deg: f64,
    pub search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            units: Units::default(),
            default_location: DEFAULT_COORDINATE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            geolocation_timeout_ms: DEFAULT_GEOLOCATION_TIMEOUT_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            epsilon_deg: DEFAULT_EPSILON_DEG,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl Config {
    /// Load config from the platform config dir, or defaults if there is no file yet.
    /// The API key environment variable wins over the file.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };

        cfg.apply_env(|name| std::env::var(name).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents).context("Invalid configuration TOML")?;
        Ok(cfg)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Override values from the environment. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.epsilon_deg.is_finite() || self.epsilon_deg < 0.0 {
            bail!("epsilon_deg must be a non-negative number, got {}", self.epsilon_deg);
        }
        if self.debounce_ms == 0 {
            bail!("debounce_ms must be greater than zero");
        }
        if self.request_timeout_ms == 0 || self.geolocation_timeout_ms == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.search_limit == 0 {
            bail!("search_limit must be greater than zero");
        }
        if !self.default_location.is_valid() {
            bail!("default_location {} is not a valid coordinate", self.default_location);
        }
        Ok(())
    }

    /// Returns the API key or an error explaining how to set one.
    ///
    /// The error downcasts to [`ProviderError::MissingApiKey`].
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey)
            .with_context(|| {
                format!(
                    "No OpenWeather API key configured.\n\
                     Hint: set `api_key` in {} or export {API_KEY_ENV}.",
                    Self::config_file_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|_| "config.toml".to_string())
                )
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
