//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cram.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".cram.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Weather service settings.
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Refresh intervals for `watch`.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Local support-request storage.
    #[serde(default)]
    pub support: SupportConfig,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the resilience backend.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// OpenWeatherMap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// API key. Usually supplied through `CRAM_WEATHER_API_KEY` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_weather_url")]
    pub base_url: String,

    /// Latitude of the region centre.
    #[serde(default = "default_lat")]
    pub lat: f64,

    /// Longitude of the region centre.
    #[serde(default = "default_lon")]
    pub lon: f64,

    /// `metric`, `imperial` or `standard`.
    #[serde(default = "default_units")]
    pub units: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_url(),
            lat: default_lat(),
            lon: default_lon(),
            units: default_units(),
        }
    }
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_lat() -> f64 {
    9.3167
}

fn default_lon() -> f64 {
    123.3
}

fn default_units() -> String {
    "metric".to_string()
}

/// Polling intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_statistics_interval")]
    pub statistics_interval_seconds: u64,

    #[serde(default = "default_weather_interval")]
    pub weather_interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            statistics_interval_seconds: default_statistics_interval(),
            weather_interval_seconds: default_weather_interval(),
        }
    }
}

fn default_statistics_interval() -> u64 {
    30
}

fn default_weather_interval() -> u64 {
    600 // 10 min
}

/// Support-request storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportConfig {
    /// JSON file holding the local key-value storage.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".cram_storage.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their environment variables) take precedence,
    /// but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(ref key) = args.weather_api_key {
            self.weather.api_key = Some(key.clone());
        }
        if let Some(ref path) = args.storage {
            self.support.storage_path = path.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
