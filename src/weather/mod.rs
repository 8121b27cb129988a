//! OpenWeatherMap client.
//!
//! Current conditions, the 5-day forecast and active alerts for the
//! region centre. Read-only; the API key comes from configuration.

use crate::api::client::send_json;
use crate::api::FetchError;
use crate::config::WeatherConfig;
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Forecast entries are 3 hours apart; this many make one day.
const ENTRIES_PER_DAY: usize = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainReadings {
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub feels_like: f64,
    #[serde(default)]
    pub temp_min: f64,
    #[serde(default)]
    pub temp_max: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub pressure: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub deg: Option<f64>,
}

/// Current conditions from `/weather`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub visibility: Option<u64>,
    #[serde(default)]
    pub dt: i64,
}

impl CurrentWeather {
    /// The primary condition, if any.
    pub fn condition(&self) -> Option<&Condition> {
        self.weather.first()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastEntry {
    #[serde(default)]
    pub dt: i64,
    #[serde(default)]
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub wind: Wind,
    /// Probability of precipitation, 0-1.
    #[serde(default)]
    pub pop: Option<f64>,
    #[serde(default)]
    pub dt_txt: Option<String>,
}

/// 3-hourly forecast from `/forecast`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
}

impl Forecast {
    /// One entry per day (every 8th 3-hour slot), at most `days` of them.
    pub fn daily(&self, days: usize) -> Vec<&ForecastEntry> {
        self.list
            .iter()
            .step_by(ENTRIES_PER_DAY)
            .take(days)
            .collect()
    }
}

/// A government weather alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherAlert {
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    #[serde(default)]
    alerts: Vec<WeatherAlert>,
}

/// Icon image address for a condition icon code.
pub fn icon_url(icon_code: &str) -> String {
    format!("https://openweathermap.org/img/wn/{}@2x.png", icon_code)
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    lat: f64,
    lon: f64,
    units: String,
    timeout_seconds: u64,
}

impl WeatherClient {
    /// Build a client from configuration; fails without an API key.
    pub fn new(config: &WeatherConfig, timeout_seconds: u64) -> Result<Self> {
        let api_key = match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => bail!(
                "No weather API key configured. Set CRAM_WEATHER_API_KEY or [weather].api_key in .cram.toml"
            ),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            lat: config.lat,
            lon: config.lon,
            units: config.units.clone(),
            timeout_seconds,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        // The key travels only in the query; errors report the bare URL.
        let url = format!("{}/{}", self.base_url, path);
        let lat = self.lat.to_string();
        let lon = self.lon.to_string();
        let request = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .query(extra);
        send_json(request, &url, self.timeout_seconds).await
    }

    pub async fn current(&self) -> Result<CurrentWeather, FetchError> {
        self.get("weather", &[]).await
    }

    pub async fn forecast(&self) -> Result<Forecast, FetchError> {
        self.get("forecast", &[]).await
    }

    /// Active alerts; any failure is logged and yields none.
    pub async fn alerts(&self) -> Vec<WeatherAlert> {
        match self
            .get::<OneCallResponse>("onecall", &[("exclude", "minutely,hourly")])
            .await
        {
            Ok(response) => response.alerts,
            Err(e) => {
                warn!("Weather alerts error: {}", e);
                Vec::new()
            }
        }
    }
}
