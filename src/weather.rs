//! Open-Meteo current-conditions client.
//!
//! Responses are cached per rounded coordinate pair (1h TTL) and transport
//! failures are retried with a short linear backoff. This layer owns all
//! retry policy; the classification core performs none.

use crate::config::WeatherConfig;
use crate::error::{AppError, Result};
use crate::models::FeatureRecord;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// General (location context) fields of a weather response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub timezone: String,
    pub timezone_abbreviation: String,
    pub utc_offset_seconds: i64,
}

/// Instantaneous ("current") observation fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub time: String,
    pub temperature_2m: f64,
    pub precipitation: f64,
    pub wind_speed_10m: f64,
    pub wind_direction_10m: f64,
    pub is_day: f64,
    pub rain: f64,
    pub snowfall: f64,
    pub surface_pressure: f64,
    pub weather_code: f64,
    pub cloud_cover: f64,
    pub pressure_msl: f64,
    pub showers: f64,
    pub relative_humidity_2m: f64,
    pub apparent_temperature: f64,
    pub wind_gusts_10m: f64,
}

/// One complete weather observation for a coordinate pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub general: GeneralInfo,
    pub current: CurrentConditions,
}

impl WeatherSnapshot {
    /// Assemble the full model input from this snapshot
    pub fn to_feature_record(&self) -> FeatureRecord {
        FeatureRecord {
            apparent_temperature: self.current.apparent_temperature,
            cloud_cover: self.current.cloud_cover,
            is_day: self.current.is_day,
            precipitation: self.current.precipitation,
            pressure_msl: self.current.pressure_msl,
            rain: self.current.rain,
            relative_humidity_2m: self.current.relative_humidity_2m,
            showers: self.current.showers,
            snowfall: self.current.snowfall,
            surface_pressure: self.current.surface_pressure,
            temperature_2m: self.current.temperature_2m,
            weather_code: self.current.weather_code,
            wind_direction_10m: self.current.wind_direction_10m,
            wind_gusts_10m: self.current.wind_gusts_10m,
            wind_speed_10m: self.current.wind_speed_10m,
            elevation: self.general.elevation,
            latitude: self.general.latitude,
            longitude: self.general.longitude,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    elevation: f64,
    timezone: String,
    timezone_abbreviation: String,
    utc_offset_seconds: i64,
    current: ForecastCurrent,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrent {
    time: String,
    temperature_2m: f64,
    precipitation: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
    is_day: f64,
    rain: f64,
    snowfall: f64,
    surface_pressure: f64,
    weather_code: f64,
    cloud_cover: f64,
    pressure_msl: f64,
    showers: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    wind_gusts_10m: f64,
}

const CURRENT_VARIABLES: &str = "temperature_2m,precipitation,wind_speed_10m,\
wind_direction_10m,is_day,rain,snowfall,surface_pressure,weather_code,\
cloud_cover,pressure_msl,showers,relative_humidity_2m,apparent_temperature,\
wind_gusts_10m";

/// Weather provider client with response caching and bounded retry
#[derive(Clone)]
pub struct WeatherClient {
    client: Client,
    config: WeatherConfig,
    cache: Cache<String, WeatherSnapshot>,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .max_capacity(10_000)
            .build();

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    /// Fetch current conditions for a coordinate pair, serving cached
    /// snapshots for nearby (4-decimal-rounded) coordinates within the TTL.
    pub async fn current(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot> {
        let key = format!("{:.4},{:.4}", latitude, longitude);
        if let Some(snapshot) = self.cache.get(&key).await {
            debug!(key = %key, "Weather cache hit");
            return Ok(snapshot);
        }

        let snapshot = self.fetch_with_retry(latitude, longitude).await?;
        self.cache.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn fetch_with_retry(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot> {
        let mut last_error = None;
        for attempt in 1..=self.config.max_retries {
            match self.fetch(latitude, longitude).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    warn!(
                        attempt = attempt,
                        max = self.config.max_retries,
                        error = %e,
                        "Weather fetch failed"
                    );
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let backoff =
                            Duration::from_millis(self.config.retry_backoff_ms * attempt as u64);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| AppError::Network("weather fetch failed".to_string())))
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot> {
        let url = format!("{}/v1/forecast", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", CURRENT_VARIABLES.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "weather provider returned status {}",
                response.status()
            )));
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("weather response malformed: {}", e)))?;

        Ok(WeatherSnapshot {
            general: GeneralInfo {
                latitude: body.latitude,
                longitude: body.longitude,
                elevation: body.elevation,
                timezone: body.timezone,
                timezone_abbreviation: body.timezone_abbreviation,
                utc_offset_seconds: body.utc_offset_seconds,
            },
            current: CurrentConditions {
                time: body.current.time,
                temperature_2m: body.current.temperature_2m,
                precipitation: body.current.precipitation,
                wind_speed_10m: body.current.wind_speed_10m,
                wind_direction_10m: body.current.wind_direction_10m,
                is_day: body.current.is_day,
                rain: body.current.rain,
                snowfall: body.current.snowfall,
                surface_pressure: body.current.surface_pressure,
                weather_code: body.current.weather_code,
                cloud_cover: body.current.cloud_cover,
                pressure_msl: body.current.pressure_msl,
                showers: body.current.showers,
                relative_humidity_2m: body.current.relative_humidity_2m,
                apparent_temperature: body.current.apparent_temperature,
                wind_gusts_10m: body.current.wind_gusts_10m,
            },
        })
    }
}
