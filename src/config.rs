use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model training and artifact configuration
    #[serde(default)]
    pub ml: MlConfig,

    /// CEP geocoding configuration
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Weather provider configuration
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: SUPERNOVA)
            .add_source(
                config::Environment::with_prefix("SUPERNOVA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlConfig {
    /// Persisted artifact location
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Training corpus location
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,

    /// Accepted rows per category when generating the corpus
    #[serde(default = "default_samples_per_category")]
    pub samples_per_category: usize,

    /// Corpus generator RNG seed
    #[serde(default = "default_generator_seed")]
    pub generator_seed: u64,

    /// Train/test split RNG seed
    #[serde(default = "default_split_seed")]
    pub split_seed: u64,

    /// Held-out test fraction
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// Boosting learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Base tree depth cap
    #[serde(default = "default_max_depth")]
    pub max_depth: u16,

    /// Boosting round cap
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Rounds without validation improvement before stopping
    #[serde(default = "default_early_stopping_rounds")]
    pub early_stopping_rounds: usize,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            corpus_path: default_corpus_path(),
            samples_per_category: default_samples_per_category(),
            generator_seed: default_generator_seed(),
            split_seed: default_split_seed(),
            test_fraction: default_test_fraction(),
            learning_rate: default_learning_rate(),
            max_depth: default_max_depth(),
            max_rounds: default_max_rounds(),
            early_stopping_rounds: default_early_stopping_rounds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// ViaCEP base URL
    #[serde(default = "default_viacep_url")]
    pub viacep_url: String,

    /// Nominatim base URL
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,

    /// User-Agent sent to Nominatim (required by its usage policy)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout (seconds)
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            viacep_url: default_viacep_url(),
            nominatim_url: default_nominatim_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_geocoding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Open-Meteo base URL
    #[serde(default = "default_weather_url")]
    pub base_url: String,

    /// Cache entry lifetime (seconds)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Max fetch attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff (milliseconds), multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Request timeout (seconds)
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            cache_ttl_secs: default_cache_ttl(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_weather_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_model_path() -> PathBuf {
    PathBuf::from("data/weather_model.bin")
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/weather_dataset_with_rules.csv")
}

fn default_samples_per_category() -> usize {
    1000
}

fn default_generator_seed() -> u64 {
    7
}

fn default_split_seed() -> u64 {
    42
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_max_depth() -> u16 {
    6
}

fn default_max_rounds() -> usize {
    100
}

fn default_early_stopping_rounds() -> usize {
    10
}

fn default_viacep_url() -> String {
    "https://viacep.com.br".to_string()
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "Supernova_ML".to_string()
}

fn default_geocoding_timeout() -> u64 {
    10
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_weather_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_samples_per_category(), 1000);
        assert_eq!(default_split_seed(), 42);
        assert_eq!(default_max_rounds(), 100);
        assert_eq!(default_early_stopping_rounds(), 10);
        assert_eq!(default_test_fraction(), 0.2);
    }

    #[test]
    fn test_ml_config_default_paths() {
        let cfg = MlConfig::default();
        assert!(cfg.model_path.ends_with("weather_model.bin"));
        assert!(cfg.corpus_path.ends_with("weather_dataset_with_rules.csv"));
    }
}
