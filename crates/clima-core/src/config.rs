use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{AppError, ConfigError};

type Result<T> = std::result::Result<T, AppError>;

/// Periods accepted by `weather.default_period`.
pub const KNOWN_PERIODS: [&str; 3] = ["24h", "7d", "30d"];

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// UI preferences
    #[serde(default)]
    pub ui: UiConfig,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    /// Dark mode enabled
    pub dark_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Forecast API base, e.g. `https://api.open-meteo.com/v1`
    pub api_base_url: String,

    /// Geocoding API base
    pub geocoding_url: String,

    /// How long a fetched payload stays fresh, in milliseconds
    pub cache_ttl_ms: u64,

    /// Auto-refresh interval in milliseconds (0 disables the timer)
    pub refresh_interval_ms: u64,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// How long to wait for the position provider
    pub position_timeout_secs: u64,

    /// Chart window on startup: "24h", "7d" or "30d"
    pub default_period: String,

    /// Upper bound on cached payloads; unbounded when unset
    pub cache_max_entries: Option<usize>,

    /// City to search on startup instead of using the device position
    pub city: Option<String>,

    /// Fixed device position, used by headless sessions
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.open-meteo.com/v1".to_string(),
            geocoding_url: "https://geocoding-api.open-meteo.com/v1".to_string(),
            cache_ttl_ms: 300_000,
            refresh_interval_ms: 300_000,
            request_timeout_secs: 10,
            position_timeout_secs: 10,
            default_period: "24h".to_string(),
            cache_max_entries: None,
            city: None,
            latitude: None,
            longitude: None,
        }
    }
}

impl WeatherConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// `None` when the auto-refresh timer is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_ms > 0).then(|| Duration::from_millis(self.refresh_interval_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn position_timeout(&self) -> Duration {
        Duration::from_secs(self.position_timeout_secs)
    }

    /// Fixed coordinates, only when both halves are configured.
    pub fn fixed_position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clima");

        Self {
            config_dir,
            ui: UiConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", config_path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration from the user config directory and validate it,
    /// creating a default file if it doesn't exist
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    pub fn load_validated_from(config_path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(config_path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        validate_url(&weather.api_base_url, "weather.api_base_url", &mut result);
        validate_url(&weather.geocoding_url, "weather.geocoding_url", &mut result);

        if weather.cache_ttl_ms == 0 {
            result.add_warning("weather.cache_ttl_ms", "Caching disabled (0 ms TTL)");
        }

        if weather.refresh_interval_ms == 0 {
            result.add_warning(
                "weather.refresh_interval_ms",
                "Auto-refresh disabled (0 ms)",
            );
        } else if weather.refresh_interval_ms < 10_000 {
            result.add_warning(
                "weather.refresh_interval_ms",
                "Refreshing more than every 10 seconds may hit API rate limits",
            );
        }

        if weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if weather.position_timeout_secs == 0 {
            result.add_error(
                "weather.position_timeout_secs",
                "Position timeout must be greater than 0",
            );
        }

        if !KNOWN_PERIODS.contains(&weather.default_period.as_str()) {
            result.add_error(
                "weather.default_period",
                format!(
                    "Unknown period '{}', expected one of {}",
                    weather.default_period,
                    KNOWN_PERIODS.join(", ")
                ),
            );
        }

        if weather.cache_max_entries == Some(0) {
            result.add_error(
                "weather.cache_max_entries",
                "Cache bound must be at least 1 (omit it for an unbounded cache)",
            );
        }

        match (weather.latitude, weather.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("weather.latitude", "Latitude must be within -90..=90");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error("weather.longitude", "Longitude must be within -180..=180");
                }
            }
            (None, None) => {}
            _ => result.add_error(
                "weather.latitude",
                "Latitude and longitude must be set together",
            ),
        }

        if let Some(city) = &weather.city {
            if city.trim().is_empty() {
                result.add_warning("weather.city", "Empty city is ignored");
            }
        }

        result
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("no user config directory on this host".into()))?
            .join("clima");

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}
