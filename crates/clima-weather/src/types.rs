use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A resolved place. Replaced wholesale on every new search or position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, display_name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            display_name: display_name.into(),
        }
    }
}

/// Chart window for the hourly series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl Period {
    /// Number of hourly samples shown for this window.
    pub fn hours(self) -> usize {
        match self {
            Period::Day => 24,
            Period::Week => 24 * 7,
            Period::Month => 24 * 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "24h",
            Period::Week => "7d",
            Period::Month => "30d",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown period '{0}' (expected 24h, 7d or 30d)")]
pub struct ParsePeriodError(pub String);

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "24h" => Ok(Period::Day),
            "7d" => Ok(Period::Week),
            "30d" => Ok(Period::Month),
            other => Err(ParsePeriodError(other.to_string())),
        }
    }
}

/// The three independently fetched and cached kinds of weather data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Current,
    Forecast,
    Hourly,
}

impl DataKind {
    fn prefix(self) -> &'static str {
        match self {
            DataKind::Current => "current",
            DataKind::Forecast => "forecast",
            DataKind::Hourly => "hourly",
        }
    }
}

/// Fingerprint of a request, e.g. `hourly_-23.5505_-46.6333_7d`.
///
/// The period only takes part for [`DataKind::Hourly`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(kind: DataKind, latitude: f64, longitude: f64, period: Option<Period>) -> Self {
        let mut key = format!("{}_{}_{}", kind.prefix(), latitude, longitude);
        if let (DataKind::Hourly, Some(period)) = (kind, period) {
            key.push('_');
            key.push_str(period.as_str());
        }
        Self(key)
    }

    pub fn current(location: &Location) -> Self {
        Self::new(DataKind::Current, location.latitude, location.longitude, None)
    }

    pub fn forecast(location: &Location) -> Self {
        Self::new(DataKind::Forecast, location.latitude, location.longitude, None)
    }

    pub fn hourly(location: &Location, period: Period) -> Self {
        Self::new(
            DataKind::Hourly,
            location.latitude,
            location.longitude,
            Some(period),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub weather_code: i32,
    pub cloud_cover: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
}

/// One day of the daily forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub weather_code: i32,
    pub precipitation_probability: f64,
}

/// Always exactly [`DailyForecast::DAYS`] days, today first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub days: Vec<DayForecast>,
}

impl DailyForecast {
    pub const DAYS: usize = 7;
}

/// One hourly sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HourlySeries {
    pub samples: Vec<HourlySample>,
}

impl HourlySeries {
    /// The first `period.hours()` samples (or all of them, if fewer exist).
    pub fn window(&self, period: Period) -> HourlySeries {
        let take = period.hours().min(self.samples.len());
        HourlySeries {
            samples: self.samples[..take].to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What the cache stores: one of the three data kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPayload {
    Current(CurrentWeather),
    Forecast(DailyForecast),
    Hourly(HourlySeries),
}

/// Moves a concrete payload in and out of [`DataPayload`].
pub trait CachedPayload: Clone {
    fn into_payload(self) -> DataPayload;
    fn from_payload(payload: &DataPayload) -> Option<&Self>;
}

impl CachedPayload for CurrentWeather {
    fn into_payload(self) -> DataPayload {
        DataPayload::Current(self)
    }

    fn from_payload(payload: &DataPayload) -> Option<&Self> {
        match payload {
            DataPayload::Current(current) => Some(current),
            _ => None,
        }
    }
}

impl CachedPayload for DailyForecast {
    fn into_payload(self) -> DataPayload {
        DataPayload::Forecast(self)
    }

    fn from_payload(payload: &DataPayload) -> Option<&Self> {
        match payload {
            DataPayload::Forecast(daily) => Some(daily),
            _ => None,
        }
    }
}

impl CachedPayload for HourlySeries {
    fn into_payload(self) -> DataPayload {
        DataPayload::Hourly(self)
    }

    fn from_payload(payload: &DataPayload) -> Option<&Self> {
        match payload {
            DataPayload::Hourly(hourly) => Some(hourly),
            _ => None,
        }
    }
}

/// Where a bundle part came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Live,
    Cached,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub current: Source,
    pub daily: Source,
    pub hourly: Source,
}

/// Result of one orchestrated load. Always complete; parts may be synthetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherBundle {
    pub current: CurrentWeather,
    pub daily: DailyForecast,
    pub hourly: HourlySeries,
    pub sources: Sources,
}

impl WeatherBundle {
    /// True if any part had to be generated.
    pub fn is_degraded(&self) -> bool {
        [self.sources.current, self.sources.daily, self.sources.hourly].contains(&Source::Fallback)
    }
}

/// Position provider errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
}
