//! Open-Meteo forecast and geocoding client.
//!
//! Every call either returns a fully parsed payload or fails with
//! `WeatherError::Network` / `WeatherError::Api`. Retries are the caller's concern.

use chrono::{NaiveDate, NaiveDateTime};
use clima_core::{ReqwestErrorExt, WeatherConfig, WeatherError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::types::{
    CurrentWeather, DailyForecast, DayForecast, HourlySample, HourlySeries, Location,
};

pub const FORECAST_API_BASE: &str = "https://api.open-meteo.com/v1";
pub const GEOCODING_API_BASE: &str = "https://geocoding-api.open-meteo.com/v1";

pub const CURRENT_FIELDS: &str = concat!(
    "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,",
    "weather_code,cloud_cover,wind_speed_10m,wind_direction_10m"
);
pub const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max";
pub const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("Clima/", env!("CARGO_PKG_VERSION"));

// Open-Meteo JSON response structures

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: ApiCurrent,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    precipitation: f64,
    weather_code: i32,
    #[serde(default)]
    cloud_cover: Option<f64>,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: ApiDaily,
}

#[derive(Debug, Deserialize)]
struct ApiDaily {
    time: Vec<String>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    weather_code: Vec<i32>,
    precipitation_probability_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    hourly: ApiHourly,
}

#[derive(Debug, Deserialize)]
struct ApiHourly {
    time: Vec<String>,
    temperature_2m: Vec<f64>,
    relative_humidity_2m: Vec<f64>,
    wind_speed_10m: Vec<f64>,
    precipitation: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Option<Vec<GeocodeHit>>,
}

/// One candidate returned by the geocoding search, in API rank order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeocodeHit {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
}

impl GeocodeHit {
    /// `"Name, Country"`, or just the name when the API gives no country.
    pub fn into_location(self) -> Location {
        let display_name = match self.country.as_deref().filter(|c| !c.is_empty()) {
            Some(country) => format!("{}, {}", self.name, country),
            None => self.name,
        };
        Location::new(self.latitude, self.longitude, display_name)
    }
}

/// Open-Meteo times come without seconds when `timezone=auto`.
fn parse_time(raw: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| WeatherError::Api(format!("Invalid time '{}': {}", raw, e)))
}

fn parse_date(raw: &str) -> Result<NaiveDate, WeatherError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| WeatherError::Api(format!("Invalid date '{}': {}", raw, e)))
}

fn check_lengths(what: &str, expected: usize, lengths: &[usize]) -> Result<(), WeatherError> {
    if lengths.iter().all(|&len| len == expected) {
        Ok(())
    } else {
        Err(WeatherError::Api(format!(
            "{} arrays have mismatched lengths: time={} others={:?}",
            what, expected, lengths
        )))
    }
}

impl TryFrom<ApiCurrent> for CurrentWeather {
    type Error = WeatherError;

    fn try_from(api: ApiCurrent) -> Result<Self, Self::Error> {
        Ok(CurrentWeather {
            time: parse_time(&api.time)?,
            temperature: api.temperature_2m,
            apparent_temperature: api.apparent_temperature,
            humidity: api.relative_humidity_2m,
            precipitation: api.precipitation,
            weather_code: api.weather_code,
            cloud_cover: api.cloud_cover.unwrap_or(0.0),
            wind_speed: api.wind_speed_10m,
            wind_direction: api.wind_direction_10m,
        })
    }
}

impl TryFrom<ApiDaily> for DailyForecast {
    type Error = WeatherError;

    fn try_from(api: ApiDaily) -> Result<Self, Self::Error> {
        check_lengths(
            "Daily",
            api.time.len(),
            &[
                api.temperature_2m_max.len(),
                api.temperature_2m_min.len(),
                api.weather_code.len(),
                api.precipitation_probability_max.len(),
            ],
        )?;

        if api.time.len() < DailyForecast::DAYS {
            return Err(WeatherError::Api(format!(
                "Expected {} forecast days, got {}",
                DailyForecast::DAYS,
                api.time.len()
            )));
        }

        let days = (0..DailyForecast::DAYS)
            .map(|i| {
                Ok(DayForecast {
                    date: parse_date(&api.time[i])?,
                    temp_max: api.temperature_2m_max[i],
                    temp_min: api.temperature_2m_min[i],
                    weather_code: api.weather_code[i],
                    precipitation_probability: api.precipitation_probability_max[i].unwrap_or(0.0),
                })
            })
            .collect::<Result<Vec<_>, WeatherError>>()?;

        Ok(DailyForecast { days })
    }
}

impl TryFrom<ApiHourly> for HourlySeries {
    type Error = WeatherError;

    fn try_from(api: ApiHourly) -> Result<Self, Self::Error> {
        check_lengths(
            "Hourly",
            api.time.len(),
            &[
                api.temperature_2m.len(),
                api.relative_humidity_2m.len(),
                api.wind_speed_10m.len(),
                api.precipitation.len(),
            ],
        )?;

        let samples = api
            .time
            .iter()
            .enumerate()
            .map(|(i, time)| {
                Ok(HourlySample {
                    time: parse_time(time)?,
                    temperature: api.temperature_2m[i],
                    humidity: api.relative_humidity_2m[i],
                    wind_speed: api.wind_speed_10m[i],
                    precipitation: api.precipitation[i],
                })
            })
            .collect::<Result<Vec<_>, WeatherError>>()?;

        Ok(HourlySeries { samples })
    }
}

#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    client: Client,
    base_url: String,
    geocoding_url: String,
}

impl WeatherApiClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::build(
            &config.api_base_url,
            &config.geocoding_url,
            config.request_timeout(),
        )
    }

    /// Client against custom endpoints with the default timeout.
    pub fn with_base_urls(base_url: &str, geocoding_url: &str) -> Result<Self, WeatherError> {
        Self::build(
            base_url,
            geocoding_url,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    fn build(base_url: &str, geocoding_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            geocoding_url: geocoding_url.trim_end_matches('/').to_string(),
        })
    }

    fn forecast_url(&self, latitude: f64, longitude: f64, section: &str, fields: &str) -> String {
        format!(
            "{}/forecast?latitude={}&longitude={}&{}={}&timezone=auto",
            self.base_url, latitude, longitude, section, fields
        )
    }

    /// Current conditions at a point.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentWeather, WeatherError> {
        let url = self.forecast_url(latitude, longitude, "current", CURRENT_FIELDS);
        let body: CurrentResponse = self.get_json(&url).await?;
        CurrentWeather::try_from(body.current)
    }

    /// The next 7 days; extra days are dropped, fewer is an error.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_daily_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<DailyForecast, WeatherError> {
        let url = self.forecast_url(latitude, longitude, "daily", DAILY_FIELDS);
        let body: DailyResponse = self.get_json(&url).await?;
        DailyForecast::try_from(body.daily)
    }

    /// Every hourly sample the API returns.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_hourly_series(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<HourlySeries, WeatherError> {
        let url = self.forecast_url(latitude, longitude, "hourly", HOURLY_FIELDS);
        let body: HourlyResponse = self.get_json(&url).await?;
        HourlySeries::try_from(body.hourly)
    }

    /// Geocoding candidates for `name`, best first. Empty when nothing matched.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, name: &str) -> Result<Vec<GeocodeHit>, WeatherError> {
        let url = format!(
            "{}/search?name={}&count=5&language=pt&format=json",
            self.geocoding_url,
            urlencoding::encode(name)
        );
        let body: GeocodeResponse = self.get_json(&url).await?;
        Ok(body.results.unwrap_or_default())
    }

    /// The top geocoding hit, or `None` if there is none or the call failed.
    pub async fn geocode(&self, name: &str) -> Option<Location> {
        match self.search(name).await {
            Ok(hits) => hits.into_iter().next().map(GeocodeHit::into_location),
            Err(e) => {
                tracing::debug!("Geocoding '{}' failed: {}", name, e);
                None
            }
        }
    }

    /// Cheap reachability check against the forecast endpoint.
    pub async fn check_connectivity(&self) -> bool {
        let url = format!(
            "{}/forecast?latitude=0&longitude=0&current=temperature_2m&timezone=auto",
            self.base_url
        );

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Weather API reachable");
                true
            }
            Ok(response) => {
                tracing::warn!("Weather API returned status {}", response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Weather API unreachable: {}", e);
                false
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| e.into_network_error())?;
            serde_json::from_slice(&bytes)
                .map_err(|e| WeatherError::Api(format!("JSON parse error: {}", e)))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(WeatherError::Api(format!("{}: {}", status, text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clima_core::NetworkError;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn daily_body(days: usize) -> serde_json::Value {
        let time: Vec<String> = (1..=days).map(|d| format!("2026-10-{:02}", d)).collect();
        serde_json::json!({
            "daily": {
                "time": time,
                "temperature_2m_max": vec![30.5; days],
                "temperature_2m_min": vec![18.0; days],
                "weather_code": vec![61; days],
                "precipitation_probability_max": vec![40; days],
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_current() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("latitude", "-23.5505"))
            .and(query_param("current", CURRENT_FIELDS))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": {
                    "time": "2026-10-19T14:00",
                    "temperature_2m": 24.3,
                    "relative_humidity_2m": 61,
                    "apparent_temperature": 25.1,
                    "precipitation": 0.0,
                    "weather_code": 2,
                    "cloud_cover": 45,
                    "wind_speed_10m": 12.4,
                    "wind_direction_10m": 140
                }
            })))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let current = client.fetch_current(-23.5505, -46.6333).await.unwrap();

        assert_eq!(current.temperature, 24.3);
        assert_eq!(current.humidity, 61.0);
        assert_eq!(current.weather_code, 2);
        assert_eq!(current.wind_direction, 140.0);
        assert_eq!(current.time.to_string(), "2026-10-19 14:00:00");
    }

    #[tokio::test]
    async fn test_fetch_daily_truncates_to_seven() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("daily", DAILY_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(daily_body(16)))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let daily = client.fetch_daily_forecast(0.0, 0.0).await.unwrap();

        assert_eq!(daily.days.len(), 7);
        assert_eq!(daily.days[0].date.to_string(), "2026-10-01");
        assert_eq!(daily.days[6].date.to_string(), "2026-10-07");
        assert_eq!(daily.days[0].precipitation_probability, 40.0);
    }

    #[tokio::test]
    async fn test_fetch_daily_too_few_days_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(daily_body(3)))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let result = client.fetch_daily_forecast(0.0, 0.0).await;

        assert!(matches!(result, Err(WeatherError::Api(_))));
    }

    #[tokio::test]
    async fn test_fetch_daily_null_probability_defaults_to_zero() {
        let mock_server = MockServer::start().await;
        let mut body = daily_body(7);
        body["daily"]["precipitation_probability_max"][6] = serde_json::Value::Null;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let daily = client.fetch_daily_forecast(0.0, 0.0).await.unwrap();

        assert_eq!(daily.days[6].precipitation_probability, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_hourly_keeps_full_range() {
        let mock_server = MockServer::start().await;
        let time: Vec<String> = (0..48)
            .map(|h| format!("2026-10-{:02}T{:02}:00", 19 + h / 24, h % 24))
            .collect();

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("hourly", HOURLY_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hourly": {
                    "time": time,
                    "temperature_2m": vec![21.0; 48],
                    "relative_humidity_2m": vec![70; 48],
                    "wind_speed_10m": vec![8.5; 48],
                    "precipitation": vec![0.2; 48],
                }
            })))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let hourly = client.fetch_hourly_series(0.0, 0.0).await.unwrap();

        assert_eq!(hourly.len(), 48);
        assert_eq!(hourly.samples[47].time.to_string(), "2026-10-20 23:00:00");
    }

    #[tokio::test]
    async fn test_fetch_hourly_mismatched_arrays_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hourly": {
                    "time": ["2026-10-19T00:00", "2026-10-19T01:00"],
                    "temperature_2m": [21.0],
                    "relative_humidity_2m": [70, 71],
                    "wind_speed_10m": [8.5, 8.0],
                    "precipitation": [0.0, 0.0],
                }
            })))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let result = client.fetch_hourly_series(0.0, 0.0).await;

        assert!(matches!(result, Err(WeatherError::Api(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let err = client.fetch_current(0.0, 0.0).await.unwrap_err();

        assert!(matches!(err, WeatherError::Api(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let result = client.fetch_current(0.0, 0.0).await;

        assert!(matches!(result, Err(WeatherError::Api(msg)) if msg.contains("JSON")));
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        // Nothing listens on port 9 (discard) in the test environment
        let client =
            WeatherApiClient::with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9").unwrap();
        let result = client.fetch_current(0.0, 0.0).await;

        assert!(matches!(result, Err(WeatherError::Network(NetworkError::ConnectionFailed(_)))));
    }

    #[tokio::test]
    async fn test_geocode_returns_first_result() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("name", "Curitiba"))
            .and(query_param("count", "5"))
            .and(query_param("language", "pt"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {
                        "name": "Curitiba",
                        "latitude": -25.4278,
                        "longitude": -49.2731,
                        "country": "Brasil"
                    },
                    {
                        "name": "Curitibanos",
                        "latitude": -27.2825,
                        "longitude": -50.5844,
                        "country": "Brasil"
                    }
                ]
            })))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let location = client.geocode("Curitiba").await.unwrap();

        assert_eq!(location, Location::new(-25.4278, -49.2731, "Curitiba, Brasil"));
    }

    #[tokio::test]
    async fn test_geocode_encodes_query() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("name", "São Luís"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"name": "São Luís", "latitude": -2.53, "longitude": -44.30}]
            })))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        let location = client.geocode("São Luís").await.unwrap();

        assert_eq!(location.display_name, "São Luís");
    }

    #[tokio::test]
    async fn test_geocode_no_results_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generationtime_ms": 0.5
            })))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        assert!(client.geocode("Nowhereistan").await.is_none());
        assert!(client.search("Nowhereistan").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geocode_failure_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        assert!(client.geocode("Recife").await.is_none());
    }

    #[tokio::test]
    async fn test_check_connectivity() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("current", "temperature_2m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let client =
            WeatherApiClient::with_base_urls(&mock_server.uri(), &mock_server.uri()).unwrap();
        assert!(client.check_connectivity().await);

        let offline =
            WeatherApiClient::with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9").unwrap();
        assert!(!offline.check_connectivity().await);
    }
}
