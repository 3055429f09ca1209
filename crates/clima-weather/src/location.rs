//! Resolve a search query or the device position to a [`Location`].

use clima_core::{WeatherConfig, WeatherError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cities;
use crate::client::WeatherApiClient;
use crate::types::{Location, LocationError};

pub const CURRENT_LOCATION_NAME: &str = "Current Location";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Hints passed to the position provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
}

/// Best-effort device position. May fail or never answer.
pub trait PositionProvider {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> impl Future<Output = Result<Coordinates, LocationError>> + Send;
}

/// A position known up front (e.g. from config).
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

impl FixedPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self(Coordinates {
            latitude,
            longitude,
        })
    }
}

impl PositionProvider for FixedPosition {
    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// No geolocation capability on this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

impl PositionProvider for NoGeolocation {
    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

pub struct LocationResolver {
    client: Arc<WeatherApiClient>,
    position_timeout: Duration,
    defaults: Vec<Location>,
}

impl LocationResolver {
    pub fn new(client: Arc<WeatherApiClient>, config: &WeatherConfig) -> Self {
        Self {
            client,
            position_timeout: config.position_timeout(),
            defaults: cities::default_locations(),
        }
    }

    /// Where to go when the device position is unknown.
    pub fn default_location(&self) -> Location {
        self.defaults
            .first()
            .cloned()
            .unwrap_or_else(|| cities::CITIES[0].to_location())
    }

    /// Geocode `text`, falling back to the built-in city table.
    pub async fn resolve_by_query(&self, text: &str) -> Result<Location, WeatherError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(WeatherError::EmptyQuery);
        }

        match self.client.search(query).await {
            Ok(hits) => {
                if let Some(hit) = hits.into_iter().next() {
                    let location = hit.into_location();
                    tracing::info!("Geocoded '{}' to {}", query, location.display_name);
                    return Ok(location);
                }
                tracing::info!("No geocoding results for '{}', trying city table", query);
            }
            Err(e) => {
                tracing::warn!("Geocoding '{}' failed, trying city table: {}", query, e);
            }
        }

        match cities::lookup(query) {
            Some(city) => {
                tracing::info!("Matched '{}' to {} from city table", query, city.name);
                Ok(city.to_location())
            }
            None => Err(WeatherError::CityNotFound(query.to_string())),
        }
    }

    /// Ask the provider for a position; any failure yields the default location.
    pub async fn resolve_by_position<P: PositionProvider>(&self, provider: &P) -> Location {
        let options = PositionOptions {
            timeout: self.position_timeout,
            high_accuracy: false,
        };

        let result = tokio::time::timeout(self.position_timeout, provider.current_position(options))
            .await
            .unwrap_or(Err(LocationError::Timeout));

        match result {
            Ok(coords) => {
                tracing::info!("Got location: {}, {}", coords.latitude, coords.longitude);
                Location::new(coords.latitude, coords.longitude, CURRENT_LOCATION_NAME)
            }
            Err(e) => {
                let fallback = self.default_location();
                tracing::warn!(
                    "Geolocation failed ({}), using default location {}",
                    e,
                    fallback.display_name
                );
                fallback
            }
        }
    }
}
