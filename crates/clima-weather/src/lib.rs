//! Weather data layer for Clima
//!
//! Fetches current conditions, a 7-day forecast and an hourly series from
//! Open-Meteo, caches them per location, and substitutes synthetic data
//! whenever the network is unavailable.

pub mod cache;
pub mod cities;
pub mod client;
pub mod fallback;
pub mod location;
pub mod orchestrator;
pub mod scheduler;
pub mod types;

pub use cache::{Clock, FreshnessCache, ManualClock, SystemClock};
pub use client::{GeocodeHit, WeatherApiClient};
pub use location::{
    Coordinates, FixedPosition, LocationResolver, NoGeolocation, PositionOptions, PositionProvider,
};
pub use orchestrator::WeatherOrchestrator;
pub use scheduler::{RefreshScheduler, WeatherUpdate};
pub use types::*;
