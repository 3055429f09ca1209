//! Cache-or-fetch for the three weather data kinds of one location.
//!
//! `load_all` never fails. Each kind independently resolves to a fresh cache
//! hit, a live fetch (which is then cached), or synthetic data (never cached).

use chrono::Local;
use clima_core::{WeatherConfig, WeatherError};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

use crate::cache::{Clock, FreshnessCache, SystemClock};
use crate::client::WeatherApiClient;
use crate::fallback;
use crate::types::{
    CacheKey, CachedPayload, CurrentWeather, DailyForecast, HourlySeries, Location, Period, Source,
    Sources, WeatherBundle,
};

pub struct WeatherOrchestrator {
    client: Arc<WeatherApiClient>,
    cache: Mutex<FreshnessCache>,
    clock: Arc<dyn Clock>,
}

impl WeatherOrchestrator {
    pub fn new(client: Arc<WeatherApiClient>, config: &WeatherConfig) -> Self {
        let cache =
            FreshnessCache::new(config.cache_ttl()).with_max_entries(config.cache_max_entries);
        Self::with_cache(client, cache, Arc::new(SystemClock))
    }

    pub fn with_cache(
        client: Arc<WeatherApiClient>,
        cache: FreshnessCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            cache: Mutex::new(cache),
            clock,
        }
    }

    /// Load current, daily and hourly data concurrently.
    pub async fn load_all(&self, location: &Location, period: Period) -> WeatherBundle {
        tracing::info!(
            "Loading weather for {} ({}, {}) over {}",
            location.display_name,
            location.latitude,
            location.longitude,
            period
        );

        let (current, daily, hourly) = tokio::join!(
            self.load_current(location),
            self.load_daily(location),
            self.load_hourly(location, period),
        );

        WeatherBundle {
            sources: Sources {
                current: current.1,
                daily: daily.1,
                hourly: hourly.1,
            },
            current: current.0,
            daily: daily.0,
            hourly: hourly.0,
        }
    }

    pub async fn load_current(&self, location: &Location) -> (CurrentWeather, Source) {
        self.cached_or_fetch(
            CacheKey::current(location),
            self.client
                .fetch_current(location.latitude, location.longitude),
            || fallback::current_weather(&mut rand::thread_rng(), self.local_now()),
        )
        .await
    }

    pub async fn load_daily(&self, location: &Location) -> (DailyForecast, Source) {
        self.cached_or_fetch(
            CacheKey::forecast(location),
            self.client
                .fetch_daily_forecast(location.latitude, location.longitude),
            || fallback::daily_forecast(&mut rand::thread_rng(), self.local_now().date()),
        )
        .await
    }

    /// Hourly series cut to the period window. Also used alone when only the
    /// chart period changes.
    pub async fn load_hourly(&self, location: &Location, period: Period) -> (HourlySeries, Source) {
        let (series, source) = self
            .cached_or_fetch(
                CacheKey::hourly(location, period),
                self.client
                    .fetch_hourly_series(location.latitude, location.longitude),
                || fallback::hourly_series(&mut rand::thread_rng(), self.local_now(), period),
            )
            .await;

        (series.window(period), source)
    }

    /// Drop every cached payload.
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }

    fn local_now(&self) -> chrono::NaiveDateTime {
        self.clock.now().with_timezone(&Local).naive_local()
    }

    fn cached<T: CachedPayload>(&self, key: &CacheKey) -> Option<T> {
        let cache = self.cache.lock();
        cache
            .get(key, self.clock.now())
            .and_then(|entry| T::from_payload(&entry.payload))
            .cloned()
    }

    async fn cached_or_fetch<T, Fut, Fb>(
        &self,
        key: CacheKey,
        fetch: Fut,
        fallback: Fb,
    ) -> (T, Source)
    where
        T: CachedPayload,
        Fut: Future<Output = Result<T, WeatherError>>,
        Fb: FnOnce() -> T,
    {
        if let Some(hit) = self.cached::<T>(&key) {
            tracing::debug!("Using cached {}", key);
            return (hit, Source::Cached);
        }

        match fetch.await {
            Ok(data) => {
                // Full payload first, then a single insert
                let payload = data.clone().into_payload();
                self.cache.lock().put(key, payload, self.clock.now());
                (data, Source::Live)
            }
            Err(e) => {
                tracing::warn!("Fetch for {} failed, using fallback data: {}", key, e);
                (fallback(), Source::Fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::Utc;
    use std::time::Duration;

    fn offline_orchestrator(clock: Arc<ManualClock>) -> WeatherOrchestrator {
        let client =
            WeatherApiClient::with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9").unwrap();
        WeatherOrchestrator::with_cache(Arc::new(client), FreshnessCache::default(), clock)
    }

    #[tokio::test]
    async fn test_total_failure_still_returns_full_bundle() {
        let orchestrator = offline_orchestrator(Arc::new(ManualClock::new(Utc::now())));
        let location = Location::new(-23.5505, -46.6333, "São Paulo");

        for period in [Period::Day, Period::Week, Period::Month] {
            let bundle = orchestrator.load_all(&location, period).await;
            assert_eq!(bundle.daily.days.len(), 7);
            assert_eq!(bundle.hourly.len(), period.hours());
            assert!(bundle.is_degraded());
            assert_eq!(bundle.sources.current, Source::Fallback);
            assert_eq!(bundle.sources.daily, Source::Fallback);
            assert_eq!(bundle.sources.hourly, Source::Fallback);
        }
    }

    #[tokio::test]
    async fn test_fallbacks_are_not_cached() {
        let orchestrator = offline_orchestrator(Arc::new(ManualClock::new(Utc::now())));
        let location = Location::new(0.0, 0.0, "Null Island");

        orchestrator.load_all(&location, Period::Day).await;
        orchestrator.load_all(&location, Period::Day).await;

        assert_eq!(orchestrator.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_cached_payload_served_until_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let orchestrator = offline_orchestrator(clock.clone());
        let location = Location::new(0.0, 0.0, "Null Island");

        let seeded = fallback::daily_forecast(&mut rand::thread_rng(), Local::now().date_naive());
        orchestrator.cache.lock().put(
            CacheKey::forecast(&location),
            seeded.clone().into_payload(),
            clock.now(),
        );

        let (daily, source) = orchestrator.load_daily(&location).await;
        assert_eq!(source, Source::Cached);
        assert_eq!(daily, seeded);

        clock.advance(Duration::from_millis(300_000));
        let (_, source) = orchestrator.load_daily(&location).await;
        assert_eq!(source, Source::Fallback);
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let orchestrator = offline_orchestrator(clock.clone());
        let location = Location::new(0.0, 0.0, "Null Island");

        orchestrator.cache.lock().put(
            CacheKey::hourly(&location, Period::Day),
            HourlySeries::default().into_payload(),
            clock.now(),
        );
        assert_eq!(orchestrator.cached_entries(), 1);

        orchestrator.invalidate();
        assert_eq!(orchestrator.cached_entries(), 0);
    }
}
