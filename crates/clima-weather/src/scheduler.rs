//! Periodic and manual refresh of the active location.
//!
//! A trigger that arrives while a load is in flight is dropped. Changing the
//! location or period mid-load does not cancel anything; the next trigger
//! picks up the new values.

use chrono::{DateTime, Utc};
use clima_core::{RefreshState, RefreshTrigger, WeatherConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::WeatherOrchestrator;
use crate::types::{Location, Period, WeatherBundle};

/// A completed load, ready for the presentation layer.
#[derive(Debug, Clone)]
pub struct WeatherUpdate {
    pub location: Location,
    pub period: Period,
    pub bundle: WeatherBundle,
    pub trigger: RefreshTrigger,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    state: RefreshState,
    location: Option<Location>,
    period: Period,
    last_updated: Option<DateTime<Utc>>,
}

pub struct RefreshScheduler {
    orchestrator: Arc<WeatherOrchestrator>,
    inner: Mutex<SchedulerState>,
    interval: Option<Duration>,
}

/// Puts the scheduler back to Idle when the load finishes or is dropped.
struct LoadGuard<'a> {
    inner: &'a Mutex<SchedulerState>,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.state = inner.state.on_load_done();
    }
}

impl RefreshScheduler {
    pub fn new(orchestrator: Arc<WeatherOrchestrator>, config: &WeatherConfig) -> Self {
        Self::with_interval(orchestrator, config.refresh_interval())
    }

    /// `None` disables the timer; manual refreshes still work.
    pub fn with_interval(
        orchestrator: Arc<WeatherOrchestrator>,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            orchestrator,
            inner: Mutex::new(SchedulerState::default()),
            interval,
        }
    }

    pub fn set_location(&self, location: Location) {
        tracing::info!("Active location set to {}", location.display_name);
        self.inner.lock().location = Some(location);
    }

    pub fn set_period(&self, period: Period) {
        tracing::debug!("Active period set to {}", period);
        self.inner.lock().period = period;
    }

    pub fn location(&self) -> Option<Location> {
        self.inner.lock().location.clone()
    }

    pub fn period(&self) -> Period {
        self.inner.lock().period
    }

    pub fn state(&self) -> RefreshState {
        self.inner.lock().state
    }

    /// When the last load completed.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_updated
    }

    /// Run one load unless one is already in flight or no location is set.
    pub async fn trigger(&self, trigger: RefreshTrigger) -> Option<WeatherUpdate> {
        let (location, period) = {
            let mut inner = self.inner.lock();
            if !inner.state.can_start() {
                tracing::debug!("Refresh ({}) dropped: load already in flight", trigger);
                return None;
            }
            let Some(location) = inner.location.clone() else {
                tracing::debug!("Refresh ({}) skipped: no location yet", trigger);
                return None;
            };
            inner.state = inner.state.on_trigger(trigger);
            (location, inner.period)
        };

        let _guard = LoadGuard { inner: &self.inner };
        let bundle = self.orchestrator.load_all(&location, period).await;
        let completed_at = Utc::now();
        self.inner.lock().last_updated = Some(completed_at);

        let note = if bundle.is_degraded() {
            " with fallback data"
        } else {
            ""
        };
        tracing::info!("Refresh ({}) for {} complete{}", trigger, location.display_name, note);

        Some(WeatherUpdate {
            location,
            period,
            bundle,
            trigger,
            completed_at,
        })
    }

    pub async fn refresh_now(&self) -> Option<WeatherUpdate> {
        self.trigger(RefreshTrigger::Manual).await
    }

    /// Tick until `shutdown`, sending each completed load to `sink`.
    ///
    /// Ticks missed while a load runs are skipped rather than bunched up.
    pub async fn run(
        &self,
        sink: mpsc::UnboundedSender<WeatherUpdate>,
        shutdown: CancellationToken,
    ) {
        let Some(period) = self.interval else {
            tracing::info!("Auto-refresh disabled");
            shutdown.cancelled().await;
            return;
        };

        tracing::info!("Auto-refresh every {:?}", period);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Auto-refresh stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(update) = self.trigger(RefreshTrigger::Tick).await {
                        if sink.send(update).is_err() {
                            tracing::info!("Update receiver closed, stopping auto-refresh");
                            break;
                        }
                    }
                }
            }
        }
    }
}
