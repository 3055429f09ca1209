use anyhow::Result;
use clima_core::{AppError, Config, WeatherConfig};
use clima_weather::{
    FixedPosition, Location, LocationResolver, NoGeolocation, Period, RefreshScheduler,
    WeatherApiClient, WeatherOrchestrator, WeatherUpdate,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    clima_core::init()?;

    let (config, client) =
        startup().inspect_err(|e| tracing::error!("{} ({})", e.user_message(), e))?;
    tracing::info!("Config directory: {}", config.config_dir.display());
    let weather = &config.weather;

    if !client.check_connectivity().await {
        tracing::warn!("Weather API not reachable, starting with fallback data");
    }

    let location = initial_location(&client, weather).await;
    let period = weather
        .default_period
        .parse::<Period>()
        .unwrap_or_else(|e| {
            tracing::warn!("{}, using {}", e, Period::default());
            Period::default()
        });

    let orchestrator = Arc::new(WeatherOrchestrator::new(client, weather));
    let scheduler = Arc::new(RefreshScheduler::new(orchestrator, weather));
    scheduler.set_location(location);
    scheduler.set_period(period);

    if let Some(update) = scheduler.refresh_now().await {
        report(&update);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let runner = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        async move { scheduler.run(tx, shutdown).await }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                shutdown.cancel();
                break;
            }
            update = rx.recv() => match update {
                Some(update) => report(&update),
                None => break,
            },
        }
    }

    runner.await?;
    Ok(())
}

fn startup() -> Result<(Config, Arc<WeatherApiClient>), AppError> {
    let (config, _validation) = Config::load_validated()?;
    let client = WeatherApiClient::new(&config.weather)?;
    Ok((config, Arc::new(client)))
}

/// Configured city, then configured coordinates, then the default city.
async fn initial_location(client: &Arc<WeatherApiClient>, weather: &WeatherConfig) -> Location {
    let resolver = LocationResolver::new(client.clone(), weather);

    if let Some(city) = weather.city.as_deref() {
        match resolver.resolve_by_query(city).await {
            Ok(location) => return location,
            Err(e) => tracing::warn!("{}", e.user_message()),
        }
    }

    match weather.fixed_position() {
        Some((latitude, longitude)) => {
            resolver
                .resolve_by_position(&FixedPosition::new(latitude, longitude))
                .await
        }
        None => resolver.resolve_by_position(&NoGeolocation).await,
    }
}

fn report(update: &WeatherUpdate) {
    let bundle = &update.bundle;
    let current = &bundle.current;
    tracing::info!(
        "{} [{}]: {:.1}°C (feels {:.1}°C), humidity {:.0}%, wind {:.1} km/h, code {} ({:?})",
        update.location.display_name,
        update.trigger,
        current.temperature,
        current.apparent_temperature,
        current.humidity,
        current.wind_speed,
        current.weather_code,
        bundle.sources.current
    );

    for day in &bundle.daily.days {
        tracing::info!(
            "  {}: {:.0}°C / {:.0}°C, rain {:.0}%",
            day.date,
            day.temp_max,
            day.temp_min,
            day.precipitation_probability
        );
    }

    tracing::info!(
        "  {} hourly samples for {} ({:?})",
        bundle.hourly.len(),
        update.period,
        bundle.sources.hourly
    );
}
