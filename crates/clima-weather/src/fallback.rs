//! Synthetic weather used when a live fetch fails.
//!
//! Payloads have the same shape as real ones (7 days, one hourly sample per
//! hour of the period) so nothing downstream has to branch on where they came from.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{CurrentWeather, DailyForecast, DayForecast, HourlySample, HourlySeries, Period};

/// Codes for clear through overcast.
pub const PLAUSIBLE_CODES: [i32; 4] = [0, 1, 2, 3];

fn plausible_code<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    PLAUSIBLE_CODES.choose(rng).copied().unwrap_or(0)
}

pub fn current_weather<R: Rng + ?Sized>(rng: &mut R, now: NaiveDateTime) -> CurrentWeather {
    let temperature = f64::from(rng.gen_range(10..=35_i32));
    CurrentWeather {
        time: now,
        temperature,
        apparent_temperature: temperature + f64::from(rng.gen_range(-2..=2_i32)),
        humidity: f64::from(rng.gen_range(40..80_i32)),
        precipitation: 0.0,
        weather_code: plausible_code(rng),
        cloud_cover: f64::from(rng.gen_range(0..=100_i32)),
        wind_speed: f64::from(rng.gen_range(5..25_i32)),
        wind_direction: f64::from(rng.gen_range(0..360_i32)),
    }
}

pub fn daily_forecast<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> DailyForecast {
    let days = (0..DailyForecast::DAYS as i64)
        .map(|offset| DayForecast {
            date: today + Duration::days(offset),
            temp_max: f64::from(rng.gen_range(20..35_i32)),
            temp_min: f64::from(rng.gen_range(10..20_i32)),
            weather_code: plausible_code(rng),
            precipitation_probability: f64::from(rng.gen_range(0..30_i32)),
        })
        .collect();

    DailyForecast { days }
}

/// One sample per hour starting at the top of `now`'s hour.
pub fn hourly_series<R: Rng + ?Sized>(
    rng: &mut R,
    now: NaiveDateTime,
    period: Period,
) -> HourlySeries {
    let start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let samples = (0..period.hours() as i64)
        .map(|offset| HourlySample {
            time: start + Duration::hours(offset),
            temperature: f64::from(rng.gen_range(20..30_i32)),
            humidity: f64::from(rng.gen_range(40..80_i32)),
            wind_speed: f64::from(rng.gen_range(5..25_i32)),
            precipitation: rng.gen_range(0.0..2.0),
        })
        .collect();

    HourlySeries { samples }
}
