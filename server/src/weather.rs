//! Weather co-location cache.
//!
//! Balloons cluster, and weather lookups are rate limited upstream. Positions
//! are bucketed onto a 0.5° grid, each occupied cell is looked up once (up to
//! a cap), and the sample is attached back onto every position in the cell.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use shared::models::{EnrichedObservation, Observation, WeatherSample};
use shared::payloads::EnrichMeta;
use std::collections::{HashMap, HashSet};
use std::future::Future;

const HOURLY_VARIABLES: &str = "temperature_2m,wind_speed_10m,wind_direction_10m";
const MS_TO_KPH: f64 = 3.6;

/// Grid cell key: coordinates snapped to the nearest half degree, e.g. `"10.0,20.0"`.
pub fn cell_key(lat: f64, lon: f64) -> String {
    format!("{:.1},{:.1}", snap_half_degree(lat), snap_half_degree(lon))
}

/// Round to the nearest 0.5°, halves rounding up.
fn snap_half_degree(v: f64) -> f64 {
    (v * 2.0 + 0.5).floor() / 2.0
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Option<HourlySeries>,
}

/// Parallel arrays indexed by `time`.
///
/// Kept as raw JSON so a stray non-numeric element only blanks its own field.
#[derive(Debug, Default, Deserialize)]
pub struct HourlySeries {
    time: Option<Vec<Value>>,
    #[serde(default)]
    temperature_2m: Value,
    #[serde(default)]
    wind_speed_10m: Value,
    #[serde(default)]
    wind_direction_10m: Value,
}

impl HourlySeries {
    /// Sample at the hour closest to `now`. `None` when the series has no
    /// time axis at all.
    pub fn nearest_sample(&self, now: DateTime<Utc>) -> Option<WeatherSample> {
        let times = self.time.as_ref()?;

        let mut best = 0;
        let mut best_diff = i64::MAX;
        for (i, raw) in times.iter().enumerate() {
            let Some(time) = raw.as_str().and_then(parse_hour) else {
                continue;
            };
            let diff = (time - now).num_milliseconds().abs();
            if diff < best_diff {
                best = i;
                best_diff = diff;
            }
        }

        Some(WeatherSample {
            temp_c: value_at(&self.temperature_2m, best),
            wind_kph: value_at(&self.wind_speed_10m, best).map(|ms| ms * MS_TO_KPH),
            wind_dir: value_at(&self.wind_direction_10m, best),
        })
    }
}

fn parse_hour(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

fn value_at(series: &Value, index: usize) -> Option<f64> {
    series
        .get(index)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

/// `start_hour`/`end_hour` bounds around `now`, formatted the way the
/// forecast API expects them.
pub fn hour_window(now: DateTime<Utc>, hours: i64) -> (String, String) {
    let format = |t: DateTime<Utc>| t.format("%Y-%m-%dT%H:00").to_string();
    (
        format(now - Duration::hours(hours)),
        format(now + Duration::hours(hours)),
    )
}

/// Hourly point forecasts from an Open-Meteo compatible API.
pub struct WeatherSource {
    client: reqwest::Client,
    url: String,
    window_hours: i64,
}

impl WeatherSource {
    pub fn new(url: &str, window_hours: i64) -> Self {
        WeatherSource {
            client: reqwest::Client::new(),
            url: url.to_string(),
            window_hours,
        }
    }

    async fn fetch_forecast(&self, lat: f64, lon: f64, now: DateTime<Utc>) -> Result<HourlySeries> {
        let (start, end) = hour_window(now, self.window_hours);
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("start_hour", start),
                ("end_hour", end),
                ("timezone", "UTC".to_string()),
                ("wind_speed_unit", "ms".to_string()),
            ])
            .send()
            .await
            .context("Forecast request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("Forecast API answered with status {}", status));
        }

        let payload: ForecastResponse = response
            .json()
            .await
            .context("Forecast decode failed")?;

        payload
            .hourly
            .ok_or_else(|| anyhow::anyhow!("Forecast has no hourly series"))
    }

    /// Weather near `(lat, lon)` at the hour closest to `now`, if any.
    pub async fn lookup(&self, lat: f64, lon: f64, now: DateTime<Utc>) -> Option<WeatherSample> {
        match self.fetch_forecast(lat, lon, now).await {
            Ok(hourly) => hourly.nearest_sample(now),
            Err(e) => {
                log::warn!("No weather for {:.2},{:.2}: {:#}", lat, lon, e);
                None
            }
        }
    }
}

/// One representative position per cell, first seen wins, in first-seen order.
pub fn distinct_cells(points: &[Observation]) -> Vec<(String, (f64, f64))> {
    let mut seen = HashSet::new();
    let mut cells = Vec::new();
    for p in points {
        let key = cell_key(p.lat, p.lon);
        if seen.insert(key.clone()) {
            cells.push((key, (p.lat, p.lon)));
        }
    }
    cells
}

/// Attach weather to every point, issuing at most `cap` lookups.
///
/// Points in cells beyond the cap, or whose lookup failed, get no sample.
pub async fn enrich<F, Fut>(
    points: Vec<Observation>,
    cap: usize,
    lookup: F,
) -> (Vec<EnrichedObservation>, EnrichMeta)
where
    F: Fn(f64, f64) -> Fut,
    Fut: Future<Output = Option<WeatherSample>>,
{
    let mut cells = distinct_cells(&points);
    if cells.len() > cap {
        log::info!(
            "{} weather cells occupied, looking up the first {}",
            cells.len(),
            cap
        );
        cells.truncate(cap);
    }

    let samples = join_all(cells.iter().map(|(_, (lat, lon))| lookup(*lat, *lon))).await;

    let by_cell: HashMap<String, WeatherSample> = cells
        .into_iter()
        .zip(samples)
        .filter_map(|((key, _), sample)| sample.map(|s| (key, s)))
        .collect();

    let meta = EnrichMeta {
        weather_cells: by_cell.len(),
        total_points: points.len(),
    };

    let enriched = points
        .into_iter()
        .map(|observation| {
            let wx = by_cell.get(&cell_key(observation.lat, observation.lon)).cloned();
            EnrichedObservation { observation, wx }
        })
        .collect();

    (enriched, meta)
}
