use anyhow::{Context, Result};
use serde::Deserialize;

use crate::tracks::TrackParams;

/// Hourly buckets published by the upstream feed (00.json through 23.json).
pub const MAX_BUCKETS: usize = 24;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,
    #[serde(default = "default_weather_url")]
    pub weather_url: String,
    #[serde(default = "default_bucket_count")]
    pub bucket_count: usize,
    #[serde(default = "default_time_tolerance_hours")]
    pub time_tolerance_hours: f64,
    #[serde(default = "default_distance_km_max")]
    pub distance_km_max: f64,
    #[serde(default = "default_weather_cell_cap")]
    pub weather_cell_cap: usize,
    #[serde(default = "default_weather_window_hours")]
    pub weather_window_hours: i64,
}

fn default_feed_base_url() -> String {
    "https://a.windbornesystems.com/treasure".to_string()
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_bucket_count() -> usize {
    MAX_BUCKETS
}

fn default_time_tolerance_hours() -> f64 {
    2.0
}

fn default_distance_km_max() -> f64 {
    80.0
}

fn default_weather_cell_cap() -> usize {
    150
}

fn default_weather_window_hours() -> i64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feed_base_url: default_feed_base_url(),
            weather_url: default_weather_url(),
            bucket_count: default_bucket_count(),
            time_tolerance_hours: default_time_tolerance_hours(),
            distance_km_max: default_distance_km_max(),
            weather_cell_cap: default_weather_cell_cap(),
            weather_window_hours: default_weather_window_hours(),
        }
    }
}

impl Config {
    /// Load from `SKYTRACK_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let config = envy::prefixed("SKYTRACK_")
            .from_env::<Config>()
            .context("Invalid SKYTRACK_* configuration")?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.bucket_count = self.bucket_count.clamp(1, MAX_BUCKETS);
        self.feed_base_url = self.feed_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn track_params(&self) -> TrackParams {
        TrackParams {
            time_tolerance_hours: self.time_tolerance_hours,
            distance_km_max: self.distance_km_max,
        }
    }
}
