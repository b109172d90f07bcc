use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single anonymous balloon position report.
///
/// `ts` is the timestamp of the hourly bucket the report was fetched from,
/// shared by every observation of that bucket.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Observation {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    pub ts: DateTime<Utc>,
}

impl Observation {
    pub fn new(lat: f64, lon: f64, alt: Option<f64>, ts: DateTime<Utc>) -> Self {
        Self { lat, lon, alt, ts }
    }
}

/// Chronological sequence of observations believed to belong to one balloon.
pub type Track = Vec<Observation>;

/// Nearest-hour surface weather for a grid cell.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_kph: Option<f64>,
    /// Compass bearing the wind blows from, in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_dir: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EnrichedObservation {
    #[serde(flatten)]
    pub observation: Observation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wx: Option<WeatherSample>,
}
