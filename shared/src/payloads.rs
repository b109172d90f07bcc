use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::*;

/// Most recent bucket only.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPayload {
    pub updated_at: DateTime<Utc>,
    pub points: Vec<Observation>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracksPayload {
    pub updated_at: DateTime<Utc>,
    pub tracks: Vec<Track>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPayload {
    pub updated_at: DateTime<Utc>,
    pub points: Vec<EnrichedObservation>,
    pub meta: EnrichMeta,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichMeta {
    /// Cells for which a weather sample was obtained.
    pub weather_cells: usize,
    pub total_points: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_enriched_payload_shape() {
        let payload = EnrichedPayload {
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            points: vec![],
            meta: EnrichMeta {
                weather_cells: 0,
                total_points: 0,
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["updatedAt"], "2024-05-01T12:00:00Z");
        assert_eq!(json["meta"]["weatherCells"], 0);
        assert_eq!(json["meta"]["totalPoints"], 0);
    }
}
