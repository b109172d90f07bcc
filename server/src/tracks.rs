//! Greedy reconstruction of balloon tracks from anonymous position reports.
//!
//! The feed carries no balloon identifier, so continuity is inferred from
//! locality alone: each observation extends the open track whose tail is
//! nearest in space among those close enough in time, or starts a new one.
//! Balloons crossing paths within tolerance get mixed up; that is an accepted
//! limitation of the heuristic, not something to paper over with invented IDs.

use shared::models::{Observation, Track};

/// Mean Earth radius used for great-circle distances, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackParams {
    /// Maximum |Δt| between a track tail and a candidate observation.
    pub time_tolerance_hours: f64,
    /// Candidates at or beyond this distance start a new track.
    pub distance_km_max: f64,
}

impl Default for TrackParams {
    fn default() -> Self {
        TrackParams {
            time_tolerance_hours: 2.0,
            distance_km_max: 80.0,
        }
    }
}

/// Great-circle distance between two points using the Haversine formula.
/// Returns distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

fn distance_km(a: &Observation, b: &Observation) -> f64 {
    haversine_km(a.lat, a.lon, b.lat, b.lon)
}

fn hours_between(a: &Observation, b: &Observation) -> f64 {
    (b.ts - a.ts).num_milliseconds().abs() as f64 / 3_600_000.0
}

/// Open tracks of a single reconstruction pass.
///
/// Observations must be pushed in ascending timestamp order.
pub struct TrackBuilder {
    params: TrackParams,
    tracks: Vec<Track>,
}

impl TrackBuilder {
    pub fn new(params: TrackParams) -> Self {
        TrackBuilder {
            params,
            tracks: Vec::new(),
        }
    }

    pub fn push(&mut self, obs: Observation) {
        match self.nearest_tail(&obs) {
            Some((index, distance)) if distance < self.params.distance_km_max => {
                self.tracks[index].push(obs);
            }
            _ => self.tracks.push(vec![obs]),
        }
    }

    /// Index and distance of the closest track tail within the time tolerance.
    /// Equidistant tails resolve to the earliest created track.
    fn nearest_tail(&self, obs: &Observation) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (index, track) in self.tracks.iter().enumerate() {
            let Some(last) = track.last() else {
                continue;
            };
            if hours_between(last, obs) > self.params.time_tolerance_hours {
                continue;
            }
            let distance = distance_km(last, obs);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }

        best
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }
}

/// Group a pool of observations into tracks.
///
/// The pool is stable-sorted by timestamp first, so observations sharing a
/// bucket keep their source order.
pub fn reconstruct(mut pool: Vec<Observation>, params: TrackParams) -> Vec<Track> {
    pool.sort_by_key(|o| o.ts);

    let mut builder = TrackBuilder::new(params);
    for obs in pool {
        builder.push(obs);
    }

    log::debug!("Reconstructed {} tracks", builder.len());
    builder.into_tracks()
}
