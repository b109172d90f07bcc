use chrono::Utc;
use shared::payloads::{EnrichedPayload, LatestPayload, TracksPayload};

use crate::config::Config;
use crate::feed::FeedSource;
use crate::tracks;
use crate::weather::{self, WeatherSource};

/// Upstream sources plus the settings each request is computed with.
///
/// Holds no request state: every payload is rebuilt from fresh fetches.
pub struct App {
    pub config: Config,
    feed: FeedSource,
    weather: WeatherSource,
}

impl App {
    pub fn new(config: Config) -> Self {
        let feed = FeedSource::new(&config.feed_base_url);
        let weather = WeatherSource::new(&config.weather_url, config.weather_window_hours);
        App {
            config,
            feed,
            weather,
        }
    }

    pub async fn latest(&self) -> LatestPayload {
        let now = Utc::now();
        let points = self.feed.fetch_latest(now).await;
        LatestPayload {
            updated_at: Utc::now(),
            points,
        }
    }

    pub async fn tracks(&self, buckets: usize) -> TracksPayload {
        let now = Utc::now();
        let pool = self.feed.collect_pool(now, buckets).await;
        let tracks = tracks::reconstruct(pool, self.config.track_params());
        log::info!("Built {} tracks from {} buckets", tracks.len(), buckets);
        TracksPayload {
            updated_at: Utc::now(),
            tracks,
        }
    }

    pub async fn with_weather(&self) -> EnrichedPayload {
        let now = Utc::now();
        let points = self.feed.fetch_latest(now).await;
        let (points, meta) = weather::enrich(points, self.config.weather_cell_cap, |lat, lon| {
            self.weather.lookup(lat, lon, now)
        })
        .await;
        log::info!(
            "Weather attached from {} cells to {} points",
            meta.weather_cells,
            meta.total_points
        );
        EnrichedPayload {
            updated_at: Utc::now(),
            points,
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use warp::Filter;

    /// Feed serving the same two nearby balloons in every bucket, and a
    /// forecast API that always answers.
    fn spawn_fake_upstreams() -> SocketAddr {
        let feed = warp::path!("treasure" / String)
            .map(|_| "[[10.0, 20.0, 5000], [10.01, 20.01, 5100]]");
        let forecast = warp::path!("forecast").map(|| {
            let now = Utc::now().format("%Y-%m-%dT%H:00").to_string();
            warp::reply::json(&serde_json::json!({
                "hourly": {
                    "time": [now],
                    "temperature_2m": [-40.0],
                    "wind_speed_10m": [10.0],
                    "wind_direction_10m": [45.0]
                }
            }))
        });
        let (addr, server) = warp::serve(feed.or(forecast)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn app_for(addr: SocketAddr) -> App {
        App::new(Config {
            feed_base_url: format!("http://{}/treasure", addr),
            weather_url: format!("http://{}/forecast", addr),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_latest() {
        let app = app_for(spawn_fake_upstreams());
        let payload = app.latest().await;
        assert_eq!(payload.points.len(), 2);
        assert_eq!(payload.points[0].ts, payload.points[1].ts);
    }

    #[tokio::test]
    async fn test_tracks_single_bucket() {
        let app = app_for(spawn_fake_upstreams());
        let payload = app.tracks(1).await;
        assert_eq!(payload.tracks.len(), 1);
        let alts: Vec<Option<f64>> = payload.tracks[0].iter().map(|o| o.alt).collect();
        assert_eq!(alts, vec![Some(5000.0), Some(5100.0)]);
    }

    #[tokio::test]
    async fn test_tracks_chain_buckets() {
        let app = app_for(spawn_fake_upstreams());
        let payload = app.tracks(3).await;
        // Same two reports every hour all chain onto one track
        assert_eq!(payload.tracks.len(), 1);
        assert_eq!(payload.tracks[0].len(), 6);
        assert!(payload.tracks[0].windows(2).all(|w| w[0].ts <= w[1].ts));
    }

    #[tokio::test]
    async fn test_with_weather() {
        let app = app_for(spawn_fake_upstreams());
        let payload = app.with_weather().await;
        assert_eq!(payload.meta.weather_cells, 1);
        assert_eq!(payload.meta.total_points, 2);
        let wx = payload.points[0].wx.clone().unwrap();
        assert_eq!(wx.temp_c, Some(-40.0));
        assert_eq!(wx.wind_kph, Some(36.0));
        assert_eq!(wx.wind_dir, Some(45.0));
        assert_eq!(payload.points[1].wx, Some(wx));
    }

    #[tokio::test]
    async fn test_unreachable_upstreams_degrade_to_empty() {
        let app = App::new(Config {
            feed_base_url: "http://127.0.0.1:1/treasure".to_string(),
            weather_url: "http://127.0.0.1:1/forecast".to_string(),
            ..Config::default()
        });
        assert!(app.latest().await.points.is_empty());
        assert!(app.tracks(2).await.tracks.is_empty());
        let enriched = app.with_weather().await;
        assert!(enriched.points.is_empty());
        assert_eq!(enriched.meta.weather_cells, 0);
    }
}
