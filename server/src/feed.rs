//! Hourly balloon feed source.
//!
//! The feed publishes one snapshot per hour, `00.json` being the most recent
//! and `23.json` the oldest. Snapshots carry no timestamps of their own, so
//! every observation of a bucket is stamped with `now - offset` hours.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use shared::models::Observation;

use crate::parser::parse_observations;

pub struct FeedSource {
    client: reqwest::Client,
    base_url: String,
}

impl FeedSource {
    pub fn new(base_url: &str) -> Self {
        FeedSource {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for a bucket offset.
    ///
    /// URL format: `{BASE}/{offset:02}.json`
    pub fn bucket_url(&self, offset: usize) -> String {
        format!("{}/{:02}.json", self.base_url, offset)
    }

    async fn fetch_bucket_text(&self, offset: usize) -> Result<String> {
        let url = self.bucket_url(offset);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("{} answered with status {}", url, status));
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }

    /// Fetch and parse one bucket, stamping every observation with `ts`.
    ///
    /// Transport failures yield an empty bucket.
    pub async fn fetch_bucket(&self, offset: usize, ts: DateTime<Utc>) -> Vec<Observation> {
        match self.fetch_bucket_text(offset).await {
            Ok(text) => {
                let observations = parse_observations(&text, ts);
                log::debug!("Bucket {:02}: {} observations", offset, observations.len());
                observations
            }
            Err(e) => {
                log::warn!("Bucket {:02} unavailable: {:#}", offset, e);
                Vec::new()
            }
        }
    }

    /// Most recent bucket, stamped with `now`.
    pub async fn fetch_latest(&self, now: DateTime<Utc>) -> Vec<Observation> {
        self.fetch_bucket(0, now).await
    }

    /// Fetch `buckets` hourly buckets concurrently and pool them oldest first.
    pub async fn collect_pool(&self, now: DateTime<Utc>, buckets: usize) -> Vec<Observation> {
        let fetches = (0..buckets).map(|offset| {
            let ts = bucket_time(now, offset);
            self.fetch_bucket(offset, ts)
        });
        let results = join_all(fetches).await;

        let mut pool: Vec<Observation> = results.into_iter().flatten().collect();
        pool.sort_by_key(|o| o.ts);

        log::info!("Pooled {} observations from {} buckets", pool.len(), buckets);
        pool
    }
}

/// Timestamp assigned to a bucket: `now` minus `offset` hours.
pub fn bucket_time(now: DateTime<Utc>, offset: usize) -> DateTime<Utc> {
    now - Duration::hours(offset as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::SocketAddr;
    use warp::Filter;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    /// Serve a fake feed: bucket 00 as a JSON array, 01 as NDJSON, 02 broken,
    /// anything else 404.
    fn spawn_fake_feed() -> SocketAddr {
        let route = warp::path!("treasure" / String).map(|file: String| {
            let (status, body) = match file.as_str() {
                "00.json" => (200, "[[10.0, 20.0, 5000], [10.01, 20.01, 5100]]"),
                "01.json" => (200, "{\"lat\": 9.9, \"lon\": 19.9}\ngarbage\n[-45.0, 100.0]"),
                "02.json" => (200, "<html>maintenance</html>"),
                _ => (404, "not found"),
            };
            warp::reply::with_status(body, warp::http::StatusCode::from_u16(status).unwrap())
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[test]
    fn test_bucket_url_padding() {
        let source = FeedSource::new("https://a.windbornesystems.com/treasure/");
        assert_eq!(
            source.bucket_url(0),
            "https://a.windbornesystems.com/treasure/00.json"
        );
        assert_eq!(
            source.bucket_url(23),
            "https://a.windbornesystems.com/treasure/23.json"
        );
    }

    #[test]
    fn test_bucket_time() {
        assert_eq!(bucket_time(now(), 0), now());
        assert_eq!(
            bucket_time(now(), 23),
            Utc.with_ymd_and_hms(2024, 4, 30, 13, 30, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_fetch_latest() {
        let addr = spawn_fake_feed();
        let source = FeedSource::new(&format!("http://{}/treasure", addr));

        let latest = source.fetch_latest(now()).await;
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|o| o.ts == now()));
        assert_eq!(latest[0].alt, Some(5000.0));
    }

    #[tokio::test]
    async fn test_collect_pool_sorted_and_tolerant() {
        let addr = spawn_fake_feed();
        let source = FeedSource::new(&format!("http://{}/treasure", addr));

        let pool = source.collect_pool(now(), 5).await;
        // 01.json contributes two, 00.json two, the rest nothing
        assert_eq!(pool.len(), 4);
        assert!(pool.windows(2).all(|w| w[0].ts <= w[1].ts));
        assert_eq!(pool[0].ts, bucket_time(now(), 1));
        assert_eq!((pool[0].lat, pool[0].lon), (9.9, 19.9));
        assert_eq!((pool[1].lat, pool[1].lon), (-45.0, 100.0));
        assert_eq!(pool[3].ts, now());
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_empty() {
        let source = FeedSource::new("http://127.0.0.1:1/treasure");
        assert!(source.fetch_latest(now()).await.is_empty());
        assert!(source.collect_pool(now(), 3).await.is_empty());
    }
}
