//! Normalization of raw balloon feed payloads.
//!
//! The upstream feed is not consistent about its shape: it may be a JSON array
//! of `[lat, lon, alt]` lists, an array of `{lat, lon, alt}` objects, an object
//! wrapping either under `tracks`, or newline-delimited JSON with the odd
//! corrupted line. Anything that cannot yield two finite coordinates is
//! dropped; nothing here ever fails the batch.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;
use shared::models::Observation;
use std::collections::BTreeMap;

/// Parse raw feed text into observations stamped with `ts`.
pub fn parse_observations(text: &str, ts: DateTime<Utc>) -> Vec<Observation> {
    raw_entries(text)
        .iter()
        .filter_map(|entry| parse_entry(entry, ts))
        .collect()
}

/// Split the payload into candidate entries, in source order.
fn raw_entries(text: &str) -> Vec<Value> {
    if let Some(items) = split_array(text) {
        return items;
    }
    if let Some(items) = tracks_field(text).and_then(|tracks| split_array(tracks.get())) {
        return items;
    }
    log::debug!("Feed payload is not a JSON array, reading it line by line");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(lenient_value)
        .filter(|value| !value.is_null())
        .collect()
}

#[derive(Deserialize)]
struct Wrapper<'a> {
    #[serde(borrow, default)]
    tracks: Option<&'a RawValue>,
}

fn tracks_field(text: &str) -> Option<&RawValue> {
    serde_json::from_str::<Wrapper>(text).ok()?.tracks
}

/// Elements of a JSON array, each decoded on its own.
fn split_array(text: &str) -> Option<Vec<Value>> {
    let elements: Vec<&RawValue> = serde_json::from_str(text).ok()?;
    Some(
        elements
            .into_iter()
            .filter_map(|raw| lenient_value(raw.get()))
            .collect(),
    )
}

/// Decode one entry. serde_json rejects numbers overflowing f64 (`1e400`),
/// so members of a list or object that fail on their own become `null`
/// instead of taking the whole entry down.
fn lenient_value(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    if let Ok(items) = serde_json::from_str::<Vec<&RawValue>>(text) {
        return Some(Value::Array(items.into_iter().map(value_or_null).collect()));
    }
    let fields = serde_json::from_str::<BTreeMap<String, &RawValue>>(text).ok()?;
    Some(Value::Object(
        fields
            .into_iter()
            .map(|(key, raw)| (key, value_or_null(raw)))
            .collect(),
    ))
}

fn value_or_null(raw: &RawValue) -> Value {
    serde_json::from_str(raw.get()).unwrap_or(Value::Null)
}

fn parse_entry(entry: &Value, ts: DateTime<Utc>) -> Option<Observation> {
    let (lat, lon, alt) = match entry {
        Value::Array(items) if items.len() >= 2 => (
            items[0].as_f64(),
            items[1].as_f64(),
            items.get(2).and_then(Value::as_f64),
        ),
        Value::Object(_) => (
            field(entry, "lat", "0"),
            field(entry, "lon", "1"),
            field(entry, "alt", "2"),
        ),
        _ => return None,
    };

    let lat = lat.filter(|v| v.is_finite())?;
    let lon = lon.filter(|v| v.is_finite())?;
    let alt = alt.filter(|v| v.is_finite());

    Some(Observation::new(lat, lon, alt, ts))
}

/// Named field, or its positional alias, as a number.
fn field(entry: &Value, name: &str, alias: &str) -> Option<f64> {
    let value = match entry.get(name) {
        Some(v) if !v.is_null() => v,
        _ => entry.get(alias)?,
    };
    numeric(value)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}
