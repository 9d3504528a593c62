//! Earthquake catalogs.
//!
//! - `StaticCatalog`: events given on the command line or in a CSV file
//! - `UsgsCatalog`: FDSN event web service (GeoJSON) filtered by time, region
//!   and magnitude
//!
//! An empty event list is a valid answer from either.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{
    Event, TimeSpan, date_from_decimal_year, decimal_year, decimal_year_from_date,
    decimal_year_from_millis,
};
use crate::error::DataError;

/// USGS FDSN event query endpoint.
pub const DEFAULT_USGS_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

/// Environment variable overriding [`DEFAULT_USGS_URL`].
pub const USGS_URL_ENV: &str = "USGS_EVENT_URL";

/// Circle around a station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

pub trait EventCatalog {
    /// Candidate events for a series covering `span`. Remote catalogs restrict
    /// the query to `span` (and `region`); the pipeline filters to the span anyway.
    fn events(&self, span: &TimeSpan, region: Option<&Region>) -> Result<Vec<Event>, DataError>;
}

/// A fixed list of events.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    events: Vec<Event>,
}

impl StaticCatalog {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Load `id,epoch,magnitude,label` rows; `epoch` (or `date`) may be a
    /// decimal year or a date. `magnitude` and `label` are optional.
    pub fn from_csv(path: &Path) -> Result<Self, DataError> {
        let io_err = |cause: String| DataError::Io {
            path: path.display().to_string(),
            cause,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| io_err(e.to_string()))?;

        let headers = reader.headers().map_err(|e| io_err(e.to_string()))?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
        };
        let id_col = column("id").ok_or_else(|| io_err("missing `id` column".to_string()))?;
        let epoch_col = column("epoch")
            .or_else(|| column("date"))
            .ok_or_else(|| io_err("missing `epoch` (or `date`) column".to_string()))?;
        let mag_col = column("magnitude");
        let label_col = column("label");

        let mut events = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            // +2: 1-based lines, header first.
            let line = idx + 2;
            let record = record.map_err(|e| io_err(format!("line {line}: {e}")))?;
            let field = |col: Option<usize>| col.and_then(|c| record.get(c)).filter(|s| !s.is_empty());

            let id = field(Some(id_col)).ok_or_else(|| io_err(format!("line {line}: empty id")))?;
            let raw_epoch = field(Some(epoch_col)).unwrap_or_default();
            let epoch = parse_epoch(raw_epoch)
                .ok_or_else(|| io_err(format!("line {line}: invalid epoch '{raw_epoch}'")))?;
            let magnitude = match field(mag_col) {
                Some(raw) => Some(
                    raw.parse::<f64>()
                        .map_err(|_| io_err(format!("line {line}: invalid magnitude '{raw}'")))?,
                ),
                None => None,
            };

            let mut event = Event::new(id, epoch);
            event.magnitude = magnitude;
            event.label = field(label_col).map(str::to_string);
            events.push(event);
        }

        log::info!("loaded {} events from {}", events.len(), path.display());
        Ok(Self { events })
    }
}

impl EventCatalog for StaticCatalog {
    /// Every listed event; out-of-span ones are left for the caller to count and drop.
    fn events(&self, _span: &TimeSpan, _region: Option<&Region>) -> Result<Vec<Event>, DataError> {
        Ok(self.events.clone())
    }
}

/// Parse an `ID@WHEN` event argument, where `WHEN` is a decimal year, a date
/// (`YYYY-MM-DD`) or a UTC timestamp (`YYYY-MM-DDTHH:MM:SS`).
pub fn parse_event_arg(raw: &str) -> Result<Event, String> {
    let (id, when) = raw
        .split_once('@')
        .ok_or_else(|| format!("invalid event '{raw}': expected ID@YYYY-MM-DD or ID@decimal-year"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("invalid event '{raw}': empty id"));
    }
    let epoch = parse_epoch(when.trim()).ok_or_else(|| format!("invalid event epoch '{when}'"))?;
    Ok(Event::new(id, epoch))
}

/// Decimal year from a number, date or timestamp string.
pub fn parse_epoch(raw: &str) -> Option<f64> {
    if let Ok(v) = raw.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(decimal_year_from_date(d));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(decimal_year(dt));
        }
    }
    None
}

/// FDSN event service client.
pub struct UsgsCatalog {
    client: Client,
    base_url: String,
    min_magnitude: f64,
}

impl UsgsCatalog {
    pub fn new(base_url: impl Into<String>, min_magnitude: f64) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DataError::CatalogUnavailable {
                cause: format!("HTTP client setup failed: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            min_magnitude,
        })
    }

    pub fn from_env(min_magnitude: f64) -> Result<Self, DataError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var(USGS_URL_ENV).unwrap_or_else(|_| DEFAULT_USGS_URL.to_string());
        Self::new(base_url, min_magnitude)
    }
}

impl EventCatalog for UsgsCatalog {
    fn events(&self, span: &TimeSpan, region: Option<&Region>) -> Result<Vec<Event>, DataError> {
        let unavailable = |cause: String| DataError::CatalogUnavailable { cause };

        let start = date_from_decimal_year(span.start)
            .ok_or_else(|| unavailable(format!("invalid span start {}", span.start)))?;
        let end = date_from_decimal_year(span.end)
            .and_then(|d| d.succ_opt())
            .ok_or_else(|| unavailable(format!("invalid span end {}", span.end)))?;

        let mut query: Vec<(&str, String)> = vec![
            ("format", "geojson".to_string()),
            ("starttime", start.to_string()),
            ("endtime", end.to_string()),
            ("minmagnitude", self.min_magnitude.to_string()),
            ("orderby", "time-asc".to_string()),
        ];
        if let Some(r) = region {
            query.push(("latitude", r.latitude.to_string()));
            query.push(("longitude", r.longitude.to_string()));
            query.push(("maxradiuskm", r.radius_km.to_string()));
        }

        log::info!("querying {} for M{}+ events {start}..{end}", self.base_url, self.min_magnitude);
        let resp = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .map_err(|e| unavailable(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(unavailable(format!("request failed with status {}", resp.status())));
        }

        let body: FeatureCollection = resp
            .json()
            .map_err(|e| unavailable(format!("failed to parse GeoJSON response: {e}")))?;

        let mut events = Vec::with_capacity(body.features.len());
        for feature in body.features {
            let Some(epoch) = feature.properties.time.and_then(decimal_year_from_millis) else {
                log::debug!("event {} has no usable time, skipped", feature.id);
                continue;
            };
            let mut event = Event::new(feature.id, epoch);
            event.magnitude = feature.properties.mag;
            event.label = feature.properties.title.or(feature.properties.place);
            events.push(event);
        }
        // The service may round the window to whole days.
        events.retain(|e| span.contains(e.epoch));
        Ok(events)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: String,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Properties {
    mag: Option<f64>,
    place: Option<String>,
    title: Option<String>,
    /// Milliseconds since the Unix epoch.
    time: Option<i64>,
}
