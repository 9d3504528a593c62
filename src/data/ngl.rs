//! Nevada Geodetic Laboratory time series download.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::data::provider::SeriesProvider;
use crate::data::tenv3::parse_tenv3;
use crate::error::DataError;
use crate::io::ingest::{IngestedSeries, ingest_tenv3};

/// IGS14 `tenv3` directory.
pub const DEFAULT_BASE_URL: &str = "https://geodesy.unr.edu/gps_timeseries/tenv3/IGS14";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "GNSS_TENV3_BASE_URL";

const TIMEOUT: Duration = Duration::from_secs(60);

pub struct NglClient {
    client: Client,
    base_url: String,
}

impl NglClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("gnss-etm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Unavailable {
                station: String::new(),
                cause: format!("HTTP client setup failed: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client for `GNSS_TENV3_BASE_URL` (from the environment or `.env`), or the NGL default.
    pub fn from_env() -> Result<Self, DataError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn url_for(&self, station: &str) -> String {
        format!("{}/{}.tenv3", self.base_url, station.trim().to_uppercase())
    }

    /// Download the raw `tenv3` text of a station.
    pub fn fetch_text(&self, station: &str) -> Result<String, DataError> {
        let url = self.url_for(station);
        log::info!("fetching {url}");

        let unavailable = |cause: String| DataError::Unavailable {
            station: station.to_string(),
            cause,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| unavailable(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(unavailable(format!("{url} returned status {}", resp.status())));
        }

        resp.text()
            .map_err(|e| unavailable(format!("failed to read response body: {e}")))
    }
}

impl SeriesProvider for NglClient {
    fn fetch(&self, station: &str) -> Result<IngestedSeries, DataError> {
        let text = self.fetch_text(station)?;
        ingest_tenv3(&station.trim().to_uppercase(), parse_tenv3(&text))
    }
}
