//! Station series sources.

use std::path::{Path, PathBuf};

use crate::data::tenv3::parse_tenv3;
use crate::error::DataError;
use crate::io::ingest::{IngestedSeries, ingest_tenv3};

/// Anything that can produce the validated series of one station.
pub trait SeriesProvider {
    fn fetch(&self, station: &str) -> Result<IngestedSeries, DataError>;
}

/// Reads `tenv3` text from a local file.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeriesProvider for FileProvider {
    fn fetch(&self, station: &str) -> Result<IngestedSeries, DataError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| DataError::Io {
            path: self.path.display().to_string(),
            cause: e.to_string(),
        })?;
        log::info!("read {} bytes from {}", text.len(), self.path.display());
        ingest_tenv3(station, parse_tenv3(&text))
    }
}
