//! Error types.
//!
//! The library reports typed errors (`InvalidSample`, `DataError`, `FitError`);
//! the binary boundary flattens them into an `AppError` carrying a process exit
//! code:
//!
//! - `2`: usage, configuration or local file problems
//! - `3`: not enough usable data / underdetermined model
//! - `4`: network, compute or runtime failures

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a raw reading could not become a `Sample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidSampleReason {
    #[error("non-finite epoch")]
    NonFiniteEpoch,
    #[error("non-finite value")]
    NonFiniteValue,
    #[error("non-finite or non-positive sigma")]
    NonPositiveSigma,
}

/// A reading rejected at construction. Ingestion drops and counts these.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid sample at epoch {epoch}: {reason}")]
pub struct InvalidSample {
    pub epoch: f64,
    pub reason: InvalidSampleReason,
}

/// Failures of the external collaborators (series provider, event catalog).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("data unavailable for station {station}: {cause}")]
    Unavailable { station: String, cause: String },

    #[error("malformed series for station {station}: {cause}")]
    Malformed { station: String, cause: String },

    #[error("no usable samples for station {station} ({dropped} readings dropped)")]
    NoUsableSamples { station: String, dropped: usize },

    #[error("event catalog unavailable: {cause}")]
    CatalogUnavailable { cause: String },

    #[error("failed to read {path}: {cause}")]
    Io { path: String, cause: String },
}

/// What made every grid point unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnderdeterminedCause {
    #[error("insufficient data")]
    InsufficientData,
    #[error("singular design matrix")]
    SingularDesign,
    #[error("empty grid")]
    EmptyGrid,
}

/// Structural failures of a single optimization run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("model underdetermined ({cause}): grid size {grid_size}, {samples} samples")]
    Underdetermined {
        cause: UnderdeterminedCause,
        grid_size: usize,
        samples: usize,
    },

    #[error("invalid grid for {parameter}: {reason}")]
    InvalidGrid { parameter: String, reason: String },

    #[error("optimization cancelled before any of {grid_size} grid points completed")]
    Cancelled { grid_size: usize },
}

impl From<InvalidSample> for AppError {
    fn from(err: InvalidSample) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        let code = match err {
            DataError::NoUsableSamples { .. } => 3,
            DataError::Io { .. } => 2,
            DataError::Unavailable { .. }
            | DataError::Malformed { .. }
            | DataError::CatalogUnavailable { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::Underdetermined { .. } => 3,
            FitError::InvalidGrid { .. } => 2,
            FitError::Cancelled { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}
