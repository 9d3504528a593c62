//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations (`Sample`, `StationSeries`) and events (`Event`)
//! - model configuration enums (`DecayKind`, `WeightMode`, `RelaxationMode`)
//! - fit inputs and outputs (`GridSpec`, `ParameterVector`, `FitResult`, ...)
//! - decimal-year time helpers (`time`)

pub mod time;
pub mod types;

pub use time::*;
pub use types::*;
