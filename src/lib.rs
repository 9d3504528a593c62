//! `gnss-etm` library crate.
//!
//! Fits an extended trajectory model (secular trend, co-seismic offsets and
//! post-seismic relaxation) to GNSS station displacement time series.
//!
//! The binary (`etm`) is a thin wrapper around this library so that:
//!
//! - the fitting core is testable without network access or processes
//! - data sources and output sinks stay swappable

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
