//! Command-line parsing for the GNSS trajectory model fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::data::parse_event_arg;
use crate::domain::{ComponentSpec, DecayKind, Event, GridSpacing, RelaxationMode, WeightMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "etm",
    version,
    about = "GNSS trajectory model fitter (secular rate + co-/post-seismic relaxation)"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch (or read) a station series, fit all components, report and export.
    Fit(FitArgs),
    /// Generate a reproducible synthetic station series in tenv3 format.
    Synth(SynthArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
}

/// Options for `etm fit`.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Station identifier (e.g. J299).
    #[arg(short, long, required_unless_present = "input")]
    pub station: Option<String>,

    /// Read the series from a local tenv3 file instead of downloading it.
    #[arg(short, long, value_name = "TENV3")]
    pub input: Option<PathBuf>,

    /// Event as ID@YYYY-MM-DD, ID@YYYY-MM-DDTHH:MM:SS or ID@decimal-year (repeatable).
    #[arg(short, long = "event", value_name = "ID@WHEN", value_parser = parse_event_arg)]
    pub events: Vec<Event>,

    /// CSV file with `id,epoch,magnitude,label` rows.
    #[arg(long, value_name = "CSV")]
    pub events_csv: Option<PathBuf>,

    /// Query the USGS event catalog around the station.
    #[arg(long)]
    pub usgs: bool,

    /// Minimum magnitude for the USGS query.
    #[arg(long, default_value_t = 6.5)]
    pub min_magnitude: f64,

    /// Search radius (km) for the USGS query.
    #[arg(long, default_value_t = 1000.0)]
    pub radius_km: f64,

    #[command(flatten)]
    pub options: FitOptionsArgs,
}

/// Model, grid, runtime and output options shared by `fit` and `synth --fit`.
#[derive(Debug, Args, Clone)]
pub struct FitOptionsArgs {
    /// Which component(s) to fit.
    #[arg(long, value_enum, default_value_t = ComponentSpec::All)]
    pub components: ComponentSpec,

    /// Smallest relaxation time candidate (days).
    #[arg(long, default_value_t = 10.0)]
    pub grid_min: f64,

    /// Largest relaxation time candidate (days).
    #[arg(long, default_value_t = 400.0)]
    pub grid_max: f64,

    /// Number of relaxation time candidates.
    #[arg(long, default_value_t = 20)]
    pub grid_steps: usize,

    /// Spacing of the relaxation time candidates.
    #[arg(long, value_enum, default_value_t = GridSpacing::Linear)]
    pub grid_spacing: GridSpacing,

    /// One relaxation time for all events, or one per event.
    #[arg(long, value_enum, default_value_t = RelaxationMode::Shared)]
    pub relaxation: RelaxationMode,

    /// Post-seismic decay form.
    #[arg(long, value_enum, default_value_t = DecayKind::Logarithmic)]
    pub decay: DecayKind,

    /// Observation weighting.
    #[arg(long, value_enum, default_value_t = WeightMode::Sigma)]
    pub weights: WeightMode,

    /// Also fit annual and semi-annual terms.
    #[arg(long)]
    pub seasonal: bool,

    /// Hold the secular rate fixed (m/yr).
    #[arg(long, value_name = "M_PER_YR", allow_negative_numbers = true)]
    pub fix_rate: Option<f64>,

    /// Hold the intercept fixed (m).
    #[arg(long, value_name = "M", allow_negative_numbers = true)]
    pub fix_intercept: Option<f64>,

    /// Worker threads for the grid search (default: all cores).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Evaluate grid points one after another on the main thread.
    #[arg(long)]
    pub sequential: bool,

    /// Stop the search after this many seconds and report the best point so far.
    #[arg(long, value_name = "SECS")]
    pub time_limit: Option<f64>,

    /// Do not draw a progress bar.
    #[arg(long)]
    pub no_progress: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows) per component.
    #[arg(long, default_value_t = 14)]
    pub height: usize,

    /// Print the per-grid-point residual table.
    #[arg(long)]
    pub grid_table: bool,

    /// Show the N largest normalized residuals.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Export per-sample residuals to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the fit (parameters + grid + fitted curve) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Export a GeoJSON map with the station and its velocity vector.
    #[arg(long = "export-map", value_name = "GEOJSON")]
    pub export_map: Option<PathBuf>,

    /// Write a three-panel SVG time-series plot.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,
}

/// Options for `etm synth`.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output tenv3 file.
    #[arg(short, long, value_name = "TENV3")]
    pub out: PathBuf,

    /// Station identifier written into each row.
    #[arg(short, long, default_value = "J299")]
    pub station: String,

    /// Random seed.
    #[arg(long, default_value_t = 2011)]
    pub seed: u64,

    /// First day (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Days between rows.
    #[arg(long, default_value_t = 1)]
    pub cadence_days: i64,

    /// Probability that a day is missing.
    #[arg(long, default_value_t = 0.02)]
    pub gap_probability: f64,

    /// Fit the generated series right away (with the synthetic events).
    #[arg(long)]
    pub fit: bool,

    #[command(flatten)]
    pub options: FitOptionsArgs,
}

/// Options for plotting a saved fit.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit JSON file produced by `etm fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows) per component.
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}
