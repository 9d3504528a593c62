//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - fetches or reads the station series and its events
//! - runs the per-component grid search
//! - prints reports/plots
//! - writes optional exports

use std::path::Path;
use std::time::Duration;

use clap::Parser;

use crate::cli::{Command, FitArgs, FitOptionsArgs, PlotArgs, SynthArgs};
use crate::data::{SyntheticConfig, generate, write_tenv3};
use crate::error::AppError;
use crate::fit::{FixedParams, OptimizeOptions, Parallelism, StationFitPlan, relaxation_grid};
use crate::report::{
    CsvSink, FitJsonSink, FitOutput, GeoJsonSink, ResultSink, SvgSink, TerminalSink, emit_all,
};

use pipeline::{EventSources, FitConfig, SeriesSource, UsgsQuery};

pub mod pipeline;
pub mod progress;

/// Entry point for the `etm` binary.
pub fn run() -> Result<(), AppError> {
    // `etm --station J299` behaves like `etm fit --station J299`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
        Command::Plot(args) => handle_plot(args),
    }
}

/// `warn` by default, `-v` info, `-vv` debug. `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let source = match (&args.input, &args.station) {
        (Some(path), station) => SeriesSource::File {
            station: station.clone().unwrap_or_else(|| station_from_path(path)),
            path: path.clone(),
        },
        (None, Some(station)) => SeriesSource::Remote {
            station: station.clone(),
        },
        (None, None) => return Err(AppError::new(2, "Either --station or --input is required.")),
    };
    let events = EventSources {
        listed: args.events.clone(),
        csv: args.events_csv.clone(),
        usgs: args.usgs.then_some(UsgsQuery {
            min_magnitude: args.min_magnitude,
            radius_km: args.radius_km,
        }),
    };

    let config = fit_config_from_args(source, events, &args.options)?;
    run_and_emit(&config, &args.options)
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let mut synth = SyntheticConfig::demo();
    synth.station = args.station.clone();
    synth.seed = args.seed;
    synth.cadence_days = args.cadence_days;
    synth.gap_probability = args.gap_probability;
    synth.decay = args.options.decay;
    if let Some(start) = args.start {
        synth.start = start;
    }
    if let Some(end) = args.end {
        synth.end = end;
    }

    let rows = generate(&synth)?;
    std::fs::write(&args.out, write_tenv3(&rows))
        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", args.out.display())))?;
    println!(
        "Wrote {} synthetic rows for {} to {}",
        rows.len(),
        synth.station,
        args.out.display()
    );

    if !args.fit {
        return Ok(());
    }

    let events = EventSources {
        listed: synth.events.iter().map(|e| e.event.clone()).collect(),
        ..EventSources::default()
    };
    let source = SeriesSource::File {
        station: synth.station.clone(),
        path: args.out.clone(),
    };
    let config = fit_config_from_args(source, events, &args.options)?;
    run_and_emit(&config, &args.options)
}

fn run_and_emit(config: &FitConfig, options: &FitOptionsArgs) -> Result<(), AppError> {
    let run = pipeline::run_fit(config)?;
    let output = FitOutput {
        series: &run.ingest.series,
        report: &run.ingest.report,
        fit: &run.fit,
        residuals: &run.residuals,
    };
    emit_all(&sinks_from_options(options), &output)
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let file = crate::io::read_fit_json(&args.fit)?;

    println!(
        "Station: {} | decay={} | weights={:?} | span=[{:.4}, {:.4}]",
        file.station,
        file.decay.display_name(),
        file.weighting,
        file.span.start,
        file.span.end
    );
    for c in &file.components {
        println!();
        for nv in &c.named {
            println!("  {:<32} {:>12.6}", nv.name, nv.value);
        }
        let plot = crate::plot::render_curve_plot(
            c.component.display_name(),
            &c.curve,
            &file.events,
            args.width,
            args.height,
        );
        println!("{plot}");
    }
    Ok(())
}

/// Turn CLI options into a run configuration, validating the numeric ones.
pub fn fit_config_from_args(
    source: SeriesSource,
    events: EventSources,
    opts: &FitOptionsArgs,
) -> Result<FitConfig, AppError> {
    let grid = relaxation_grid(opts.grid_min, opts.grid_max, opts.grid_steps, opts.grid_spacing)?;

    if opts.threads == Some(0) {
        return Err(AppError::new(2, "--threads must be >= 1."));
    }
    let time_limit = match opts.time_limit {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => return Err(AppError::new(2, format!("--time-limit must be > 0 (got {secs})."))),
        None => None,
    };

    let options = OptimizeOptions {
        decay: opts.decay,
        weighting: opts.weights,
        relaxation: opts.relaxation,
        seasonal: opts.seasonal,
        fixed: FixedParams {
            intercept: opts.fix_intercept,
            rate: opts.fix_rate,
        },
        parallelism: if opts.sequential {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        },
    };

    Ok(FitConfig {
        source,
        events,
        plan: StationFitPlan {
            grid,
            options,
            components: opts.components.components(),
        },
        threads: opts.threads,
        time_limit,
        progress: !opts.no_progress,
    })
}

fn sinks_from_options(opts: &FitOptionsArgs) -> Vec<Box<dyn ResultSink>> {
    let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(TerminalSink {
        plot: !opts.no_plot,
        plot_width: opts.width,
        plot_height: opts.height,
        grid_table: opts.grid_table,
        top_outliers: opts.top,
    })];
    if let Some(path) = &opts.export {
        sinks.push(Box::new(CsvSink { path: path.clone() }));
    }
    if let Some(path) = &opts.export_fit {
        sinks.push(Box::new(FitJsonSink { path: path.clone() }));
    }
    if let Some(path) = &opts.export_map {
        sinks.push(Box::new(GeoJsonSink { path: path.clone() }));
    }
    if let Some(path) = &opts.svg {
        sinks.push(Box::new(SvgSink { path: path.clone() }));
    }
    sinks
}

/// `data/J299.tenv3` -> `J299`.
fn station_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| "STATION".to_string())
}

/// Rewrite argv so flags without a subcommand mean `etm fit`.
///
/// Rules:
/// - `etm`                      -> unchanged (clap prints usage)
/// - `etm --station J299 ...`   -> `etm fit --station J299 ...`
/// - `etm -v --station J299`    -> `etm fit -v --station J299`
/// - `etm --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "synth" | "plot");
    if is_subcommand {
        return argv;
    }

    // A leading global -v still needs the subcommand inserted after it.
    if arg1.starts_with('-') {
        let has_subcommand = argv
            .iter()
            .skip(1)
            .any(|a| matches!(a.as_str(), "fit" | "synth" | "plot"));
        if !has_subcommand {
            argv.insert(1, "fit".to_string());
        }
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::{Component, DecayKind};

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn options(extra: &[&str]) -> FitOptionsArgs {
        let mut items = vec!["etm", "fit", "--station", "J299"];
        items.extend_from_slice(extra);
        let Command::Fit(args) = Cli::parse_from(items).command else {
            panic!("expected fit");
        };
        args.options
    }

    #[test]
    fn flags_default_to_fit() {
        assert_eq!(rewrite_args(argv(&["etm"])), argv(&["etm"]));
        assert_eq!(
            rewrite_args(argv(&["etm", "--station", "J299"])),
            argv(&["etm", "fit", "--station", "J299"])
        );
        assert_eq!(
            rewrite_args(argv(&["etm", "-v", "plot", "--fit", "f.json"])),
            argv(&["etm", "-v", "plot", "--fit", "f.json"])
        );
        assert_eq!(rewrite_args(argv(&["etm", "--help"])), argv(&["etm", "--help"]));
    }

    #[test]
    fn config_from_defaults() {
        let source = SeriesSource::Remote {
            station: "J299".to_string(),
        };
        let config = fit_config_from_args(source, EventSources::default(), &options(&[])).unwrap();
        assert_eq!(config.plan.grid.len(), 20);
        assert_eq!(config.plan.grid.values()[0], 10.0);
        assert_eq!(config.plan.grid.values()[19], 400.0);
        assert_eq!(config.plan.components, Component::ALL.to_vec());
        assert_eq!(config.plan.options.decay, DecayKind::Logarithmic);
        assert!(config.progress);
        assert!(config.time_limit.is_none());
    }

    #[test]
    fn bad_numeric_options_are_usage_errors() {
        let source = || SeriesSource::Remote {
            station: "J299".to_string(),
        };
        let err = fit_config_from_args(source(), EventSources::default(), &options(&["--grid-min", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = fit_config_from_args(source(), EventSources::default(), &options(&["--threads", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err =
            fit_config_from_args(source(), EventSources::default(), &options(&["--time-limit", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn station_name_from_file_stem() {
        assert_eq!(station_from_path(Path::new("data/j299.tenv3")), "J299");
    }

    #[test]
    fn synth_then_fit_then_plot() {
        let dir = tempfile::tempdir().unwrap();
        let series = dir.path().join("J299.tenv3");
        let fit_json = dir.path().join("fit.json");
        let cli = Cli::parse_from([
            "etm",
            "synth",
            "--out",
            series.to_str().unwrap(),
            "--start",
            "2010-01-01",
            "--end",
            "2012-12-31",
            "--cadence-days",
            "5",
            "--fit",
            "--grid-steps",
            "5",
            "--no-progress",
            "--no-plot",
            "--export-fit",
            fit_json.to_str().unwrap(),
        ]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        handle_synth(args).unwrap();
        assert!(series.exists());

        let file = crate::io::read_fit_json(&fit_json).unwrap();
        assert_eq!(file.station, "J299");
        assert_eq!(file.components.len(), 3);
        // The 2013 event falls after the generated span.
        assert_eq!(file.events.len(), 1);

        handle_plot(PlotArgs {
            fit: fit_json,
            width: 40,
            height: 8,
        })
        .unwrap();
    }
}
