//! Result sinks: where a finished station fit goes.

use std::path::PathBuf;

use crate::domain::{StationFit, StationSeries};
use crate::error::AppError;
use crate::io::{IngestReport, build_displacement_map, build_fit_file, write_fit_json, write_geojson, write_residuals_csv};
use crate::plot::{render_component_plot, write_svg};
use crate::report::{SampleResidual, format_grid_table, format_outliers, format_station_summary, rank_outliers};

/// Everything a sink may need about one fitted station.
#[derive(Debug, Clone, Copy)]
pub struct FitOutput<'a> {
    pub series: &'a StationSeries,
    pub report: &'a IngestReport,
    pub fit: &'a StationFit,
    pub residuals: &'a [SampleResidual],
}

pub trait ResultSink {
    /// Short label for logs.
    fn name(&self) -> String;

    fn emit(&self, output: &FitOutput<'_>) -> Result<(), AppError>;
}

/// Human-readable report on stdout.
#[derive(Debug, Clone)]
pub struct TerminalSink {
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub grid_table: bool,
    pub top_outliers: usize,
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self {
            plot: true,
            plot_width: 72,
            plot_height: 14,
            grid_table: false,
            top_outliers: 5,
        }
    }
}

impl TerminalSink {
    pub fn render(&self, output: &FitOutput<'_>) -> String {
        let mut out = format_station_summary(output.series, output.report, output.fit);

        for cf in &output.fit.fits {
            if self.grid_table {
                out.push_str(&format!("{} grid:\n", cf.component.display_name()));
                out.push_str(&format_grid_table(&cf.result));
                out.push('\n');
            }
        }

        let outliers = rank_outliers(output.residuals, self.top_outliers);
        if !outliers.is_empty() {
            out.push_str(&format_outliers(&outliers));
            out.push('\n');
        }

        if self.plot {
            for cf in &output.fit.fits {
                out.push_str(&render_component_plot(
                    cf.component,
                    output.series.component(cf.component),
                    &cf.result,
                    &output.fit.events,
                    self.plot_width,
                    self.plot_height,
                    Some(outliers.as_slice()),
                ));
                out.push('\n');
            }
        }

        out
    }
}

impl ResultSink for TerminalSink {
    fn name(&self) -> String {
        "terminal".to_string()
    }

    fn emit(&self, output: &FitOutput<'_>) -> Result<(), AppError> {
        print!("{}", self.render(output));
        Ok(())
    }
}

/// Per-sample residual CSV.
#[derive(Debug, Clone)]
pub struct CsvSink {
    pub path: PathBuf,
}

impl ResultSink for CsvSink {
    fn name(&self) -> String {
        format!("residual CSV {}", self.path.display())
    }

    fn emit(&self, output: &FitOutput<'_>) -> Result<(), AppError> {
        write_residuals_csv(&self.path, output.residuals)
    }
}

/// Fit JSON, readable back by `etm plot`.
#[derive(Debug, Clone)]
pub struct FitJsonSink {
    pub path: PathBuf,
}

impl ResultSink for FitJsonSink {
    fn name(&self) -> String {
        format!("fit JSON {}", self.path.display())
    }

    fn emit(&self, output: &FitOutput<'_>) -> Result<(), AppError> {
        write_fit_json(&self.path, &build_fit_file(output.series, output.fit))
    }
}

/// GeoJSON station marker + velocity vector.
#[derive(Debug, Clone)]
pub struct GeoJsonSink {
    pub path: PathBuf,
}

impl ResultSink for GeoJsonSink {
    fn name(&self) -> String {
        format!("GeoJSON map {}", self.path.display())
    }

    fn emit(&self, output: &FitOutput<'_>) -> Result<(), AppError> {
        write_geojson(&self.path, &build_displacement_map(&output.series.reference, output.fit))
    }
}

/// Three-panel SVG time-series figure.
#[derive(Debug, Clone)]
pub struct SvgSink {
    pub path: PathBuf,
}

impl ResultSink for SvgSink {
    fn name(&self) -> String {
        format!("SVG plot {}", self.path.display())
    }

    fn emit(&self, output: &FitOutput<'_>) -> Result<(), AppError> {
        write_svg(&self.path, output.series, output.fit)
    }
}

/// Run every sink in order, stopping at the first failure.
pub fn emit_all(sinks: &[Box<dyn ResultSink>], output: &FitOutput<'_>) -> Result<(), AppError> {
    for sink in sinks {
        sink.emit(output)?;
        log::info!("wrote {}", sink.name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Component, Coordinate, Event, GridSpec, Sample};
    use crate::fit::{CancelToken, NoopObserver, OptimizeOptions, StationFitPlan, fit_station};
    use crate::report::station_residuals;

    fn fitted() -> (StationSeries, StationFit) {
        let make = |rate: f64| -> Vec<Sample> {
            (0..80)
                .map(|i| {
                    let t = 2010.0 + i as f64 * 0.025;
                    let step = if t >= 2011.0 { 0.04 } else { 0.0 };
                    let wiggle = if i % 2 == 0 { 0.0005 } else { -0.0005 };
                    Sample::new(t, rate * (t - 2010.0) + step + wiggle, 0.001).unwrap()
                })
                .collect()
        };
        let series = StationSeries::new(
            "J299",
            Coordinate::new(38.3, 141.5),
            [make(0.0066), make(-0.0083), make(-0.002)],
        )
        .unwrap();
        let plan = StationFitPlan {
            grid: GridSpec::new("t_relax", vec![10.0, 100.0, 400.0]).unwrap(),
            options: OptimizeOptions::default(),
            components: Component::ALL.to_vec(),
        };
        let fit = fit_station(
            &series,
            &[Event::new("eq", 2011.0)],
            &plan,
            &CancelToken::new(),
            &NoopObserver,
        )
        .unwrap();
        (series, fit)
    }

    #[test]
    fn terminal_report_includes_summary_outliers_and_plots() {
        let (series, fit) = fitted();
        let residuals = station_residuals(&series, &fit).unwrap();
        let report = IngestReport::default();
        let output = FitOutput {
            series: &series,
            report: &report,
            fit: &fit,
            residuals: &residuals,
        };
        let sink = TerminalSink {
            grid_table: true,
            ..TerminalSink::default()
        };

        let txt = sink.render(&output);
        assert!(txt.contains("Station: J299"));
        assert!(txt.contains("East grid:"));
        assert!(txt.contains("Largest residuals:"));
        assert!(txt.contains("Vertical: epoch=["));
    }

    #[test]
    fn file_sinks_write_their_outputs() {
        let (series, fit) = fitted();
        let residuals = station_residuals(&series, &fit).unwrap();
        let report = IngestReport::default();
        let output = FitOutput {
            series: &series,
            report: &report,
            fit: &fit,
            residuals: &residuals,
        };
        let dir = tempfile::tempdir().unwrap();
        let sinks: Vec<Box<dyn ResultSink>> = vec![
            Box::new(CsvSink { path: dir.path().join("r.csv") }),
            Box::new(FitJsonSink { path: dir.path().join("fit.json") }),
            Box::new(GeoJsonSink { path: dir.path().join("map.geojson") }),
            Box::new(SvgSink { path: dir.path().join("plot.svg") }),
        ];

        emit_all(&sinks, &output).unwrap();
        for name in ["r.csv", "fit.json", "map.geojson", "plot.svg"] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
        let csv = std::fs::read_to_string(dir.path().join("r.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1 + 240);
    }

    #[test]
    fn failing_sink_stops_the_chain() {
        let (series, fit) = fitted();
        let report = IngestReport::default();
        let output = FitOutput {
            series: &series,
            report: &report,
            fit: &fit,
            residuals: &[],
        };
        let dir = tempfile::tempdir().unwrap();
        let sinks: Vec<Box<dyn ResultSink>> = vec![
            Box::new(CsvSink { path: dir.path().join("nope").join("r.csv") }),
            Box::new(FitJsonSink { path: dir.path().join("fit.json") }),
        ];
        assert_eq!(emit_all(&sinks, &output).unwrap_err().exit_code(), 2);
        assert!(!dir.path().join("fit.json").exists());
    }
}
