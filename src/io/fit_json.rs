//! Read/write fit JSON files.
//!
//! Fit JSON is the "portable" representation of a station fit:
//! - station, reference coordinate, span and events
//! - per component: parameters (typed and named), quality, the grid profile
//! - a precomputed fitted curve for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{
    ComponentFile, CurveGrid, DecayKind, FitFile, GridPointStatus, GridRow, NamedValue, StationFit,
    StationSeries, WeightMode,
};
use crate::error::AppError;
use crate::models::{TrajectoryModel, sample_curve};

/// Points of the precomputed fitted curve.
pub const CURVE_POINTS: usize = 201;

const TOOL: &str = "gnss-etm";

/// Build the serializable form of a station fit.
pub fn build_fit_file(series: &StationSeries, fit: &StationFit) -> FitFile {
    let (decay, weighting) = fit
        .fits
        .first()
        .map(|f| (f.result.decay, f.result.weighting))
        .unwrap_or((DecayKind::Logarithmic, WeightMode::Sigma));

    let components = fit
        .fits
        .iter()
        .map(|cf| {
            let result = &cf.result;
            let model = TrajectoryModel::of_fit(result);
            let (epochs, values) =
                sample_curve(&model, &result.params, series.span.start, series.span.end, CURVE_POINTS)
                    .into_iter()
                    .unzip();
            ComponentFile {
                component: cf.component,
                t0: result.t0,
                partial: result.partial,
                params: result.params.clone(),
                named: result
                    .params
                    .named()
                    .into_iter()
                    .map(|(name, value)| NamedValue { name, value })
                    .collect(),
                quality: result.quality.clone(),
                grid: result
                    .grid
                    .iter()
                    .map(|p| GridRow {
                        t_relax: p.t_relax.clone(),
                        residual: (p.status == GridPointStatus::Evaluated).then_some(p.residual),
                        status: p.status,
                    })
                    .collect(),
                curve: CurveGrid { epochs, values },
            }
        })
        .collect();

    FitFile {
        tool: TOOL.to_string(),
        station: fit.station.clone(),
        reference: series.reference,
        span: series.span,
        decay,
        weighting,
        events: fit.events.clone(),
        components,
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, file: &FitFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Component, Coordinate, Event, GridSpec, Sample};
    use crate::fit::{CancelToken, NoopObserver, OptimizeOptions, StationFitPlan, fit_station};

    fn fitted_station() -> (StationSeries, StationFit) {
        let samples: Vec<Sample> = (0..60)
            .map(|i| {
                let t = 2010.0 + i as f64 * 0.05;
                let step = if t >= 2011.0 { 0.03 } else { 0.0 };
                Sample::new(t, 0.01 * (t - 2010.0) + step, 0.002).unwrap()
            })
            .collect();
        let series = StationSeries::new(
            "TEST",
            Coordinate::new(38.3, 141.5),
            [samples.clone(), samples, Vec::new()],
        )
        .unwrap();
        let plan = StationFitPlan {
            grid: GridSpec::new("t_relax", vec![10.0, 100.0]).unwrap(),
            options: OptimizeOptions::default(),
            components: vec![Component::East, Component::North, Component::Up],
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
    fn fit_file_round_trips_through_json() {
        let (series, fit) = fitted_station();
        let file = build_fit_file(&series, &fit);
        assert_eq!(file.components.len(), 2);
        assert_eq!(file.components[0].curve.epochs.len(), CURVE_POINTS);
        assert_eq!(file.components[0].curve.epochs[0], series.span.start);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_fit_json(&path, &file).unwrap();
        let back = read_fit_json(&path).unwrap();

        assert_eq!(back.station, "TEST");
        assert_eq!(back.events.len(), 1);
        assert_eq!(back.components[1].component, Component::North);
        assert_eq!(back.components[0].params, file.components[0].params);
        assert!(back.components[0].named.iter().any(|n| n.name == "offset[eq]"));
    }

    #[test]
    fn skipped_grid_points_serialize_as_null() {
        let (series, mut fit) = fitted_station();
        fit.fits[0].result.grid[1].status = GridPointStatus::Singular;
        fit.fits[0].result.grid[1].residual = f64::INFINITY;
        let file = build_fit_file(&series, &fit);
        let json = serde_json::to_value(&file).unwrap();
        assert!(json["components"][0]["grid"][1]["residual"].is_null());
        assert!(json["components"][0]["grid"][0]["residual"].is_number());
    }

    #[test]
    fn invalid_json_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(read_fit_json(&path).unwrap_err().exit_code(), 2);
    }
}
