//! Static SVG figure of a fitted station: three stacked panels (East, North,
//! Vertical) with observed samples, the fitted trajectory and event markers.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::{Component, Event, FitResult, Sample, StationFit, StationSeries, TimeSpan};
use crate::error::AppError;
use crate::io::CURVE_POINTS;
use crate::models::{TrajectoryModel, sample_curve};

pub const SVG_SIZE: (u32, u32) = (1200, 900);

/// Render the figure into an SVG document.
pub fn render_svg(series: &StationSeries, fit: &StationFit) -> Result<String, AppError> {
    let mut buf = String::new();
    {
        let root = SVGBackend::with_string(&mut buf, SVG_SIZE).into_drawing_area();
        draw_station(&root, series, fit)
            .map_err(|e| AppError::new(4, format!("Failed to render SVG plot: {e}")))?;
        root.present()
            .map_err(|e| AppError::new(4, format!("Failed to render SVG plot: {e}")))?;
    }
    Ok(buf)
}

/// Render the figure and write it to `path`.
pub fn write_svg(path: &Path, series: &StationSeries, fit: &StationFit) -> Result<(), AppError> {
    let svg = render_svg(series, fit)?;
    std::fs::write(path, svg)
        .map_err(|e| AppError::new(2, format!("Failed to write SVG '{}': {e}", path.display())))
}

fn draw_station<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    series: &StationSeries,
    fit: &StationFit,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;
    let root = root.titled(&format!("Station {}", series.station), ("sans-serif", 24))?;
    let panels = root.split_evenly((3, 1));

    for (i, (component, area)) in Component::ALL.into_iter().zip(panels.iter()).enumerate() {
        draw_component(
            area,
            component,
            series.component(component),
            fit.component(component),
            &fit.events,
            &series.span,
            i == 0,
        )?;
    }
    Ok(())
}

fn draw_component<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    component: Component,
    samples: &[Sample],
    fit: Option<&FitResult>,
    events: &[Event],
    span: &TimeSpan,
    legend: bool,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (x0, x1) = if span.end > span.start {
        (span.start, span.end)
    } else {
        (span.start - 0.5, span.start + 0.5)
    };

    let curve = fit
        .map(|f| sample_curve(&TrajectoryModel::of_fit(f), &f.params, x0, x1, CURVE_POINTS))
        .unwrap_or_default();
    let (y0, y1) = value_bounds(samples, &curve);

    let mut chart = ChartBuilder::on(area)
        .caption(component.display_name(), ("sans-serif", 18))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 30)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("year")
        .y_desc("m")
        .x_labels(10)
        .y_labels(5)
        .x_label_formatter(&|v| format!("{v:.1}"))
        .y_label_formatter(&|v| format!("{v:.3}"))
        .draw()?;

    let sample_color = RGBColor(30, 144, 255);
    let curve_color = RGBColor(200, 0, 100);
    let event_color = RGBColor(34, 139, 34);

    chart
        .draw_series(
            samples
                .iter()
                .map(|s| Circle::new((s.epoch(), s.value()), 1, sample_color.filled())),
        )?
        .label("observed")
        .legend(move |(x, y)| Circle::new((x + 10, y), 3, sample_color.filled()));

    if !curve.is_empty() {
        chart
            .draw_series(LineSeries::new(curve.iter().copied(), curve_color.stroke_width(2)))?
            .label("fitted")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], curve_color.stroke_width(2)));
    }

    let markers: Vec<f64> = events
        .iter()
        .map(|e| e.epoch)
        .filter(|t| (x0..=x1).contains(t))
        .collect();
    if !markers.is_empty() {
        chart
            .draw_series(
                markers
                    .iter()
                    .map(|&t| PathElement::new(vec![(t, y0), (t, y1)], event_color.mix(0.7).stroke_width(1))),
            )?
            .label("event")
            .legend(move |(x, y)| PathElement::new(vec![(x + 10, y - 6), (x + 10, y + 6)], event_color));
    }

    if legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn value_bounds(samples: &[Sample], curve: &[(f64, f64)]) -> (f64, f64) {
    let (lo, hi) = samples
        .iter()
        .map(|s| s.value())
        .chain(curve.iter().map(|&(_, y)| y))
        .filter(|y| y.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));

    if !(lo.is_finite() && hi.is_finite()) {
        return (-1.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-3);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, GridSpec};
    use crate::fit::{CancelToken, NoopObserver, OptimizeOptions, StationFitPlan, fit_station};

    fn fitted_station() -> (StationSeries, StationFit) {
        let east: Vec<Sample> = (0..60)
            .map(|i| {
                let t = 2010.0 + i as f64 / 20.0;
                let step = if t >= 2011.0 { 0.02 } else { 0.0 };
                Sample::new(t, 0.005 * (t - 2010.0) + step, 0.001).unwrap()
            })
            .collect();
        let series = StationSeries::new("TEST", Coordinate::new(38.0, 141.0), [east, Vec::new(), Vec::new()]).unwrap();
        let events = vec![Event::new("eq", 2011.0)];
        let plan = StationFitPlan {
            grid: GridSpec::new("t_relax", vec![10.0, 100.0]).unwrap(),
            options: OptimizeOptions::default(),
            components: Component::ALL.to_vec(),
        };
        let fit = fit_station(
            &series,
            &events,
            &plan,
            &CancelToken::new(),
            &NoopObserver,
        )
        .unwrap();
        (series, fit)
    }

    #[test]
    fn renders_three_panels() {
        let (series, fit) = fitted_station();
        let svg = render_svg(&series, &fit).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("East"));
        assert!(svg.contains("North"));
        assert!(svg.contains("Vertical"));
        assert!(svg.contains("Station TEST"));
    }

    #[test]
    fn writes_file_and_reports_bad_path() {
        let (series, fit) = fitted_station();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.svg");
        write_svg(&path, &series, &fit).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));

        let bad = dir.path().join("missing").join("plot.svg");
        assert_eq!(write_svg(&bad, &series, &fit).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn flat_values_still_get_a_range() {
        let samples = vec![Sample::new(2010.0, 0.5, 0.001).unwrap()];
        let (lo, hi) = value_bounds(&samples, &[]);
        assert!(lo < 0.5 && hi > 0.5);
        assert_eq!(value_bounds(&[], &[]), (-1.0, 1.0));
    }
}
