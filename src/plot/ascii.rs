//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed samples: `o`
//! - fitted trajectory: `-` line
//! - events: `|` column
//! - optional highlights: `X` (largest normalized residuals)

use crate::domain::{Component, CurveGrid, Event, FitResult, Sample};
use crate::models::{TrajectoryModel, sample_curve};
use crate::report::SampleResidual;

/// Render one component with its fitted trajectory.
pub fn render_component_plot(
    component: Component,
    samples: &[Sample],
    fit: &FitResult,
    events: &[Event],
    width: usize,
    height: usize,
    outliers: Option<&[SampleResidual]>,
) -> String {
    let (t_min, t_max) = epoch_range(samples.iter().map(|s| s.epoch())).unwrap_or((fit.t0, fit.t0 + 1.0));
    let model = TrajectoryModel::of_fit(fit);
    let curve = sample_curve(&model, &fit.params, t_min, t_max, width.max(2));
    let points: Vec<(f64, f64)> = samples.iter().map(|s| (s.epoch(), s.value())).collect();
    let highlights: Vec<(f64, f64)> = outliers
        .unwrap_or_default()
        .iter()
        .filter(|r| r.component == component)
        .map(|r| (r.epoch, r.value))
        .collect();

    render_plot(
        component.display_name(),
        &points,
        Some(curve.as_slice()),
        events,
        &highlights,
        (t_min, t_max),
        width,
        height,
    )
}

/// Render a saved curve (no observed samples).
pub fn render_curve_plot(label: &str, curve: &CurveGrid, events: &[Event], width: usize, height: usize) -> String {
    let (t_min, t_max) = epoch_range(curve.epochs.iter().copied()).unwrap_or((0.0, 1.0));
    let points: Vec<(f64, f64)> = curve
        .epochs
        .iter()
        .zip(curve.values.iter())
        .map(|(&t, &y)| (t, y))
        .collect();

    render_plot(label, &[], Some(points.as_slice()), events, &[], (t_min, t_max), width, height)
}

#[allow(clippy::too_many_arguments)]
fn render_plot(
    label: &str,
    points: &[(f64, f64)],
    curve_points: Option<&[(f64, f64)]>,
    events: &[Event],
    highlights: &[(f64, f64)],
    (t_min, t_max): (f64, f64),
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    // Determine y-range from observed points and curve points.
    let (y_min, y_max) = y_range(points, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first, then event columns in the gaps, then points on top.
    if let Some(curve) = curve_points {
        draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);
    }

    for e in events.iter().filter(|e| e.epoch >= t_min && e.epoch <= t_max) {
        let x = map_x(e.epoch, t_min, t_max, width);
        for row in grid.iter_mut() {
            if row[x] == ' ' {
                row[x] = '|';
            }
        }
    }

    for &(t, y) in points {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        grid[yy][x] = 'o';
    }
    for &(t, y) in highlights {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        grid[yy][x] = 'X';
    }

    // Build final string. We include a small header with ranges.
    let mut out = String::new();
    out.push_str(&format!(
        "{label}: epoch=[{t_min:.3}, {t_max:.3}] | value=[{y_min:.4}, {y_max:.4}] m\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn epoch_range(epochs: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_t = f64::INFINITY;
    let mut max_t = f64::NEG_INFINITY;
    for t in epochs {
        min_t = min_t.min(t);
        max_t = max_t.max(t);
    }
    if min_t.is_finite() && max_t.is_finite() && max_t > min_t {
        Some((min_t, max_t))
    } else {
        None
    }
}

fn y_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for &(_, y) in points.iter().chain(curve.unwrap_or_default()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
