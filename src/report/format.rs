//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::domain::{
    Component, Event, FitResult, GridPointStatus, StationFit, StationSeries, date_from_decimal_year,
};
use crate::io::IngestReport;
use crate::report::SampleResidual;

/// Format the full run summary (dataset stats + events + per-component fits).
pub fn format_station_summary(series: &StationSeries, report: &IngestReport, fit: &StationFit) -> String {
    let mut out = String::new();

    out.push_str("=== etm - GNSS Trajectory Model Fit ===\n");
    out.push_str(&format!(
        "Station: {} | ref=({:.4}, {:.4})\n",
        series.station, series.reference.latitude, series.reference.longitude
    ));
    out.push_str(&format!(
        "Span: [{:.4}, {:.4}] ({:.2} yr)\n",
        series.span.start,
        series.span.end,
        series.span.end - series.span.start
    ));
    out.push_str(&format!(
        "Samples: E={} N={} U={} | dropped E={} N={} U={} | bad rows={}\n",
        series.east.len(),
        series.north.len(),
        series.up.len(),
        report.dropped(Component::East),
        report.dropped(Component::North),
        report.dropped(Component::Up),
        report.row_errors.len(),
    ));

    out.push_str(&format!("\nEvents ({}):\n", fit.events.len()));
    if fit.events.is_empty() {
        out.push_str("  (none in span: secular model only)\n");
    }
    for e in &fit.events {
        out.push_str(&format_event_line(e));
        out.push('\n');
    }

    for cf in &fit.fits {
        out.push('\n');
        out.push_str(&format_component_fit(cf.component, &cf.result));
    }
    for (component, reason) in &fit.skipped {
        out.push_str(&format!("\n(skipped {}) {reason}\n", component.display_name()));
    }
    out.push('\n');

    out
}

fn format_event_line(e: &Event) -> String {
    let date = date_from_decimal_year(e.epoch)
        .map(|d| d.to_string())
        .unwrap_or_default();
    let magnitude = e.magnitude.map(|m| format!("M{m:.1}")).unwrap_or_default();
    format!(
        "  - {:<20} {:>10.5} {:<10} {:<5} {}",
        truncate(&e.id, 20),
        e.epoch,
        date,
        magnitude,
        e.label.as_deref().unwrap_or("")
    )
    .trim_end()
    .to_string()
}

/// Parameters and diagnostics of one component.
pub fn format_component_fit(component: Component, fit: &FitResult) -> String {
    let mut out = String::new();
    let grid_size = fit.grid.len();

    out.push_str(&format!("{}:\n", component.display_name()));
    if !fit.params.events.is_empty() {
        out.push_str(&format!(
            "  T_relax: {} d | grid {}/{} evaluated\n",
            fmt_vec(&fit.params.relaxation_constants(), 1),
            fit.evaluated(),
            grid_size
        ));
    }
    for (name, value) in fit.params.named() {
        if name.starts_with("t_relax[") {
            continue;
        }
        out.push_str(&format!("  {:<32} {:>12.6}\n", truncate(&name, 32), value));
    }

    let q = &fit.quality;
    let chi2 = q
        .chi2_reduced
        .map(|c| format!("{c:.3}"))
        .unwrap_or_else(|| "n/a".to_string());
    out.push_str(&format!(
        "  n={} params={} SSE={:.4} RMSE={:.5}m WRMS={:.5}m chi2_red={chi2}\n",
        q.n, q.n_params, q.sse, q.rmse, q.wrms
    ));
    if fit.partial {
        out.push_str(&format!(
            "  (partial: search cancelled, {}/{} grid points evaluated)\n",
            fit.evaluated(),
            grid_size
        ));
    }

    out
}

/// Per-grid-point residual table, selected point marked with `*`.
pub fn format_grid_table(fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<1} {:>5} {:<24} {:>16} {:<13}", "", "#", "t_relax", "residual", "status").trim_end());
    out.push('\n');
    out.push_str(&format!("{:-<1} {:-<5} {:-<24} {:-<16} {:-<13}", "", "", "", "", ""));
    out.push('\n');

    for p in &fit.grid {
        let mark = if p.index == fit.selected { "*" } else { " " };
        let residual = if p.residual.is_finite() {
            format!("{:.6}", p.residual)
        } else {
            "inf".to_string()
        };
        out.push_str(
            format!(
                "{mark} {:>5} {:<24} {:>16} {:<13}",
                p.index,
                truncate(&fmt_vec(&p.t_relax, 1), 24),
                residual,
                status_label(p.status)
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Largest normalized residuals.
pub fn format_outliers(rows: &[SampleResidual]) -> String {
    let mut out = String::new();
    out.push_str("Largest residuals:\n");
    out.push_str(
        format!(
            "{:<9} {:>10} {:>12} {:>12} {:>12} {:>8}",
            "component", "epoch", "value", "fitted", "residual", "sigmas"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<9} {:-<10} {:-<12} {:-<12} {:-<12} {:-<8}",
        "", "", "", "", "", ""
    ));
    out.push('\n');

    for r in rows {
        out.push_str(&format!(
            "{:<9} {:>10.4} {:>12.5} {:>12.5} {:>12.5} {:>8.2}",
            r.component.display_name(),
            r.epoch,
            r.value,
            r.fitted,
            r.residual,
            r.normalized_residual
        ));
        out.push('\n');
    }

    out
}

fn status_label(status: GridPointStatus) -> &'static str {
    match status {
        GridPointStatus::Evaluated => "evaluated",
        GridPointStatus::Singular => "singular",
        GridPointStatus::NotEvaluated => "not evaluated",
    }
}

fn fmt_vec(v: &[f64], decimals: usize) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.decimals$}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ComponentFit, Coordinate, DecayKind, EventTerms, FitQuality, GridPoint, ParameterVector, Sample,
        WeightMode,
    };
    use crate::error::{FitError, UnderdeterminedCause};

    fn fit_with_event() -> FitResult {
        let mut params = ParameterVector::secular(0.01, 0.0066);
        params.events.push(EventTerms {
            event: Event::new("tohoku-2011", 2011.1897),
            offset: 2.1,
            amplitude: 0.28,
            t_relax: 320.2,
        });
        FitResult {
            params,
            residual: 1.5,
            grid: vec![
                GridPoint {
                    index: 0,
                    t_relax: vec![10.0],
                    residual: 9.0,
                    status: GridPointStatus::Evaluated,
                },
                GridPoint {
                    index: 1,
                    t_relax: vec![320.2],
                    residual: 1.5,
                    status: GridPointStatus::Evaluated,
                },
                GridPoint {
                    index: 2,
                    t_relax: vec![400.0],
                    residual: f64::INFINITY,
                    status: GridPointStatus::NotEvaluated,
                },
            ],
            selected: 1,
            quality: FitQuality {
                n: 100,
                n_params: 5,
                sse: 1.5,
                rmse: 0.0012,
                wrms: 0.0011,
                chi2_reduced: Some(1.5 / 95.0),
            },
            t0: 2010.0,
            decay: DecayKind::Logarithmic,
            weighting: WeightMode::Sigma,
            partial: true,
        }
    }

    #[test]
    fn component_block_lists_parameters_and_partial_flag() {
        let txt = format_component_fit(Component::East, &fit_with_event());
        assert!(txt.starts_with("East:\n"));
        assert!(txt.contains("T_relax: [320.2] d | grid 2/3 evaluated"));
        assert!(txt.contains("offset[tohoku-2011]"));
        assert!(txt.contains("amplitude[tohoku-2011]"));
        assert!(!txt.contains("  t_relax["));
        assert!(txt.contains("chi2_red=0.016"));
        assert!(txt.contains("(partial: search cancelled, 2/3 grid points evaluated)"));
    }

    #[test]
    fn grid_table_marks_selected_and_infinite_rows() {
        let txt = format_grid_table(&fit_with_event());
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[3].starts_with('*'));
        assert!(lines[3].contains("[320.2]"));
        assert!(lines[4].contains("inf"));
        assert!(lines[4].ends_with("not evaluated"));
    }

    #[test]
    fn summary_mentions_events_and_skipped_components() {
        let series = StationSeries::new(
            "J299",
            Coordinate::new(38.3, 141.5),
            [
                vec![Sample::new(2010.0, 0.0, 0.001).unwrap(), Sample::new(2012.0, 0.0, 0.001).unwrap()],
                Vec::new(),
                Vec::new(),
            ],
        )
        .unwrap();
        let mut event = Event::new("tohoku-2011", 2011.1897);
        event.magnitude = Some(9.1);
        let fit = StationFit {
            station: "J299".to_string(),
            events: vec![event],
            fits: vec![ComponentFit {
                component: Component::East,
                result: fit_with_event(),
            }],
            skipped: vec![(
                Component::North,
                FitError::Underdetermined {
                    cause: UnderdeterminedCause::InsufficientData,
                    grid_size: 3,
                    samples: 0,
                },
            )],
        };
        let mut report = IngestReport::default();
        report.dropped[2] = 4;

        let txt = format_station_summary(&series, &report, &fit);
        assert!(txt.contains("Station: J299 | ref=(38.3000, 141.5000)"));
        assert!(txt.contains("dropped E=0 N=0 U=4"));
        assert!(txt.contains("tohoku-2011"));
        assert!(txt.contains("2011-03-1"));
        assert!(txt.contains("M9.1"));
        assert!(txt.contains("(skipped North)"));
        assert!(txt.contains("insufficient data"));
    }

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
