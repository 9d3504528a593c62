//! Fit every requested component of a station.
//!
//! Components are fitted one after another (each one already uses the pool
//! for its grid). A component that cannot be fitted is recorded in
//! `StationFit::skipped`; the station only fails when none could be fitted.

use crate::domain::{Component, ComponentFit, Event, GridSpec, StationFit, StationSeries};
use crate::error::{FitError, UnderdeterminedCause};
use crate::fit::cancel::CancelToken;
use crate::fit::optimizer::{OptimizeOptions, optimize};
use crate::fit::progress::GridObserver;

/// What to fit and how.
#[derive(Debug, Clone)]
pub struct StationFitPlan {
    pub grid: GridSpec,
    pub options: OptimizeOptions,
    pub components: Vec<Component>,
}

pub fn fit_station(
    series: &StationSeries,
    events: &[Event],
    plan: &StationFitPlan,
    cancel: &CancelToken,
    observer: &dyn GridObserver,
) -> Result<StationFit, FitError> {
    let mut in_span: Vec<Event> = events
        .iter()
        .filter(|e| series.span.contains(e.epoch))
        .cloned()
        .collect();
    in_span.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));

    let mut fits = Vec::new();
    let mut skipped = Vec::new();

    for &component in &plan.components {
        let samples = series.component(component);
        observer.on_stage(component.display_name());
        log::info!(
            "{} {}: fitting {} samples against {} events",
            series.station,
            component.display_name(),
            samples.len(),
            in_span.len()
        );

        match optimize(samples, &in_span, &plan.grid, &plan.options, cancel, observer) {
            Ok(result) => fits.push(ComponentFit { component, result }),
            // Same grid for every component: no point trying the others.
            Err(err @ FitError::InvalidGrid { .. }) => return Err(err),
            Err(err) => {
                log::warn!("{} {} skipped: {err}", series.station, component.display_name());
                skipped.push((component, err));
            }
        }
    }

    if fits.is_empty() {
        return Err(match skipped.into_iter().next() {
            Some((_, err)) => err,
            None => FitError::Underdetermined {
                cause: UnderdeterminedCause::InsufficientData,
                grid_size: plan.grid.len(),
                samples: 0,
            },
        });
    }

    Ok(StationFit {
        station: series.station.clone(),
        events: in_span,
        fits,
        skipped,
    })
}
