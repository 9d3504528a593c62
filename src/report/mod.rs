//! Reporting utilities: residuals, outliers, formatted output and result sinks.

pub mod format;
pub mod sink;

pub use format::*;
pub use sink::*;

use serde::Serialize;

use crate::domain::{Component, FitResult, Sample, StationFit, StationSeries};
use crate::error::AppError;
use crate::models::TrajectoryModel;

/// Observed vs fitted value of one sample.
#[derive(Debug, Clone, Serialize)]
pub struct SampleResidual {
    pub component: Component,
    pub epoch: f64,
    pub value: f64,
    pub sigma: f64,
    pub fitted: f64,
    pub residual: f64,
    /// `residual / sigma`.
    pub normalized_residual: f64,
}

/// Compute fitted values and residuals for each sample of one component.
pub fn compute_residuals(
    component: Component,
    samples: &[Sample],
    fit: &FitResult,
) -> Result<Vec<SampleResidual>, AppError> {
    let model = TrajectoryModel::of_fit(fit);
    let mut out = Vec::with_capacity(samples.len());
    for s in samples {
        let fitted = model.evaluate(&fit.params, s.epoch());
        if !fitted.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        let residual = s.value() - fitted;
        out.push(SampleResidual {
            component,
            epoch: s.epoch(),
            value: s.value(),
            sigma: s.sigma(),
            fitted,
            residual,
            normalized_residual: residual / s.sigma(),
        });
    }
    Ok(out)
}

/// Residuals of every fitted component, in ENU order.
pub fn station_residuals(series: &StationSeries, fit: &StationFit) -> Result<Vec<SampleResidual>, AppError> {
    let mut out = Vec::with_capacity(series.total_samples());
    for cf in &fit.fits {
        out.extend(compute_residuals(cf.component, series.component(cf.component), &cf.result)?);
    }
    Ok(out)
}

/// The `top_n` samples with the largest `|normalized residual|`.
pub fn rank_outliers(residuals: &[SampleResidual], top_n: usize) -> Vec<SampleResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| {
        b.normalized_residual
            .abs()
            .total_cmp(&a.normalized_residual.abs())
            .then_with(|| a.epoch.total_cmp(&b.epoch))
    });
    sorted.truncate(top_n);
    sorted
}
