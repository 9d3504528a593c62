//! Relaxation grid generation.
//!
//! `T_relax` enters the model nonlinearly, so we search it over a deterministic
//! grid and solve every other parameter in closed form per candidate.
//!
//! Why grid search?
//! - It avoids local minima issues common in nonlinear optimization.
//! - It is deterministic given the same inputs/flags.
//! - It records the whole residual profile, not just the minimum.

use crate::domain::{GridSpacing, GridSpec, RelaxationMode};
use crate::error::FitError;

/// Name of the searched parameter.
pub const T_RELAX: &str = "t_relax";

/// Upper bound on enumerated candidate tuples (per-event cross products grow fast).
pub const MAX_CANDIDATES: usize = 1_000_000;

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    check_range(min, max, steps)?;
    if steps == 1 {
        return Ok(vec![min]);
    }
    let step = (max - min) / (steps as f64 - 1.0);
    let mut out: Vec<f64> = (0..steps).map(|i| min + step * i as f64).collect();
    // Land exactly on the upper bound.
    out[steps - 1] = max;
    Ok(out)
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    check_range(min, max, steps)?;
    if steps == 1 {
        return Ok(vec![min]);
    }
    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out: Vec<f64> = (0..steps).map(|i| (ln_min + step * i as f64).exp()).collect();
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}

fn check_range(min: f64, max: f64, steps: usize) -> Result<(), FitError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max >= min) {
        return Err(FitError::InvalidGrid {
            parameter: T_RELAX.to_string(),
            reason: format!("range min={min}, max={max} must be finite, > 0 and max >= min"),
        });
    }
    if steps == 0 {
        return Err(FitError::InvalidGrid {
            parameter: T_RELAX.to_string(),
            reason: "steps must be >= 1".to_string(),
        });
    }
    Ok(())
}

/// Build the relaxation grid from a range.
pub fn relaxation_grid(min: f64, max: f64, steps: usize, spacing: GridSpacing) -> Result<GridSpec, FitError> {
    let values = match spacing {
        GridSpacing::Linear => lin_space(min, max, steps)?,
        GridSpacing::Log => log_space(min, max, steps)?,
    };
    GridSpec::new(T_RELAX, values)
}

/// Number of searched dimensions for `n_events` events.
pub fn grid_dims(mode: RelaxationMode, n_events: usize) -> usize {
    match mode {
        RelaxationMode::Shared => 1,
        RelaxationMode::PerEvent => n_events.max(1),
    }
}

/// Enumerate candidate tuples: the `dims`-fold cross product of the grid values.
///
/// Tuples are produced in lexicographic order of grid position.
pub fn candidate_tuples(grid: &GridSpec, dims: usize) -> Result<Vec<Vec<f64>>, FitError> {
    let values = grid.values();
    if values.is_empty() {
        return Ok(Vec::new());
    }
    let dims = dims.max(1);
    let total = (values.len() as u128).checked_pow(dims as u32);
    if total.is_none_or(|n| n > MAX_CANDIDATES as u128) {
        return Err(FitError::InvalidGrid {
            parameter: grid.parameter().to_string(),
            reason: format!(
                "{} candidates over {dims} dimensions exceeds {MAX_CANDIDATES} grid points",
                values.len()
            ),
        });
    }

    let mut out: Vec<Vec<f64>> = vec![Vec::new()];
    for _ in 0..dims {
        let mut next = Vec::with_capacity(out.len() * values.len());
        for prefix in &out {
            for &v in values {
                let mut tuple = prefix.clone();
                tuple.push(v);
                next.push(tuple);
            }
        }
        out = next;
    }
    Ok(out)
}

/// Expand a candidate tuple into one relaxation constant per event.
pub fn per_event_constants(tuple: &[f64], mode: RelaxationMode, n_events: usize) -> Vec<f64> {
    match mode {
        RelaxationMode::Shared => vec![tuple[0]; n_events],
        RelaxationMode::PerEvent => tuple.iter().copied().take(n_events).collect(),
    }
}
