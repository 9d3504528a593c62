//! Extended trajectory model evaluation.
//!
//! ```text
//! value(t) = intercept + rate·(t − t0)
//!          + Σ_{e: epoch_e ≤ t} [ offset_e + amplitude_e · f(Δt_e, T_e) ]
//!          + seasonal(t)
//! ```
//!
//! with `Δt_e` in days. The search relies on two primitive operations:
//! - build a design row for fixed relaxation constants (for least squares)
//! - evaluate `value(t)` from a parameter vector (for residuals/plots)

use std::f64::consts::TAU;

use crate::domain::{DAYS_PER_YEAR, DecayKind, Event, FitResult, ParameterVector};
use crate::math::relaxation;

/// One term of the model that enters linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearTerm {
    Intercept,
    Rate,
    /// Heaviside step at event `i`.
    Offset(usize),
    /// Relaxation of event `i`.
    Amplitude(usize),
    AnnualSin,
    AnnualCos,
    SemiannualSin,
    SemiannualCos,
}

/// Model configuration shared by every candidate of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryModel {
    /// Reference epoch of the secular term (first epoch of the series).
    pub t0: f64,
    pub decay: DecayKind,
    /// Include annual and semi-annual terms.
    pub seasonal: bool,
}

impl TrajectoryModel {
    pub fn new(t0: f64, decay: DecayKind) -> Self {
        Self {
            t0,
            decay,
            seasonal: false,
        }
    }

    pub fn with_seasonal(mut self, seasonal: bool) -> Self {
        self.seasonal = seasonal;
        self
    }

    /// The model a fit was produced with.
    pub fn of_fit(fit: &FitResult) -> Self {
        Self::new(fit.t0, fit.decay).with_seasonal(fit.params.seasonal.is_some())
    }

    /// Every linear term for a model with `n_events` events, in column order.
    pub fn terms(&self, n_events: usize) -> Vec<LinearTerm> {
        let mut out = vec![LinearTerm::Intercept, LinearTerm::Rate];
        for i in 0..n_events {
            out.push(LinearTerm::Offset(i));
            out.push(LinearTerm::Amplitude(i));
        }
        if self.seasonal {
            out.extend([
                LinearTerm::AnnualSin,
                LinearTerm::AnnualCos,
                LinearTerm::SemiannualSin,
                LinearTerm::SemiannualCos,
            ]);
        }
        out
    }

    /// Value of a single basis column at epoch `t`.
    ///
    /// `t_relax` holds one relaxation constant per event (days).
    pub fn basis(&self, term: LinearTerm, t: f64, events: &[Event], t_relax: &[f64]) -> f64 {
        match term {
            LinearTerm::Intercept => 1.0,
            LinearTerm::Rate => t - self.t0,
            LinearTerm::Offset(i) => {
                if t >= events[i].epoch {
                    1.0
                } else {
                    0.0
                }
            }
            LinearTerm::Amplitude(i) => {
                let dt_days = (t - events[i].epoch) * DAYS_PER_YEAR;
                relaxation(self.decay, dt_days, t_relax[i])
            }
            LinearTerm::AnnualSin => (TAU * t).sin(),
            LinearTerm::AnnualCos => (TAU * t).cos(),
            LinearTerm::SemiannualSin => (2.0 * TAU * t).sin(),
            LinearTerm::SemiannualCos => (2.0 * TAU * t).cos(),
        }
    }

    /// Fill a design row for the given terms.
    ///
    /// # Panics
    /// Panics if `out` is shorter than `terms`, or if `events`/`t_relax` are
    /// shorter than the event indices referenced by `terms`.
    pub fn fill_design_row(
        &self,
        terms: &[LinearTerm],
        t: f64,
        events: &[Event],
        t_relax: &[f64],
        out: &mut [f64],
    ) {
        for (slot, &term) in out.iter_mut().zip(terms) {
            *slot = self.basis(term, t, events, t_relax);
        }
    }

    /// Secular part only: `intercept + rate·(t − t0)`.
    pub fn secular(&self, params: &ParameterVector, epoch: f64) -> f64 {
        params.intercept + params.rate * (epoch - self.t0)
    }

    /// Evaluate the full trajectory at `epoch`.
    ///
    /// Events after `epoch` contribute nothing.
    pub fn evaluate(&self, params: &ParameterVector, epoch: f64) -> f64 {
        let mut value = self.secular(params, epoch);
        for term in &params.events {
            if epoch >= term.event.epoch {
                let dt_days = (epoch - term.event.epoch) * DAYS_PER_YEAR;
                value += term.offset + term.amplitude * relaxation(self.decay, dt_days, term.t_relax);
            }
        }
        if let Some(s) = &params.seasonal {
            value += s.annual_sin * (TAU * epoch).sin()
                + s.annual_cos * (TAU * epoch).cos()
                + s.semiannual_sin * (2.0 * TAU * epoch).sin()
                + s.semiannual_cos * (2.0 * TAU * epoch).cos();
        }
        value
    }
}

/// Sample the trajectory on `n` evenly spaced epochs in `[start, end]`.
pub fn sample_curve(
    model: &TrajectoryModel,
    params: &ParameterVector,
    start: f64,
    end: f64,
    n: usize,
) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let t = start + u * (end - start);
        out.push((t, model.evaluate(params, t)));
    }
    out
}
