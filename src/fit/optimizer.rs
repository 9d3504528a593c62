//! Grid search over relaxation constants.
//!
//! Given:
//! - samples `(t_i, y_i, σ_i)` of one component
//! - events inside the sample span
//! - a grid of candidate `T_relax` values
//!
//! we solve, for each candidate tuple:
//! - a weighted least squares problem for every linear parameter (intercept,
//!   rate, offsets, relaxation amplitudes, seasonal terms)
//! - the resulting weighted SSE
//!
//! and return the best (lowest SSE) candidate together with the full residual
//! table. This is separable nonlinear least squares: only `T_relax` is
//! searched, everything else has a closed-form solution per candidate.

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{
    DecayKind, Event, EventTerms, FitQuality, FitResult, GridPoint, GridPointStatus, GridSpec,
    ParameterVector, RelaxationMode, Sample, SeasonalTerms, TimeSpan, WeightMode,
};
use crate::error::{FitError, UnderdeterminedCause};
use crate::fit::cancel::CancelToken;
use crate::fit::grid::{candidate_tuples, grid_dims, per_event_constants};
use crate::fit::progress::GridObserver;
use crate::math::{SolveError, solve_least_squares};
use crate::models::{LinearTerm, TrajectoryModel};

/// Linear parameters held at a caller-supplied value instead of being solved.
///
/// A fixed term is moved to the left-hand side (`y − fixed·column`) and its
/// column dropped, so the solve has one degree of freedom less.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixedParams {
    pub intercept: Option<f64>,
    pub rate: Option<f64>,
}

/// How grid points are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// In grid order on the calling thread.
    Sequential,
    /// One rayon task per grid point on the current pool.
    Parallel,
}

/// Options that affect how a component is fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    pub decay: DecayKind,
    pub weighting: WeightMode,
    pub relaxation: RelaxationMode,
    pub seasonal: bool,
    pub fixed: FixedParams,
    pub parallelism: Parallelism,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            decay: DecayKind::Logarithmic,
            weighting: WeightMode::Sigma,
            relaxation: RelaxationMode::Shared,
            seasonal: false,
            fixed: FixedParams::default(),
            parallelism: Parallelism::Parallel,
        }
    }
}

#[derive(Debug, Clone)]
struct Evaluation {
    point: GridPoint,
    betas: Option<Vec<f64>>,
}

/// Everything a candidate needs, computed once per run and shared read-only.
struct Problem {
    model: TrajectoryModel,
    terms: Vec<LinearTerm>,
    events: Vec<Event>,
    mode: RelaxationMode,
    epochs: Vec<f64>,
    /// Observations with fixed terms already subtracted.
    y_adj: Vec<f64>,
    /// `sqrt(w_i)`.
    sqrt_w: Vec<f64>,
}

/// Fit one component by grid search.
///
/// Events outside the span of `samples` are ignored. Singular candidates are
/// recorded with residual `+∞`; the run only fails when no candidate could be
/// solved. When `cancel` fires, remaining points are skipped and the best
/// completed point is returned with `partial = true`.
pub fn optimize(
    samples: &[Sample],
    events: &[Event],
    grid: &GridSpec,
    opts: &OptimizeOptions,
    cancel: &CancelToken,
    observer: &dyn GridObserver,
) -> Result<FitResult, FitError> {
    let n = samples.len();
    if grid.is_empty() {
        return Err(underdetermined(UnderdeterminedCause::EmptyGrid, 0, n));
    }
    let Some(span) = TimeSpan::of_samples(samples) else {
        return Err(underdetermined(UnderdeterminedCause::InsufficientData, grid.len(), 0));
    };

    let events = merge_coincident(events_in_span(events, &span), samples);
    let model = TrajectoryModel::new(span.start, opts.decay).with_seasonal(opts.seasonal);
    let terms = free_terms(&model, &events, samples, &opts.fixed);

    let dims = grid_dims(opts.relaxation, events.len());
    let tuples = candidate_tuples(grid, dims)?;
    let grid_size = tuples.len();

    if n < terms.len().max(1) {
        return Err(underdetermined(UnderdeterminedCause::InsufficientData, grid_size, n));
    }

    let problem = Problem::new(model, terms, events, opts, samples);
    log::debug!(
        "grid search: {n} samples, {} events, {} free linear terms, {grid_size} grid points",
        problem.events.len(),
        problem.terms.len()
    );

    observer.on_start(grid_size);
    let evaluate = |(index, tuple): (usize, &Vec<f64>)| -> Evaluation {
        if cancel.is_cancelled() {
            return Evaluation {
                point: GridPoint {
                    index,
                    t_relax: tuple.clone(),
                    residual: f64::INFINITY,
                    status: GridPointStatus::NotEvaluated,
                },
                betas: None,
            };
        }
        let evaluation = problem.evaluate(index, tuple);
        observer.on_point(&evaluation.point);
        evaluation
    };

    // `collect` keeps grid order regardless of which thread ran which point.
    let evaluations: Vec<Evaluation> = match opts.parallelism {
        Parallelism::Parallel => tuples.par_iter().enumerate().map(evaluate).collect(),
        Parallelism::Sequential => tuples.iter().enumerate().map(evaluate).collect(),
    };
    observer.on_finish();

    let partial = evaluations
        .iter()
        .any(|e| e.point.status == GridPointStatus::NotEvaluated);

    let Some((best, betas)) = select_best(&evaluations) else {
        if partial {
            return Err(FitError::Cancelled { grid_size });
        }
        return Err(underdetermined(UnderdeterminedCause::SingularDesign, grid_size, n));
    };

    let t_relax = per_event_constants(&best.t_relax, problem.mode, problem.events.len());
    let params = problem.assemble_params(betas, &opts.fixed, &t_relax);
    let n_params = problem.terms.len() + if problem.events.is_empty() { 0 } else { dims };
    let quality = quality(&problem, &params, samples, best.residual, n_params);
    let residual = best.residual;
    let selected = best.index;

    if partial {
        log::warn!(
            "grid search cancelled: best of {} evaluated points out of {grid_size}",
            evaluations
                .iter()
                .filter(|e| e.point.status != GridPointStatus::NotEvaluated)
                .count()
        );
    }
    log::info!(
        "selected T_relax={:?} days (residual={residual:.6e}, wrms={:.4} m)",
        best.t_relax,
        quality.wrms
    );

    Ok(FitResult {
        params,
        residual,
        grid: evaluations.into_iter().map(|e| e.point).collect(),
        selected,
        quality,
        t0: problem.model.t0,
        decay: opts.decay,
        weighting: opts.weighting,
        partial,
    })
}

impl Problem {
    fn new(
        model: TrajectoryModel,
        terms: Vec<LinearTerm>,
        events: Vec<Event>,
        opts: &OptimizeOptions,
        samples: &[Sample],
    ) -> Self {
        let intercept = opts.fixed.intercept.unwrap_or(0.0);
        let rate = opts.fixed.rate.unwrap_or(0.0);

        let epochs: Vec<f64> = samples.iter().map(|s| s.epoch()).collect();
        let y_adj = samples
            .iter()
            .map(|s| s.value() - intercept - rate * (s.epoch() - model.t0))
            .collect();
        // `Sample` guarantees sigma > 0.
        let sqrt_w = samples
            .iter()
            .map(|s| match opts.weighting {
                WeightMode::Sigma => 1.0 / s.sigma(),
                WeightMode::Uniform => 1.0,
            })
            .collect();

        Self {
            model,
            terms,
            events,
            mode: opts.relaxation,
            epochs,
            y_adj,
            sqrt_w,
        }
    }

    fn evaluate(&self, index: usize, tuple: &[f64]) -> Evaluation {
        let t_relax = per_event_constants(tuple, self.mode, self.events.len());
        match self.solve(&t_relax) {
            Ok((betas, sse)) => Evaluation {
                point: GridPoint {
                    index,
                    t_relax: tuple.to_vec(),
                    residual: sse,
                    status: GridPointStatus::Evaluated,
                },
                betas: Some(betas),
            },
            Err(err) => {
                log::debug!("grid point {index} {tuple:?} skipped: {err}");
                Evaluation {
                    point: GridPoint {
                        index,
                        t_relax: tuple.to_vec(),
                        residual: f64::INFINITY,
                        status: GridPointStatus::Singular,
                    },
                    betas: None,
                }
            }
        }
    }

    fn solve(&self, t_relax: &[f64]) -> Result<(Vec<f64>, f64), SolveError> {
        let n = self.epochs.len();
        let p = self.terms.len();

        // Build weighted design matrix X_w and weighted observation vector y_w.
        let mut xw = DMatrix::<f64>::zeros(n, p);
        let mut yw = DVector::<f64>::zeros(n);
        let mut row = vec![0.0; p];

        for i in 0..n {
            self.model
                .fill_design_row(&self.terms, self.epochs[i], &self.events, t_relax, &mut row);
            let sw = self.sqrt_w[i];
            for (j, &x) in row.iter().enumerate() {
                xw[(i, j)] = x * sw;
            }
            yw[i] = self.y_adj[i] * sw;
        }

        let beta = solve_least_squares(&xw, &yw)?;
        let sse = (&yw - &xw * &beta).norm_squared();
        if !sse.is_finite() {
            return Err(SolveError::NonFinite);
        }
        Ok((beta.iter().copied().collect(), sse))
    }

    fn assemble_params(&self, betas: &[f64], fixed: &FixedParams, t_relax: &[f64]) -> ParameterVector {
        let mut params =
            ParameterVector::secular(fixed.intercept.unwrap_or(0.0), fixed.rate.unwrap_or(0.0));
        params.events = self
            .events
            .iter()
            .zip(t_relax)
            .map(|(event, &t_relax)| EventTerms {
                event: event.clone(),
                offset: 0.0,
                amplitude: 0.0,
                t_relax,
            })
            .collect();
        let mut seasonal = self.model.seasonal.then(SeasonalTerms::default);

        for (&term, &b) in self.terms.iter().zip(betas) {
            match term {
                LinearTerm::Intercept => params.intercept = b,
                LinearTerm::Rate => params.rate = b,
                LinearTerm::Offset(i) => params.events[i].offset = b,
                LinearTerm::Amplitude(i) => params.events[i].amplitude = b,
                LinearTerm::AnnualSin => {
                    if let Some(s) = seasonal.as_mut() {
                        s.annual_sin = b;
                    }
                }
                LinearTerm::AnnualCos => {
                    if let Some(s) = seasonal.as_mut() {
                        s.annual_cos = b;
                    }
                }
                LinearTerm::SemiannualSin => {
                    if let Some(s) = seasonal.as_mut() {
                        s.semiannual_sin = b;
                    }
                }
                LinearTerm::SemiannualCos => {
                    if let Some(s) = seasonal.as_mut() {
                        s.semiannual_cos = b;
                    }
                }
            }
        }
        params.seasonal = seasonal;
        params
    }
}

/// Free linear terms, in column order.
///
/// An event with no sample before it steps every sample, so its offset is
/// indistinguishable from the intercept and is left to it.
fn free_terms(
    model: &TrajectoryModel,
    events: &[Event],
    samples: &[Sample],
    fixed: &FixedParams,
) -> Vec<LinearTerm> {
    model
        .terms(events.len())
        .into_iter()
        .filter(|term| match term {
            LinearTerm::Intercept => fixed.intercept.is_none(),
            LinearTerm::Rate => fixed.rate.is_none(),
            LinearTerm::Offset(i) => {
                fixed.intercept.is_some() || samples_before(samples, events[*i].epoch) > 0
            }
            _ => true,
        })
        .collect()
}

fn samples_before(samples: &[Sample], epoch: f64) -> usize {
    samples.iter().filter(|s| s.epoch() < epoch).count()
}

/// Collapse events that no sample separates into the first of them.
///
/// Such events have identical step columns, so the data cannot tell them
/// apart. `events` must be sorted by epoch.
fn merge_coincident(events: Vec<Event>, samples: &[Sample]) -> Vec<Event> {
    let mut out: Vec<(usize, Event)> = Vec::with_capacity(events.len());
    for event in events {
        let before = samples_before(samples, event.epoch);
        if let Some((prev_before, kept)) = out.last() {
            if *prev_before == before {
                log::info!(
                    "event {} merged into {}: no sample between them",
                    event.id,
                    kept.id
                );
                continue;
            }
        }
        out.push((before, event));
    }
    out.into_iter().map(|(_, event)| event).collect()
}

fn events_in_span(events: &[Event], span: &TimeSpan) -> Vec<Event> {
    let mut out: Vec<Event> = events
        .iter()
        .filter(|e| span.contains(e.epoch))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
    out
}

/// Deterministic selection: minimum residual, then the smaller relaxation
/// constants (lexicographically), then the earlier grid index.
fn select_best(evaluations: &[Evaluation]) -> Option<(&GridPoint, &[f64])> {
    let mut best: Option<(&GridPoint, &[f64])> = None;
    for e in evaluations {
        let (GridPointStatus::Evaluated, Some(betas)) = (e.point.status, e.betas.as_deref()) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((current, _)) => precedes(&e.point, current),
        };
        if better {
            best = Some((&e.point, betas));
        }
    }
    best
}

fn precedes(a: &GridPoint, b: &GridPoint) -> bool {
    a.residual
        .total_cmp(&b.residual)
        .then_with(|| cmp_tuples(&a.t_relax, &b.t_relax))
        .then_with(|| a.index.cmp(&b.index))
        == Ordering::Less
}

fn cmp_tuples(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.total_cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

fn quality(
    problem: &Problem,
    params: &ParameterVector,
    samples: &[Sample],
    sse: f64,
    n_params: usize,
) -> FitQuality {
    let n = samples.len();
    let mut sum_r2 = 0.0;
    let mut sum_wr2 = 0.0;
    let mut sum_w = 0.0;
    for (s, &sw) in samples.iter().zip(&problem.sqrt_w) {
        let r = s.value() - problem.model.evaluate(params, s.epoch());
        let w = sw * sw;
        sum_r2 += r * r;
        sum_wr2 += w * r * r;
        sum_w += w;
    }
    let rmse = (sum_r2 / n as f64).sqrt();
    let wrms = if sum_w > 0.0 { (sum_wr2 / sum_w).sqrt() } else { rmse };
    let chi2_reduced = (n > n_params).then(|| sse / (n - n_params) as f64);

    FitQuality {
        n,
        n_params,
        sse,
        rmse,
        wrms,
        chi2_reduced,
    }
}

fn underdetermined(cause: UnderdeterminedCause, grid_size: usize, samples: usize) -> FitError {
    FitError::Underdetermined {
        cause,
        grid_size,
        samples,
    }
}
