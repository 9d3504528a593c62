//! Post-seismic relaxation functions.
//!
//! With `x = Δt / T` (both in days):
//!
//! - logarithmic: `f(Δt, T) = ln(1 + x)`
//! - exponential: `f(Δt, T) = 1 - exp(-x)`
//!
//! Numerical notes:
//! - For small `x`, `ln(1 + x)` and `1 - exp(-x)` lose precision to cancellation,
//!   so we use `ln_1p` / `exp_m1`.
//! - Both forms are exactly `0` at the event (`Δt = 0`) and before it (`Δt < 0`);
//!   the step itself is carried by the separate offset term.

use crate::domain::DecayKind;

/// Compute `ln(1 + Δt/T)`, zero for `Δt <= 0`.
pub fn log_decay(dt_days: f64, t_relax: f64) -> f64 {
    if dt_days <= 0.0 {
        return 0.0;
    }
    (dt_days / t_relax).ln_1p()
}

/// Compute `1 - exp(-Δt/T)`, zero for `Δt <= 0`.
pub fn exp_decay(dt_days: f64, t_relax: f64) -> f64 {
    if dt_days <= 0.0 {
        return 0.0;
    }
    -(-dt_days / t_relax).exp_m1()
}

/// Evaluate the relaxation function of the given kind.
pub fn relaxation(kind: DecayKind, dt_days: f64, t_relax: f64) -> f64 {
    match kind {
        DecayKind::Logarithmic => log_decay(dt_days, t_relax),
        DecayKind::Exponential => exp_decay(dt_days, t_relax),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_at_event_for_both_forms() {
        for &tau in &[1e-3, 10.0, 50.0, 400.0, 1e6] {
            assert_eq!(log_decay(0.0, tau), 0.0);
            assert_eq!(exp_decay(0.0, tau), 0.0);
        }
    }

    #[test]
    fn causal_before_event() {
        assert_eq!(relaxation(DecayKind::Logarithmic, -3.0, 50.0), 0.0);
        assert_eq!(relaxation(DecayKind::Exponential, -3.0, 50.0), 0.0);
    }

    #[test]
    fn monotone_and_bounded_shapes() {
        let tau = 50.0;
        let mut prev_log = 0.0;
        let mut prev_exp = 0.0;
        for i in 1..200 {
            let dt = i as f64 * 5.0;
            let l = log_decay(dt, tau);
            let e = exp_decay(dt, tau);
            assert!(l > prev_log);
            assert!(e > prev_exp);
            assert!(e < 1.0 + 1e-15);
            prev_log = l;
            prev_exp = e;
        }
        assert!((log_decay(tau, tau) - 2f64.ln()).abs() < 1e-15);
        assert!((exp_decay(tau, tau) - (1.0 - (-1f64).exp())).abs() < 1e-15);
    }

    #[test]
    fn small_ratio_keeps_precision() {
        let x = 1e-12;
        assert!((log_decay(x, 1.0) - x).abs() < 1e-24);
        assert!((exp_decay(x, 1.0) - x).abs() < 1e-24);
    }
}
