//! Weighted least squares solver.
//!
//! For every relaxation candidate we solve a small linear regression:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! The caller scales rows by `sqrt(w_i)`, so this module only sees an ordinary
//! least squares problem.
//!
//! Implementation choices:
//! - SVD handles the tall (rows > columns) system directly.
//! - Columns are equilibrated to unit norm before the SVD. The design mixes
//!   years, log-decay values and seasonal sinusoids, and without scaling the
//!   rank test would mostly measure units.
//! - A rank-deficient system is an error, not a minimum-norm solution: the
//!   optimizer must know the candidate is singular and skip it.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Relative singular-value threshold below which a column counts as dependent.
const RANK_RTOL: f64 = 1e-10;

/// Why a least squares system could not be solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolveError {
    /// Fewer rows than unknowns.
    #[error("{rows} rows for {cols} unknowns")]
    TooFewRows { rows: usize, cols: usize },
    /// A column is identically zero (e.g. an event after every sample).
    #[error("column {0} is zero")]
    ZeroColumn(usize),
    /// Columns are linearly dependent.
    #[error("rank {rank} < {cols}")]
    RankDeficient { rank: usize, cols: usize },
    /// The solve produced NaN/inf.
    #[error("non-finite solution")]
    NonFinite,
}

/// Solve a least squares problem using SVD.
///
/// A system without columns has the empty solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, SolveError> {
    let (rows, cols) = x.shape();
    if cols == 0 {
        return Ok(DVector::zeros(0));
    }
    if rows < cols {
        return Err(SolveError::TooFewRows { rows, cols });
    }

    let mut scaled = x.clone();
    let mut norms = Vec::with_capacity(cols);
    for j in 0..cols {
        let norm = scaled.column(j).norm();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(SolveError::ZeroColumn(j));
        }
        scaled.column_mut(j).scale_mut(1.0 / norm);
        norms.push(norm);
    }

    let svd = scaled.svd(true, true);
    let max_sv = svd.singular_values.max();
    let tol = max_sv * RANK_RTOL;
    let rank = svd.singular_values.iter().filter(|&&s| s > tol).count();
    if rank < cols {
        return Err(SolveError::RankDeficient { rank, cols });
    }

    let mut beta = svd.solve(y, tol).map_err(|_| SolveError::NonFinite)?;
    for (j, norm) in norms.iter().enumerate() {
        beta[j] /= norm;
    }
    if beta.iter().all(|v| v.is_finite()) {
        Ok(beta)
    } else {
        Err(SolveError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn badly_scaled_columns_still_solve() {
        // y = 0.5 + 2e-6 * x with x in the millions.
        let xs = [1.0e6, 2.0e6, 3.5e6, 4.0e6];
        let mut data = Vec::new();
        let mut ys = Vec::new();
        for &x in &xs {
            data.push(1.0);
            data.push(x);
            ys.push(0.5 + 2e-6 * x);
        }
        let x = DMatrix::from_row_slice(4, 2, &data);
        let y = DVector::from_row_slice(&ys);
        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 0.5).abs() < 1e-9);
        assert!((beta[1] - 2e-6).abs() < 1e-15);
    }

    #[test]
    fn dependent_columns_are_rejected() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            solve_least_squares(&x, &y),
            Err(SolveError::RankDeficient { rank: 1, cols: 2 })
        ));
    }

    #[test]
    fn zero_column_and_short_systems_are_rejected() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(solve_least_squares(&x, &y), Err(SolveError::ZeroColumn(1)));

        let x = DMatrix::from_row_slice(1, 2, &[1.0, 0.5]);
        let y = DVector::from_row_slice(&[1.0]);
        assert_eq!(
            solve_least_squares(&x, &y),
            Err(SolveError::TooFewRows { rows: 1, cols: 2 })
        );
    }

    #[test]
    fn solve_errors_describe_themselves() {
        let err: Box<dyn std::error::Error> = Box::new(SolveError::RankDeficient { rank: 3, cols: 4 });
        assert_eq!(err.to_string(), "rank 3 < 4");
        assert_eq!(SolveError::ZeroColumn(2).to_string(), "column 2 is zero");
        assert_eq!(
            SolveError::TooFewRows { rows: 1, cols: 2 }.to_string(),
            "1 rows for 2 unknowns"
        );
    }
}
