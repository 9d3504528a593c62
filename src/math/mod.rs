//! Mathematical utilities: relaxation functions and weighted least squares.

pub mod decay;
pub mod ols;

pub use decay::*;
pub use ols::*;
