//! Grid-search fitting.
//!
//! Responsibilities:
//!
//! - generate relaxation-constant grids and candidate tuples
//! - evaluate each candidate (parallel) with a closed-form linear solve
//! - select the minimum-residual candidate deterministically
//! - fit every requested component of a station

pub mod cancel;
pub mod grid;
pub mod optimizer;
pub mod progress;
pub mod station;

pub use cancel::*;
pub use grid::*;
pub use optimizer::*;
pub use progress::*;
pub use station::*;
