//! Trajectory model implementation.
//!
//! The model is implemented as small, pure functions so that the grid search can
//! stay generic over which terms are free and which are fixed.

pub mod model;

pub use model::*;
