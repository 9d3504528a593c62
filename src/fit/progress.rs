//! Progress callbacks for grid searches.

use crate::domain::GridPoint;

/// Observer for reporting incremental progress of a grid search.
///
/// Grid points may be evaluated on several threads at once, so callbacks take
/// `&self` and implementations must be `Sync`.
pub trait GridObserver: Sync {
    /// A new search (e.g. the next component) is about to start.
    fn on_stage(&self, label: &str) {
        let _ = label;
    }
    fn on_start(&self, total_points: usize) {
        let _ = total_points;
    }
    /// Called once per point that was actually evaluated (including singular ones).
    fn on_point(&self, point: &GridPoint) {
        let _ = point;
    }
    fn on_finish(&self) {}
}

#[derive(Default)]
pub struct NoopObserver;

impl GridObserver for NoopObserver {}
