//! Terminal progress bar for grid searches.

use std::io::IsTerminal;
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::domain::GridPoint;
use crate::fit::GridObserver;

const TEMPLATE: &str = "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Drives one `indicatif` bar per search stage (component).
///
/// Hidden when stderr is not a terminal.
#[derive(Default)]
pub struct BarObserver {
    label: Mutex<String>,
    bar: Mutex<Option<ProgressBar>>,
}

impl BarObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    let style = ProgressStyle::with_template(TEMPLATE)
        .map(|s| s.progress_chars("█▉▊▋▌▍▎▏  "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());

    pb
}

impl GridObserver for BarObserver {
    fn on_stage(&self, label: &str) {
        if let Ok(mut current) = self.label.lock() {
            *current = label.to_string();
        }
    }

    fn on_start(&self, total_points: usize) {
        let label = self.label.lock().map(|l| l.clone()).unwrap_or_default();
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(create_progress_bar(total_points as u64, &label));
        }
    }

    fn on_point(&self, _point: &GridPoint) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(pb) = bar.as_ref() {
                pb.inc(1);
            }
        }
    }

    fn on_finish(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.finish_and_clear();
            }
        }
    }
}
