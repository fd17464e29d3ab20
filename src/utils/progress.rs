//! Progress bar utilities using indicatif
//!
//! Provides a wrapper around indicatif's `ProgressBar` for consistent
//! progress reporting on stderr. Clones share the same bar, so scan tasks
//! can advance it from anywhere.

use indicatif::{ProgressBar as IndicatifBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})";

/// Progress bar wrapper for displaying scan status
#[derive(Clone)]
pub struct ProgressBar {
    bar: IndicatifBar,
}

impl ProgressBar {
    /// Create a bar whose length is set once the work is known
    pub fn new(label: &str) -> Self {
        let bar = IndicatifBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("█░"));
        }
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        Self { bar }
    }

    /// A bar that draws nothing, for non-interactive runs
    pub fn hidden() -> Self {
        Self {
            bar: IndicatifBar::hidden(),
        }
    }

    pub fn set_length(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Increment progress by 1
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn position(&self) -> usize {
        self.bar.position() as usize
    }

    /// Finish with custom message
    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
