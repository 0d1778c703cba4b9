//! Terminal progress display for an ingest run.
//!
//! One bar that steps through the run's phases, with per-kind fetch results
//! printed above it as they arrive.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use portal_core::EntityKind;
use portal_import::IngestProgress;

/// Phases reported by a run: fetch, five persist steps.
const PHASES: u64 = 6;

pub struct PhaseBar {
    bar: ProgressBar,
}

impl PhaseBar {
    /// Draws to stderr; indicatif hides the bar when stderr is not a terminal.
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(PHASES), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("  {spinner:.cyan} [{pos}/{len}] {msg}")
            .expect("static pattern")
            .tick_chars("/-\\|");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}

impl IngestProgress for PhaseBar {
    fn on_phase(&self, message: &str) {
        if self.bar.position() > 0 || !self.bar.message().is_empty() {
            self.bar.inc(1);
        }
        self.bar.set_message(message.to_string());
        log::debug!("{}", message);
    }

    fn on_kind_fetched(&self, kind: EntityKind, records: usize, failed_pages: usize) {
        let line = if failed_pages == 0 {
            format!("  {kind}: {records} records")
        } else {
            format!("  {kind}: {records} records ({failed_pages} pages failed)")
        };
        self.bar.println(line);
    }

    fn on_complete(&self, message: &str) {
        self.bar.set_position(PHASES);
        self.bar.set_message(message.to_string());
        log::info!("{}", message);
    }
}
