//! Ingest progress reporting.

use portal_core::EntityKind;

/// Trait for receiving ingest progress updates.
pub trait IngestProgress {
    /// Called when a phase starts (e.g., "Persisting locations").
    fn on_phase(&self, message: &str);

    /// Called once per entity kind after its listing has been fetched.
    fn on_kind_fetched(&self, kind: EntityKind, records: usize, failed_pages: usize);

    /// Called when the run is complete.
    fn on_complete(&self, message: &str);
}

/// A no-op progress reporter that discards all updates.
pub struct SilentProgress;

impl IngestProgress for SilentProgress {
    fn on_phase(&self, _message: &str) {}
    fn on_kind_fetched(&self, _kind: EntityKind, _records: usize, _failed_pages: usize) {}
    fn on_complete(&self, _message: &str) {}
}

/// A progress reporter that logs to the `log` crate.
pub struct LogProgress;

impl IngestProgress for LogProgress {
    fn on_phase(&self, message: &str) {
        log::info!("{}", message);
    }

    fn on_kind_fetched(&self, kind: EntityKind, records: usize, failed_pages: usize) {
        if failed_pages == 0 {
            log::info!("  {}: {} records", kind, records);
        } else {
            log::warn!(
                "  {}: {} records ({} pages failed)",
                kind,
                records,
                failed_pages
            );
        }
    }

    fn on_complete(&self, message: &str) {
        log::info!("{}", message);
    }
}
