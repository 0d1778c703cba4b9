//! Run the fetch → normalize → resolve → persist pipeline.
//!
//! This crate owns orchestration: it drives the paged fetcher for every
//! entity kind, hands the records to the normalizer and resolver, and writes
//! the results through the persistence layer in dependency order.

pub mod pipeline;
pub mod progress;
pub mod relink;

pub use pipeline::{
    Endpoints, FetchedListings, IngestError, IngestOptions, KindSummary, RunSummary,
    fetch_all_kinds, run_ingest,
};
pub use progress::{IngestProgress, LogProgress, SilentProgress};
pub use relink::{LinkCounts, RelinkSummary, link_relationships, relink_from_store};
