//! Paginated listing fetcher.
//!
//! Pulls every page of a listing endpoint with bounded concurrency and a
//! uniform retry policy. Failures degrade to empty pages rather than errors;
//! the returned [`FetchReport`] says which pages were lost.

pub mod cancel;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod types;

pub use cancel::CancelFlag;
pub use client::{DEFAULT_REQUEST_TIMEOUT, HttpSource, PageSource};
pub use error::FetchError;
pub use fetcher::{
    DEFAULT_MAX_CONCURRENT_REQUESTS, FetchOptions, FetchReport, PageOutcome, PagedFetcher,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use types::{ListingInfo, ListingResponse};
