use futures::stream::{self, StreamExt};
use portal_core::{Page, RawRecord};

use crate::cancel::CancelFlag;
use crate::client::PageSource;
use crate::error::FetchError;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Cap on in-flight page requests per listing.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Fetcher tuning.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_concurrent_requests: usize,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Terminal state of one page fetch.
#[derive(Debug)]
pub enum PageOutcome {
    Done(Page),
    /// All attempts failed; the page contributes no records.
    Failed { number: u32, error: FetchError },
}

impl PageOutcome {
    pub fn number(&self) -> u32 {
        match self {
            Self::Done(page) => page.number,
            Self::Failed { number, .. } => *number,
        }
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Done(page) => page.records,
            Self::Failed { .. } => Vec::new(),
        }
    }
}

/// Everything retrieved from one listing, in page order.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub url: String,
    /// Page count reported by the listing; 0 if it could not be read.
    pub total_pages: u32,
    /// Page numbers that failed every attempt.
    pub failed_pages: Vec<u32>,
    pub records: Vec<RawRecord>,
}

impl FetchReport {
    fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }
}

/// Paged listing fetcher with bounded concurrency and retries.
pub struct PagedFetcher<S, Z = TokioSleeper> {
    source: S,
    sleeper: Z,
    options: FetchOptions,
    cancel: CancelFlag,
}

impl<S: PageSource> PagedFetcher<S> {
    pub fn new(source: S, options: FetchOptions) -> Self {
        Self {
            source,
            sleeper: TokioSleeper,
            options,
            cancel: CancelFlag::new(),
        }
    }
}

impl<S: PageSource, Z: Sleeper> PagedFetcher<S, Z> {
    /// Replace the sleeper used between retries.
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> PagedFetcher<S, Z2> {
        PagedFetcher {
            source: self.source,
            sleeper,
            options: self.options,
            cancel: self.cancel,
        }
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Read the listing's page count from the unparameterized base URL.
    ///
    /// Returns 0 ("no data") if every attempt fails or the response has no
    /// page count. The failure is logged, not returned.
    pub async fn get_total_pages(&self, url: &str) -> u32 {
        let result = self
            .options
            .retry
            .run(&self.sleeper, &self.cancel, url, move |_| async move {
                let listing = self.source.fetch_listing(url, None).await?;
                listing
                    .info
                    .and_then(|info| info.pages)
                    .ok_or_else(|| FetchError::MissingPageCount(url.to_string()))
            })
            .await;

        match result {
            Ok(pages) => pages,
            Err(e) => {
                log::error!("Could not read page count for {}: {}", url, e);
                0
            }
        }
    }

    /// Fetch one page, reporting whether it succeeded.
    pub async fn fetch_page_outcome(&self, url: &str, number: u32) -> PageOutcome {
        let label = format!("{url}?page={number}");
        let result = self
            .options
            .retry
            .run(&self.sleeper, &self.cancel, &label, move |_| async move {
                self.source.fetch_listing(url, Some(number)).await
            })
            .await;

        match result {
            Ok(listing) => PageOutcome::Done(Page {
                number,
                records: listing.results,
            }),
            Err(error) => {
                log::error!("Giving up on {}: {}", label, error);
                PageOutcome::Failed { number, error }
            }
        }
    }

    /// Fetch one (1-based) page. Empty if every attempt failed.
    pub async fn fetch_page(&self, url: &str, number: u32) -> Vec<RawRecord> {
        self.fetch_page_outcome(url, number).await.into_records()
    }

    /// Fetch every page of a listing.
    ///
    /// Pages are requested concurrently (at most `max_concurrent_requests` at
    /// a time) and reassembled in page order. A page that fails contributes
    /// no records and is listed in [`FetchReport::failed_pages`].
    pub async fn fetch_all(&self, url: &str) -> FetchReport {
        let total_pages = self.get_total_pages(url).await;
        if total_pages == 0 {
            return FetchReport::empty(url);
        }

        log::debug!("Fetching {} pages from {}", total_pages, url);

        let outcomes: Vec<PageOutcome> = stream::iter(1..=total_pages)
            .map(move |number| self.fetch_page_outcome(url, number))
            .buffered(self.options.max_concurrent_requests.max(1))
            .collect()
            .await;

        let mut report = FetchReport {
            url: url.to_string(),
            total_pages,
            ..FetchReport::default()
        };
        for outcome in outcomes {
            if let PageOutcome::Failed { number, .. } = &outcome {
                report.failed_pages.push(*number);
            }
            report.records.extend(outcome.into_records());
        }

        if !report.is_complete() {
            log::warn!(
                "{}: {} of {} pages failed, {} records retrieved",
                url,
                report.failed_pages.len(),
                total_pages,
                report.records.len()
            );
        }
        report
    }
}
