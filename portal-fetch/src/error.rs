use std::time::Duration;

/// Errors that can occur while fetching a listing page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode listing from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Listing at {0} does not report a page count")]
    MissingPageCount(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures, timeouts, and non-200 statuses are transient.
    /// A body that does not decode will not decode on the next try either.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::Status { .. }
        )
    }
}
