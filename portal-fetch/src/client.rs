use tokio::time::Duration;

use crate::error::FetchError;
use crate::types::ListingResponse;

/// Default per-request timeout. Exceeding it is a retryable failure.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport for listing requests.
///
/// `page` is `None` for the unparameterized base URL (used to read the page
/// count) and `Some(n)` for `{url}?page={n}`.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_listing(
        &self,
        url: &str,
        page: Option<u32>,
    ) -> Result<ListingResponse, FetchError>;
}

/// HTTP transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("portal-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(err)
        }
    }
}

impl PageSource for HttpSource {
    async fn fetch_listing(
        &self,
        url: &str,
        page: Option<u32>,
    ) -> Result<ListingResponse, FetchError> {
        let mut request = self.http.get(url);
        if let Some(n) = page {
            request = request.query(&[("page", n)]);
        }

        let resp = request.send().await.map_err(|e| self.classify(e))?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }

        let text = resp.text().await.map_err(|e| self.classify(e))?;
        serde_json::from_str(&text).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: format!(
                "{e}. Response: {}",
                text.chars().take(200).collect::<String>()
            ),
        })
    }
}
