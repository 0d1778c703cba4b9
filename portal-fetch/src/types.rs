use portal_core::RawRecord;
use serde::Deserialize;

/// Body of a listing endpoint response.
///
/// ```json
/// { "info": { "count": 826, "pages": 42, "next": "…", "prev": null },
///   "results": [ { "id": 1, … } ] }
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListingResponse {
    #[serde(default)]
    pub info: Option<ListingInfo>,
    #[serde(default)]
    pub results: Vec<RawRecord>,
}

/// Pagination metadata reported alongside the results.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListingInfo {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
}
