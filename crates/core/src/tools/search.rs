//! # Search - Web Search Client
//!
//! Query in, ranked `(title, snippet, link)` records out.
//! Backed by the Google Custom Search JSON API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Hard cap on results per query
pub const MAX_RESULTS_PER_QUERY: u8 = 5;

/// Default Custom Search endpoint
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Per-request timeout; a timed-out search is a failed query
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Search engine id used when none is configured
pub const DEFAULT_SEARCH_CX: &str = "017576662512468239146:omuauf_lfve";

/// A single ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Results for one issued query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResultSet {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(reqwest::Error),
    #[error("search returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("search unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the API key
        SearchError::Transport(e.without_url())
    }
}

/// Query-in, results-out contract for a web search provider
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query, returning at most `count` hits (never more than 5)
    async fn search(&self, query: &str, count: u8) -> Result<Vec<SearchHit>, SearchError>;
}

#[derive(Deserialize, Default)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl From<CustomSearchItem> for SearchHit {
    fn from(item: CustomSearchItem) -> Self {
        Self {
            title: item.title,
            snippet: item.snippet,
            link: item.link,
        }
    }
}

/// Google Custom Search client
#[derive(Clone)]
pub struct GoogleSearchClient {
    api_key: String,
    cx: String,
    base_url: String,
    http: reqwest::Client,
}

impl GoogleSearchClient {
    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()?;
        Ok(Self::with_http_client(api_key, cx, http))
    }

    /// Share an existing connection pool; the timeout is applied per request
    pub fn with_http_client(
        api_key: impl Into<String>,
        cx: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            cx: cx.into(),
            base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request_url(&self, query: &str, count: u8) -> String {
        format!(
            "{}?key={}&cx={}&q={}&num={}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.cx),
            urlencoding::encode(query),
            clamp_count(count)
        )
    }
}

impl std::fmt::Debug for GoogleSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSearchClient")
            .field("cx", &self.cx)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Clamp a requested result count into `1..=5`
pub fn clamp_count(count: u8) -> u8 {
    count.clamp(1, MAX_RESULTS_PER_QUERY)
}

#[async_trait]
impl SearchProvider for GoogleSearchClient {
    async fn search(&self, query: &str, count: u8) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .http
            .get(self.request_url(query, count))
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: CustomSearchResponse = response.json().await?;
        Ok(data
            .items
            .into_iter()
            .take(clamp_count(count) as usize)
            .map(SearchHit::from)
            .collect())
    }
}
