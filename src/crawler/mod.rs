//! Crawler adapter: fetches a target URL and returns a structured snapshot.
//!
//! Each strategy implements the `Crawler` trait. The pipeline is agnostic to
//! which strategy produced the snapshot; the worker constructs one strategy
//! at startup and tests substitute `StaticCrawler` through the same trait.

pub mod http;

use async_trait::async_trait;

use crate::models::snapshot::CrawlSnapshot;

pub use http::HttpCrawler;

/// Crawl failure classes. Retryable at the job layer, never inside a
/// strategy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CrawlError {
    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("crawl timed out: {0}")]
    Timeout(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CrawlError {
    /// Classify a reqwest error. reqwest folds TLS handshake failures into
    /// connect errors, so those are told apart by the error text.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return CrawlError::Timeout(err.to_string());
        }
        if err.is_connect() {
            let text = err.to_string();
            let lowered = text.to_ascii_lowercase();
            if lowered.contains("certificate")
                || lowered.contains("tls")
                || lowered.contains("handshake")
            {
                return CrawlError::Tls(text);
            }
            return CrawlError::Unreachable(text);
        }
        CrawlError::InvalidResponse(err.to_string())
    }
}

/// Trait for interchangeable crawl strategies.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Fetch the target and capture a snapshot of the page state.
    async fn fetch(&self, url: &str) -> Result<CrawlSnapshot, CrawlError>;

    /// Short strategy name recorded in scan metadata.
    fn strategy(&self) -> &str;
}

/// Canned-snapshot strategy used by tests and local pipeline runs: returns
/// the same prepared result (or failure) for every URL.
#[derive(Debug, Clone)]
pub struct StaticCrawler {
    result: Result<CrawlSnapshot, CrawlError>,
}

impl StaticCrawler {
    pub fn new(snapshot: CrawlSnapshot) -> Self {
        Self {
            result: Ok(snapshot),
        }
    }

    pub fn failing(error: CrawlError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl Crawler for StaticCrawler {
    async fn fetch(&self, _url: &str) -> Result<CrawlSnapshot, CrawlError> {
        self.result.clone()
    }

    fn strategy(&self) -> &str {
        "static"
    }
}
