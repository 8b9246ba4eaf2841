//! Captured page state handed to every analyzer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One observed outbound request (the document itself plus subresources).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub url: String,
    pub method: String,
    pub resource_type: String,
    pub status: Option<u16>,
}

/// Cookie as set by the target, with the attributes analyzers care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

/// Read-only snapshot of one crawl attempt. Produced once per attempt and
/// consumed by every analyzer; never shared across workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    pub url: String,
    pub final_url: String,
    pub markup: String,
    pub scripts: Vec<String>,
    pub cookies: Vec<CookieRecord>,
    pub network_requests: Vec<NetworkRequest>,
    /// Response headers with lowercased names.
    pub response_headers: HashMap<String, String>,
    pub load_time_ms: u64,
}

impl CrawlSnapshot {
    /// Case-insensitive header lookup; names are stored lowercased.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Every URL an analyzer should treat as "loaded by the page": script
    /// sources plus observed network requests.
    pub fn resource_urls(&self) -> impl Iterator<Item = &str> {
        self.scripts
            .iter()
            .map(String::as_str)
            .chain(self.network_requests.iter().map(|r| r.url.as_str()))
    }
}
