//! Fast non-JS crawl strategy backed by reqwest.
//!
//! Fetches the document, captures response headers and Set-Cookie
//! attributes, and discovers subresource URLs from the markup with regex.
//! It does not execute page script; a rendering strategy would observe
//! strictly more network traffic through the same trait.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use reqwest::redirect::Policy;
use url::Url;

use super::{CrawlError, Crawler};
use crate::models::snapshot::{CookieRecord, CrawlSnapshot, NetworkRequest};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; TrustScan/0.1)";
const MAX_REDIRECTS: usize = 10;

pub struct HttpCrawler {
    client: reqwest::Client,
    script_src: Regex,
    link_href: Regex,
}

impl HttpCrawler {
    pub fn new(timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let script_src = Regex::new(r#"(?i)<script[^>]*\ssrc\s*=\s*["']([^"']+)["']"#)?;
        let link_href = Regex::new(r#"(?i)<link[^>]*\shref\s*=\s*["']([^"']+)["']"#)?;

        Ok(Self {
            client,
            script_src,
            link_href,
        })
    }

    /// Resolve a possibly-relative resource URL against the document URL.
    fn resolve(base: &Url, raw: &str) -> Option<String> {
        if raw.starts_with("data:") || raw.starts_with("javascript:") {
            return None;
        }
        base.join(raw).ok().map(|u| u.to_string())
    }
}

#[async_trait]
impl Crawler for HttpCrawler {
    async fn fetch(&self, url: &str) -> Result<CrawlSnapshot, CrawlError> {
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(CrawlError::from_reqwest)?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let mut response_headers = std::collections::HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                // Repeated headers keep the first occurrence; Set-Cookie is
                // captured separately below.
                response_headers
                    .entry(name.as_str().to_string())
                    .or_insert_with(|| text.to_string());
            }
        }

        let cookies: Vec<CookieRecord> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();

        let markup = response.text().await.map_err(CrawlError::from_reqwest)?;

        let mut scripts = Vec::new();
        let mut network_requests = vec![NetworkRequest {
            url: final_url.to_string(),
            method: "GET".to_string(),
            resource_type: "document".to_string(),
            status: Some(status),
        }];

        for cap in self.script_src.captures_iter(&markup) {
            if let Some(resolved) = Self::resolve(&final_url, &cap[1]) {
                scripts.push(resolved.clone());
                network_requests.push(NetworkRequest {
                    url: resolved,
                    method: "GET".to_string(),
                    resource_type: "script".to_string(),
                    status: None,
                });
            }
        }

        for cap in self.link_href.captures_iter(&markup) {
            if let Some(resolved) = Self::resolve(&final_url, &cap[1]) {
                network_requests.push(NetworkRequest {
                    url: resolved,
                    method: "GET".to_string(),
                    resource_type: "link".to_string(),
                    status: None,
                });
            }
        }

        Ok(CrawlSnapshot {
            url: url.to_string(),
            final_url: final_url.to_string(),
            markup,
            scripts,
            cookies,
            network_requests,
            response_headers,
            load_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn strategy(&self) -> &str {
        "http"
    }
}

/// Parse one Set-Cookie header value into the attributes analyzers check.
fn parse_set_cookie(raw: &str) -> Option<CookieRecord> {
    let mut parts = raw.split(';');
    let pair = parts.next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut secure = false;
    let mut http_only = false;
    let mut same_site = None;
    for attr in parts {
        let attr = attr.trim();
        if attr.eq_ignore_ascii_case("secure") {
            secure = true;
        } else if attr.eq_ignore_ascii_case("httponly") {
            http_only = true;
        } else if let Some((k, v)) = attr.split_once('=') {
            if k.trim().eq_ignore_ascii_case("samesite") {
                same_site = Some(v.trim().to_string());
            }
        }
    }

    Some(CookieRecord {
        name: name.trim().to_string(),
        value: value.trim().to_string(),
        secure,
        http_only,
        same_site,
    })
}
