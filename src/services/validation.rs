//! Target normalization and domain validation.
//!
//! A rejected domain never reaches the queue: every check here runs
//! synchronously at submission time, DNS included.

use std::io;
use std::time::Duration;

use tokio::net;
use tracing::debug;
use url::Url;

use crate::errors::AppError;

const DNS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Canonical form of a submitted target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTarget {
    /// Full URL handed to the crawler.
    pub url: String,
    /// Lowercased hostname, the duplicate-suppression key.
    pub domain: String,
}

/// Normalize a raw submission: prepend `https://` when no scheme is given,
/// drop a trailing slash, extract the lowercased hostname.
pub fn normalize_url(raw: &str) -> Result<NormalizedTarget, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(
            "EMPTY_DOMAIN",
            "Please enter a URL to scan",
        ));
    }

    let lowered = trimmed.to_ascii_lowercase();
    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let normalized = with_scheme
        .strip_suffix('/')
        .unwrap_or(&with_scheme)
        .to_string();

    let parsed = Url::parse(&normalized)
        .map_err(|_| AppError::validation("INVALID_CHARS", "Invalid URL format"))?;
    let domain = parsed
        .host_str()
        .ok_or_else(|| AppError::validation("EMPTY_DOMAIN", "URL has no host"))?
        .to_ascii_lowercase();

    Ok(NormalizedTarget {
        url: normalized,
        domain,
    })
}

/// Strip scheme, port, and path so a full URL pasted as a domain still
/// validates.
fn clean_domain(input: &str) -> String {
    let lowered = input.trim().to_ascii_lowercase();
    let stripped = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let mut host = stripped.split('/').next().unwrap_or("");
    if let Some((name, port)) = host.rsplit_once(':') {
        if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            host = name;
        }
    }
    host.to_string()
}

/// localhost and RFC1918 targets are scannable without DNS.
fn is_private_target(domain: &str) -> bool {
    if domain == "localhost" || domain.starts_with("127.") {
        return true;
    }
    if domain.starts_with("192.168.") || domain.starts_with("10.") {
        return true;
    }
    // 172.16.0.0/12
    if let Some(rest) = domain.strip_prefix("172.") {
        if let Some((octet, _)) = rest.split_once('.') {
            return matches!(octet.parse::<u8>(), Ok(16..=31));
        }
    }
    false
}

fn valid_domain_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'
}

/// Validate that a domain is well-formed and resolvable.
///
/// Shape checks run first and cost nothing; the DNS lookup is bounded by a
/// 5 second timeout. Errors carry a machine-readable code: EMPTY_DOMAIN,
/// INVALID_CHARS, DOMAIN_NOT_FOUND, NO_DNS_RECORDS, DNS_TIMEOUT, or
/// DNS_SERVER_ERROR.
pub async fn validate_domain(domain: &str) -> Result<(), AppError> {
    let domain = clean_domain(domain);

    if domain.is_empty() {
        return Err(AppError::validation("EMPTY_DOMAIN", "Empty domain name"));
    }
    if !domain.chars().all(valid_domain_char) {
        return Err(AppError::validation(
            "INVALID_CHARS",
            "Domain contains invalid characters",
        ));
    }
    if is_private_target(&domain) {
        debug!(domain, "Private target, skipping DNS validation");
        return Ok(());
    }
    if !domain.contains('.') {
        return Err(AppError::validation(
            "DOMAIN_NOT_FOUND",
            "Domain does not exist (DNS lookup failed)",
        ));
    }

    let lookup =
        tokio::time::timeout(DNS_LOOKUP_TIMEOUT, net::lookup_host((domain.as_str(), 443))).await;
    match lookup {
        Err(_) => Err(AppError::validation(
            "DNS_TIMEOUT",
            "DNS lookup timeout, domain may be unreachable",
        )),
        Ok(Err(e)) => Err(classify_dns_error(&e)),
        Ok(Ok(mut addresses)) => {
            if addresses.next().is_none() {
                return Err(AppError::validation(
                    "NO_DNS_RECORDS",
                    "Domain has no DNS records",
                ));
            }
            debug!(domain, "Domain validated");
            Ok(())
        }
    }
}

/// Resolver errors do not map cleanly onto `io::ErrorKind`, so the NXDOMAIN
/// case is recognized from the getaddrinfo message text.
fn classify_dns_error(e: &io::Error) -> AppError {
    let text = e.to_string().to_ascii_lowercase();
    let not_found = e.kind() == io::ErrorKind::NotFound
        || text.contains("not known")
        || text.contains("no such host")
        || text.contains("nodename nor servname");
    if not_found {
        AppError::validation(
            "DOMAIN_NOT_FOUND",
            "Domain does not exist (DNS lookup failed)",
        )
    } else {
        AppError::validation("DNS_SERVER_ERROR", format!("DNS lookup failed: {e}"))
    }
}
