//! Checks the response for required security headers and weak
//! configurations of the ones that are present.

use anyhow::Error;

use super::{Analyzer, AnalyzerOutput};
use crate::models::finding::{Finding, FindingKind, Severity};
use crate::models::snapshot::CrawlSnapshot;

struct HeaderCheck {
    name: &'static str,
    severity: Severity,
    description: &'static str,
    recommendation: &'static str,
    impact: &'static str,
}

const REQUIRED_HEADERS: &[HeaderCheck] = &[
    HeaderCheck {
        name: "content-security-policy",
        severity: Severity::High,
        description: "Content Security Policy (CSP) is missing",
        recommendation: "Implement CSP to restrict resource loading. Critical for pages that \
                         render user-generated or model-generated content.",
        impact: "Injected script runs unrestricted, exposing sessions and page data to XSS.",
    },
    HeaderCheck {
        name: "strict-transport-security",
        severity: Severity::High,
        description: "HTTP Strict Transport Security (HSTS) is missing",
        recommendation: "Enable HSTS to enforce HTTPS on every connection.",
        impact: "Connections can be downgraded to plaintext by an on-path attacker.",
    },
    HeaderCheck {
        name: "x-frame-options",
        severity: Severity::Medium,
        description: "X-Frame-Options header is missing",
        recommendation: "Add X-Frame-Options (or a frame-ancestors CSP directive) to prevent \
                         clickjacking.",
        impact: "The page can be framed by a hostile site and overlaid with fake UI.",
    },
    HeaderCheck {
        name: "x-content-type-options",
        severity: Severity::Medium,
        description: "X-Content-Type-Options header is missing",
        recommendation: "Add \"nosniff\" to prevent MIME type sniffing.",
        impact: "Browsers may interpret uploaded content as executable script.",
    },
    HeaderCheck {
        name: "referrer-policy",
        severity: Severity::Low,
        description: "Referrer-Policy header is missing",
        recommendation: "Set Referrer-Policy to control URL information leakage.",
        impact: "Full URLs, possibly with tokens, leak to third-party destinations.",
    },
    HeaderCheck {
        name: "permissions-policy",
        severity: Severity::Low,
        description: "Permissions-Policy header is missing",
        recommendation: "Configure Permissions-Policy to disable browser features the site \
                         does not use.",
        impact: "Embedded content can request powerful browser features unchecked.",
    },
];

/// One year, the HSTS max-age floor.
const HSTS_MIN_MAX_AGE: u64 = 31_536_000;

pub struct SecurityHeadersAnalyzer;

impl SecurityHeadersAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SecurityHeadersAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for SecurityHeadersAnalyzer {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    fn analyze(&self, snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, Error> {
        let mut output = AnalyzerOutput::default();

        for check in REQUIRED_HEADERS {
            match snapshot.header(check.name) {
                None => output.findings.push(Finding {
                    kind: FindingKind::MissingSecurityHeader,
                    severity: check.severity,
                    title: format!("Missing {}", check.name),
                    description: check.description.to_string(),
                    evidence: vec![format!("response has no {} header", check.name)],
                    recommendation: check.recommendation.to_string(),
                    impact: check.impact.to_string(),
                }),
                Some(value) => {
                    if let Some(weak) = weak_configuration(check.name, value) {
                        output.findings.push(weak);
                    }
                }
            }
        }

        Ok(output)
    }
}

/// Weak-value checks for headers that are present.
fn weak_configuration(name: &str, value: &str) -> Option<Finding> {
    let lowered = value.to_ascii_lowercase();

    if name == "content-security-policy"
        && (lowered.contains("unsafe-inline") || lowered.contains("unsafe-eval"))
    {
        return Some(Finding {
            kind: FindingKind::WeakSecurityHeader,
            severity: Severity::Medium,
            title: "CSP contains unsafe directives".to_string(),
            description: "The Content-Security-Policy allows unsafe-inline or unsafe-eval"
                .to_string(),
            evidence: vec![format!("content-security-policy: {value}")],
            recommendation: "Remove unsafe directives and use nonces or hashes instead."
                .to_string(),
            impact: "Inline script injection bypasses the policy entirely.".to_string(),
        });
    }

    if name == "strict-transport-security" {
        let max_age = lowered
            .split(';')
            .filter_map(|part| part.trim().strip_prefix("max-age="))
            .find_map(|age| age.parse::<u64>().ok());
        if let Some(age) = max_age {
            if age < HSTS_MIN_MAX_AGE {
                return Some(Finding {
                    kind: FindingKind::WeakSecurityHeader,
                    severity: Severity::Low,
                    title: "HSTS max-age below one year".to_string(),
                    description: format!("HSTS max-age is {age}, less than 31536000"),
                    evidence: vec![format!("strict-transport-security: {value}")],
                    recommendation: "Increase max-age to at least 31536000 (one year)."
                        .to_string(),
                    impact: "Short HSTS windows leave repeat visitors open to downgrade."
                        .to_string(),
                });
            }
        }
    }

    None
}
