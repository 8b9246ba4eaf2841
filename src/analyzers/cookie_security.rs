//! Flags cookies set without the attributes that protect them in transit
//! and from script access.

use anyhow::Error;

use super::{Analyzer, AnalyzerOutput};
use crate::models::finding::{Finding, FindingKind, Severity};
use crate::models::snapshot::{CookieRecord, CrawlSnapshot};

/// Name fragments that mark a cookie as carrying authentication state.
const SENSITIVE_NAME_PARTS: &[&str] = &[
    "session", "auth", "token", "jwt", "csrf", "xsrf", "sid", "user", "login", "__host-",
    "__secure-",
];

pub struct CookieSecurityAnalyzer;

impl CookieSecurityAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CookieSecurityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_sensitive(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SENSITIVE_NAME_PARTS.iter().any(|p| lowered.contains(p))
}

fn check_cookie(cookie: &CookieRecord, https: bool) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !cookie.secure {
        findings.push(Finding {
            kind: FindingKind::InsecureCookie,
            severity: if https { Severity::High } else { Severity::Medium },
            title: format!("Cookie '{}' lacks the Secure flag", cookie.name),
            description: "The cookie can be transmitted over unencrypted connections"
                .to_string(),
            evidence: vec![format!("Set-Cookie: {} (no Secure)", cookie.name)],
            recommendation: "Set the Secure flag so the cookie is only sent over HTTPS."
                .to_string(),
            impact: "An on-path attacker can read the cookie from plaintext traffic."
                .to_string(),
        });
    }

    if !cookie.http_only && is_sensitive(&cookie.name) {
        findings.push(Finding {
            kind: FindingKind::InsecureCookie,
            severity: Severity::High,
            title: format!("Sensitive cookie '{}' readable from script", cookie.name),
            description: "An authentication-bearing cookie is missing HttpOnly".to_string(),
            evidence: vec![format!("Set-Cookie: {} (no HttpOnly)", cookie.name)],
            recommendation: "Set HttpOnly to keep the cookie out of reach of page script."
                .to_string(),
            impact: "Any XSS on the site steals the session outright.".to_string(),
        });
    }

    let same_site_missing = cookie
        .same_site
        .as_deref()
        .map(|v| v.eq_ignore_ascii_case("none"))
        .unwrap_or(true);
    if same_site_missing {
        let detail = match cookie.same_site.as_deref() {
            Some(_) => "SameSite=None sends the cookie on all cross-site requests",
            None => "No SameSite attribute; browser defaults vary",
        };
        findings.push(Finding {
            kind: FindingKind::InsecureCookie,
            severity: Severity::Medium,
            title: format!("Cookie '{}' has no effective SameSite policy", cookie.name),
            description: detail.to_string(),
            evidence: vec![format!(
                "Set-Cookie: {} (SameSite={})",
                cookie.name,
                cookie.same_site.as_deref().unwrap_or("absent")
            )],
            recommendation: "Set SameSite=Strict or SameSite=Lax to limit cross-site sends."
                .to_string(),
            impact: "The cookie rides along on forged cross-site requests.".to_string(),
        });
    }

    findings
}

impl Analyzer for CookieSecurityAnalyzer {
    fn name(&self) -> &'static str {
        "cookie-security"
    }

    fn analyze(&self, snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, Error> {
        let https = snapshot.final_url.starts_with("https://");
        let mut output = AnalyzerOutput::default();
        for cookie in &snapshot.cookies {
            output.findings.extend(check_cookie(cookie, https));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, secure: bool, http_only: bool, same_site: Option<&str>) -> CookieRecord {
        CookieRecord {
            name: name.to_string(),
            value: "v".to_string(),
            secure,
            http_only,
            same_site: same_site.map(str::to_string),
        }
    }

    fn snapshot_with_cookies(cookies: Vec<CookieRecord>) -> CrawlSnapshot {
        CrawlSnapshot {
            url: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            markup: String::new(),
            scripts: vec![],
            cookies,
            network_requests: vec![],
            response_headers: Default::default(),
            load_time_ms: 5,
        }
    }

    #[test]
    fn hardened_cookie_is_clean() {
        let analyzer = CookieSecurityAnalyzer::new();
        let snap = snapshot_with_cookies(vec![cookie("session_id", true, true, Some("Strict"))]);
        let output = analyzer.analyze(&snap).unwrap();
        assert!(output.findings.is_empty());
    }

    #[test]
    fn missing_secure_on_https_site_is_high() {
        let analyzer = CookieSecurityAnalyzer::new();
        let snap = snapshot_with_cookies(vec![cookie("prefs", false, true, Some("Lax"))]);
        let output = analyzer.analyze(&snap).unwrap();

        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.findings[0].severity, Severity::High);
        assert!(output.findings[0].title.contains("Secure"));
    }

    #[test]
    fn script_readable_session_cookie_is_high() {
        let analyzer = CookieSecurityAnalyzer::new();
        let snap = snapshot_with_cookies(vec![cookie("auth_token", true, false, Some("Lax"))]);
        let output = analyzer.analyze(&snap).unwrap();

        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.findings[0].severity, Severity::High);
        assert!(output.findings[0].title.contains("auth_token"));
    }

    #[test]
    fn non_sensitive_cookie_without_httponly_passes() {
        let analyzer = CookieSecurityAnalyzer::new();
        let snap = snapshot_with_cookies(vec![cookie("theme", true, false, Some("Lax"))]);
        let output = analyzer.analyze(&snap).unwrap();
        assert!(output.findings.is_empty());
    }

    #[test]
    fn same_site_none_and_absent_both_flagged() {
        let analyzer = CookieSecurityAnalyzer::new();
        let snap = snapshot_with_cookies(vec![
            cookie("a", true, true, Some("None")),
            cookie("b", true, true, None),
        ]);
        let output = analyzer.analyze(&snap).unwrap();

        assert_eq!(output.findings.len(), 2);
        assert!(output
            .findings
            .iter()
            .all(|f| f.severity == Severity::Medium));
    }
}
