//! Analyzer pipeline: independent detectors consuming one crawl snapshot.
//!
//! Each analyzer implements the `Analyzer` trait and gathers evidence from
//! up to four channels of the snapshot. The pipeline isolates every
//! analyzer: an internal failure (error or panic) yields zero findings for
//! that analyzer, never a pipeline abort.

pub mod ai_provider;
pub mod api_key;
pub mod chat_widget;
pub mod cookie_security;
pub mod security_headers;

use std::panic::{catch_unwind, AssertUnwindSafe};

use regex::Regex;
use serde::Serialize;

use crate::models::finding::{Confidence, Detection, DetectionCategory, Finding};
use crate::models::snapshot::CrawlSnapshot;

pub use ai_provider::AiProviderAnalyzer;
pub use api_key::ApiKeyExposureAnalyzer;
pub use chat_widget::ChatWidgetAnalyzer;
pub use cookie_security::CookieSecurityAnalyzer;
pub use security_headers::SecurityHeadersAnalyzer;

/// Output of one analyzer run.
#[derive(Debug, Default)]
pub struct AnalyzerOutput {
    pub findings: Vec<Finding>,
    pub detections: Vec<Detection>,
}

/// Trait for pluggable snapshot detectors. Implementations are pure: they
/// read the snapshot and emit findings/detections, nothing else.
pub trait Analyzer: Send + Sync {
    /// Stable analyzer name recorded with failures and in scan metadata.
    fn name(&self) -> &'static str;

    /// Analyze one snapshot. Expected failures come back as `Err`; the
    /// pipeline treats both errors and panics as "this analyzer found
    /// nothing".
    fn analyze(&self, snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, anyhow::Error>;
}

/// Failure of a single analyzer, isolated by the pipeline and recorded in
/// scan metadata.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerFailure {
    pub analyzer: String,
    pub message: String,
}

/// Concatenated pipeline result over all registered analyzers.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub findings: Vec<Finding>,
    pub detections: Vec<Detection>,
    pub failures: Vec<AnalyzerFailure>,
}

/// Run every registered analyzer against the snapshot.
///
/// Analyzers are read-only and independent, so order does not affect the
/// result; outputs are concatenated in registration order.
pub fn run_pipeline(analyzers: &[Box<dyn Analyzer>], snapshot: &CrawlSnapshot) -> PipelineOutcome {
    let mut outcome = PipelineOutcome::default();

    for analyzer in analyzers {
        match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(snapshot))) {
            Ok(Ok(output)) => {
                outcome.findings.extend(output.findings);
                outcome.detections.extend(output.detections);
            }
            Ok(Err(e)) => {
                tracing::warn!(analyzer = analyzer.name(), error = %e, "Analyzer failed");
                outcome.failures.push(AnalyzerFailure {
                    analyzer: analyzer.name().to_string(),
                    message: e.to_string(),
                });
            }
            Err(panic) => {
                let message = panic_message(panic);
                tracing::error!(analyzer = analyzer.name(), error = %message, "Analyzer panicked");
                outcome.failures.push(AnalyzerFailure {
                    analyzer: analyzer.name().to_string(),
                    message,
                });
            }
        }
    }

    outcome
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "analyzer panicked".to_string()
    }
}

/// The registered analyzer set: an explicit immutable list built at
/// startup, not a dynamically populated registry.
pub fn default_analyzers() -> Result<Vec<Box<dyn Analyzer>>, anyhow::Error> {
    Ok(vec![
        Box::new(AiProviderAnalyzer::new()?),
        Box::new(ChatWidgetAnalyzer::new()?),
        Box::new(ApiKeyExposureAnalyzer::new()?),
        Box::new(SecurityHeadersAnalyzer::new()),
        Box::new(CookieSecurityAnalyzer::new()),
    ])
}

/// Evidence accumulator implementing the confidence contract shared by
/// every analyzer: script-URL, endpoint, and header matches carry two
/// points; global identifiers and cookie names carry one.
#[derive(Debug, Default)]
pub struct EvidenceTally {
    points: u32,
    evidence: Vec<String>,
}

impl EvidenceTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&mut self, detail: impl Into<String>) {
        self.add(2, "script", detail);
    }

    pub fn endpoint(&mut self, detail: impl Into<String>) {
        self.add(2, "endpoint", detail);
    }

    pub fn header(&mut self, detail: impl Into<String>) {
        self.add(2, "header", detail);
    }

    pub fn global(&mut self, detail: impl Into<String>) {
        self.add(1, "global", detail);
    }

    pub fn cookie(&mut self, detail: impl Into<String>) {
        self.add(1, "cookie", detail);
    }

    fn add(&mut self, points: u32, channel: &str, detail: impl Into<String>) {
        self.points += points;
        self.evidence.push(format!("{channel}: {}", detail.into()));
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    /// Finish the tally. Zero points means nothing matched and no
    /// detection exists.
    pub fn into_detection(self, name: &str, category: DetectionCategory) -> Option<Detection> {
        let confidence = Confidence::from_evidence_points(self.points)?;
        Some(Detection {
            name: name.to_string(),
            category,
            confidence,
            evidence_points: self.points,
            evidence: self.evidence,
        })
    }
}

/// One technology's detection rule across the four evidence channels.
/// Every matching pattern occurrence accumulates points, so a page loading
/// a vendor script twice scores higher than one loading it once.
pub struct DetectionRule {
    pub name: String,
    pub category: DetectionCategory,
    pub script_patterns: Vec<Regex>,
    /// Substring match against observed request URLs.
    pub endpoint_patterns: Vec<String>,
    /// Substring match against response header names.
    pub header_patterns: Vec<String>,
    /// Identifier present anywhere in the markup (globals, SDK imports).
    pub globals: Vec<String>,
    /// Exact or prefix match on cookie names.
    pub cookie_prefixes: Vec<String>,
}

impl DetectionRule {
    pub fn evaluate(&self, snapshot: &CrawlSnapshot) -> Option<Detection> {
        let mut tally = EvidenceTally::new();

        for script in &snapshot.scripts {
            for pattern in &self.script_patterns {
                if pattern.is_match(script) {
                    tally.script(script.clone());
                }
            }
        }

        for request in &snapshot.network_requests {
            for endpoint in &self.endpoint_patterns {
                if request.url.contains(endpoint.as_str()) {
                    tally.endpoint(format!("{} ({})", request.url, endpoint));
                }
            }
        }

        for name in snapshot.response_headers.keys() {
            for pattern in &self.header_patterns {
                if name.contains(pattern.as_str()) {
                    tally.header(name.clone());
                }
            }
        }

        for global in &self.globals {
            if snapshot.markup.contains(global.as_str()) {
                tally.global(global.clone());
            }
        }

        for cookie in &snapshot.cookies {
            for prefix in &self.cookie_prefixes {
                if cookie.name == *prefix || cookie.name.starts_with(prefix.as_str()) {
                    tally.cookie(cookie.name.clone());
                }
            }
        }

        tally.into_detection(&self.name, self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot::{CookieRecord, NetworkRequest};

    pub(crate) fn blank_snapshot() -> CrawlSnapshot {
        CrawlSnapshot {
            url: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            markup: String::new(),
            scripts: vec![],
            cookies: vec![],
            network_requests: vec![],
            response_headers: Default::default(),
            load_time_ms: 45,
        }
    }

    fn widget_rule() -> DetectionRule {
        DetectionRule {
            name: "Intercom".to_string(),
            category: DetectionCategory::ChatWidget,
            script_patterns: vec![Regex::new(r"widget\.intercom\.io").unwrap()],
            endpoint_patterns: vec!["api-iam.intercom.io".to_string()],
            header_patterns: vec![],
            globals: vec!["intercomSettings".to_string()],
            cookie_prefixes: vec!["intercom-".to_string()],
        }
    }

    #[test]
    fn no_evidence_means_no_detection() {
        let snapshot = blank_snapshot();
        assert!(widget_rule().evaluate(&snapshot).is_none());
    }

    #[test]
    fn single_weak_channel_is_low_confidence() {
        let mut snapshot = blank_snapshot();
        snapshot.markup = "window.intercomSettings = {};".to_string();
        let detection = widget_rule().evaluate(&snapshot).unwrap();
        assert_eq!(detection.confidence, Confidence::Low);
        assert_eq!(detection.evidence_points, 1);
    }

    #[test]
    fn strong_channel_is_medium_confidence() {
        let mut snapshot = blank_snapshot();
        snapshot.scripts = vec!["https://widget.intercom.io/widget/abc".to_string()];
        let detection = widget_rule().evaluate(&snapshot).unwrap();
        assert_eq!(detection.confidence, Confidence::Medium);
        assert_eq!(detection.evidence_points, 2);
    }

    #[test]
    fn combined_channels_reach_high_confidence() {
        let mut snapshot = blank_snapshot();
        snapshot.scripts = vec!["https://widget.intercom.io/widget/abc".to_string()];
        snapshot.network_requests = vec![NetworkRequest {
            url: "https://api-iam.intercom.io/messenger".to_string(),
            method: "POST".to_string(),
            resource_type: "xhr".to_string(),
            status: Some(200),
        }];
        snapshot.markup = "window.intercomSettings = {};".to_string();
        snapshot.cookies = vec![CookieRecord {
            name: "intercom-session-xyz".to_string(),
            value: "v".to_string(),
            secure: true,
            http_only: true,
            same_site: Some("Lax".to_string()),
        }];

        let detection = widget_rule().evaluate(&snapshot).unwrap();
        // 2 (script) + 2 (endpoint) + 1 (global) + 1 (cookie)
        assert_eq!(detection.evidence_points, 6);
        assert_eq!(detection.confidence, Confidence::High);
        assert_eq!(detection.evidence.len(), 4);
    }

    struct FailingAnalyzer;

    impl Analyzer for FailingAnalyzer {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn analyze(&self, _snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, anyhow::Error> {
            Err(anyhow::anyhow!("synthetic failure"))
        }
    }

    struct PanickingAnalyzer;

    impl Analyzer for PanickingAnalyzer {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn analyze(&self, _snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, anyhow::Error> {
            panic!("synthetic panic");
        }
    }

    struct OneDetectionAnalyzer;

    impl Analyzer for OneDetectionAnalyzer {
        fn name(&self) -> &'static str {
            "one-detection"
        }

        fn analyze(&self, snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, anyhow::Error> {
            let mut tally = EvidenceTally::new();
            tally.script(snapshot.url.clone());
            tally.endpoint(snapshot.url.clone());
            Ok(AnalyzerOutput {
                findings: vec![],
                detections: tally
                    .into_detection("Marker", DetectionCategory::AiProvider)
                    .into_iter()
                    .collect(),
            })
        }
    }

    #[test]
    fn pipeline_isolates_errors_and_panics() {
        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(FailingAnalyzer),
            Box::new(PanickingAnalyzer),
            Box::new(OneDetectionAnalyzer),
        ];
        let outcome = run_pipeline(&analyzers, &blank_snapshot());

        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].analyzer, "failing");
        assert_eq!(outcome.failures[1].analyzer, "panicking");
        assert!(outcome.failures[1].message.contains("synthetic panic"));
    }

    #[test]
    fn default_analyzer_set_is_stable() {
        let analyzers = default_analyzers().unwrap();
        let names: Vec<&str> = analyzers.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec![
                "ai-provider",
                "chat-widget",
                "api-key-exposure",
                "security-headers",
                "cookie-security",
            ]
        );
    }

    #[test]
    fn identical_snapshot_yields_identical_confidence() {
        let mut snapshot = blank_snapshot();
        snapshot.scripts = vec!["https://widget.intercom.io/widget/abc".to_string()];

        let first = widget_rule().evaluate(&snapshot).unwrap();
        let second = widget_rule().evaluate(&snapshot).unwrap();
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.evidence_points, second.evidence_points);
    }
}
