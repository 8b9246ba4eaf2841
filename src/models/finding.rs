//! Finding and detection value types produced by the analyzer pipeline.
//!
//! These are not persisted rows of their own: the worker serializes the
//! pipeline output into the `findings` and `detected_tech` JSONB documents
//! on the scan.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Detection confidence, a pure function of accumulated evidence points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Point thresholds shared by every analyzer so confidence is
    /// comparable across unrelated detection categories. Zero points means
    /// no detection at all.
    pub fn from_evidence_points(points: u32) -> Option<Confidence> {
        match points {
            0 => None,
            1 => Some(Confidence::Low),
            2 | 3 => Some(Confidence::Medium),
            _ => Some(Confidence::High),
        }
    }
}

/// Closed set of finding kinds the pipeline can emit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingSecurityHeader,
    WeakSecurityHeader,
    InsecureCookie,
    ExposedApiKey,
}

/// One detected risk signal, aggregated into `Scan.findings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub evidence: Vec<String>,
    pub recommendation: String,
    pub impact: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionCategory {
    AiProvider,
    ChatWidget,
}

/// One detected technology, aggregated into `Scan.detected_tech`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    pub category: DetectionCategory,
    pub confidence: Confidence,
    pub evidence_points: u32,
    pub evidence: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(serde_json::to_string(&Severity::Low).unwrap(), "\"low\"");
    }

    #[test]
    fn confidence_thresholds() {
        assert_eq!(Confidence::from_evidence_points(0), None);
        assert_eq!(Confidence::from_evidence_points(1), Some(Confidence::Low));
        assert_eq!(Confidence::from_evidence_points(2), Some(Confidence::Medium));
        assert_eq!(Confidence::from_evidence_points(3), Some(Confidence::Medium));
        assert_eq!(Confidence::from_evidence_points(4), Some(Confidence::High));
        assert_eq!(Confidence::from_evidence_points(9), Some(Confidence::High));
    }

    #[test]
    fn finding_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&FindingKind::ExposedApiKey).unwrap(),
            "\"exposed_api_key\""
        );
    }

    #[test]
    fn finding_round_trip() {
        let finding = Finding {
            kind: FindingKind::MissingSecurityHeader,
            severity: Severity::High,
            title: "Missing Content-Security-Policy".to_string(),
            description: "No CSP header was returned".to_string(),
            evidence: vec!["content-security-policy absent".to_string()],
            recommendation: "Add a restrictive Content-Security-Policy".to_string(),
            impact: "Increases exposure to XSS".to_string(),
        };
        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, FindingKind::MissingSecurityHeader);
        assert_eq!(back.severity, Severity::High);
    }
}
