//! Risk score and AI trust composite computation.
//!
//! Severity penalties diminish per repeated finding and are capped per
//! severity class, so ten low findings never outweigh one critical:
//! - critical: 25 for the first, 15 each after, capped at 60
//! - high:     12 / 8, capped at 50
//! - medium:    6 / 4, capped at 30
//! - low:       2 / 1, capped at 15
//! The score starts at 100 and is clamped to [0, 100].
//!
//! The trust composite weighs five categories: transparency 25%,
//! user control 20%, compliance 25%, security 20%, ethical AI 10%.

use serde::Serialize;

use crate::models::finding::{Confidence, Detection, Finding, Severity};
use crate::models::scan::RiskLevel;
use crate::models::snapshot::CrawlSnapshot;

struct SeverityPoints {
    first: i32,
    additional: i32,
    cap: i32,
}

const CRITICAL_POINTS: SeverityPoints = SeverityPoints {
    first: 25,
    additional: 15,
    cap: 60,
};
const HIGH_POINTS: SeverityPoints = SeverityPoints {
    first: 12,
    additional: 8,
    cap: 50,
};
const MEDIUM_POINTS: SeverityPoints = SeverityPoints {
    first: 6,
    additional: 4,
    cap: 30,
};
const LOW_POINTS: SeverityPoints = SeverityPoints {
    first: 2,
    additional: 1,
    cap: 15,
};

/// Aggregated risk result persisted with the scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    pub score: i32,
    pub level: RiskLevel,
    pub grade: String,
    pub critical_issues: i32,
    pub high_issues: i32,
    pub medium_issues: i32,
    pub low_issues: i32,
}

/// Aggregate findings into a 0-100 score with level and letter grade.
pub fn compute(findings: &[Finding]) -> RiskScore {
    let critical = count_severity(findings, Severity::Critical);
    let high = count_severity(findings, Severity::High);
    let medium = count_severity(findings, Severity::Medium);
    let low = count_severity(findings, Severity::Low);

    let penalty = severity_penalty(critical, &CRITICAL_POINTS)
        + severity_penalty(high, &HIGH_POINTS)
        + severity_penalty(medium, &MEDIUM_POINTS)
        + severity_penalty(low, &LOW_POINTS);

    let score = (100 - penalty).clamp(0, 100);

    RiskScore {
        score,
        level: level_for(score),
        grade: grade_for(score).to_string(),
        critical_issues: critical,
        high_issues: high,
        medium_issues: medium,
        low_issues: low,
    }
}

fn count_severity(findings: &[Finding], severity: Severity) -> i32 {
    findings.iter().filter(|f| f.severity == severity).count() as i32
}

/// First finding of a severity costs full points, each further one less,
/// with a hard cap per severity class.
fn severity_penalty(count: i32, points: &SeverityPoints) -> i32 {
    if count == 0 {
        return 0;
    }
    let raw = points.first + (count - 1) * points.additional;
    raw.min(points.cap)
}

/// Map a score to its risk level.
fn level_for(score: i32) -> RiskLevel {
    if score >= 80 {
        RiskLevel::Low
    } else if score >= 60 {
        RiskLevel::Medium
    } else if score >= 40 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

/// Thirteen letter-grade bands in 5-point steps from 95 down to 40.
fn grade_for(score: i32) -> &'static str {
    match score {
        s if s >= 95 => "A+",
        s if s >= 90 => "A",
        s if s >= 85 => "A-",
        s if s >= 80 => "B+",
        s if s >= 75 => "B",
        s if s >= 70 => "B-",
        s if s >= 65 => "C+",
        s if s >= 60 => "C",
        s if s >= 55 => "C-",
        s if s >= 50 => "D+",
        s if s >= 45 => "D",
        s if s >= 40 => "D-",
        _ => "F",
    }
}

/// Per-category trust scores, each a 0-100 passed/total ratio.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustCategoryScores {
    pub transparency: f64,
    pub user_control: f64,
    pub compliance: f64,
    pub security: f64,
    pub ethical_ai: f64,
}

/// AI trust composite persisted in scan metadata.
///
/// `score` is None when the site has no detected AI implementation; the
/// checks are meaningless for a site that does not run one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustReport {
    pub score: Option<f64>,
    pub grade: String,
    pub category_scores: TrustCategoryScores,
    pub passed_checks: u32,
    pub total_checks: u32,
    pub has_ai_implementation: bool,
}

struct CategoryTally {
    passed: u32,
    total: u32,
}

impl CategoryTally {
    fn new(checks: &[bool]) -> Self {
        Self {
            passed: checks.iter().filter(|c| **c).count() as u32,
            total: checks.len() as u32,
        }
    }

    fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (f64::from(self.passed) / f64::from(self.total) * 100.0).round()
    }
}

fn markup_mentions(markup: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| markup.contains(n))
}

fn any_script_contains(snapshot: &CrawlSnapshot, needles: &[&str]) -> bool {
    snapshot
        .scripts
        .iter()
        .any(|s| needles.iter().any(|n| s.to_ascii_lowercase().contains(n)))
}

/// Compute the trust composite from the crawl snapshot and pipeline output.
///
/// An AI implementation counts as detected when any detection reached
/// MEDIUM confidence or better.
pub fn trust_report(
    snapshot: &CrawlSnapshot,
    detections: &[Detection],
    findings: &[Finding],
) -> TrustReport {
    let has_ai = detections
        .iter()
        .any(|d| matches!(d.confidence, Confidence::High | Confidence::Medium));

    let markup = snapshot.markup.to_lowercase();

    let transparency = CategoryTally::new(&[
        markup_mentions(
            &markup,
            &["ai assistant", "powered by ai", "chatbot", "virtual assistant"],
        ),
        markup_mentions(&markup, &["ai policy", "ai-policy", "responsible ai"]),
        markup_mentions(
            &markup,
            &["data usage", "how we use your data", "data processing"],
        ),
    ]);

    let user_control = CategoryTally::new(&[
        markup_mentions(&markup, &["feedback"]),
        markup_mentions(
            &markup,
            &[
                "talk to a human",
                "speak to an agent",
                "live agent",
                "human support",
            ],
        ),
        markup_mentions(&markup, &["delete my data", "data deletion", "opt out", "opt-out"]),
    ]);

    let compliance = CategoryTally::new(&[
        markup_mentions(&markup, &["privacy policy", "privacy-policy"]),
        markup_mentions(
            &markup,
            &["terms of service", "terms and conditions", "terms of use"],
        ),
        markup_mentions(&markup, &["cookie consent", "cookie settings", "cookie banner"])
            || any_script_contains(snapshot, &["cookiebot", "onetrust", "usercentrics"]),
    ]);

    let security = CategoryTally::new(&[
        snapshot.final_url.starts_with("https://"),
        !findings.iter().any(|f| f.severity == Severity::Critical),
        snapshot.header("content-security-policy").is_some()
            || snapshot.header("strict-transport-security").is_some(),
    ]);

    let ethical_ai = CategoryTally::new(&[
        markup_mentions(
            &markup,
            &["content moderation", "moderation policy", "community guidelines"],
        ),
        markup_mentions(
            &markup,
            &["ai can make mistakes", "may produce inaccurate", "limitations"],
        ),
    ]);

    let category_scores = TrustCategoryScores {
        transparency: transparency.ratio(),
        user_control: user_control.ratio(),
        compliance: compliance.ratio(),
        security: security.ratio(),
        ethical_ai: ethical_ai.ratio(),
    };

    let passed_checks = transparency.passed
        + user_control.passed
        + compliance.passed
        + security.passed
        + ethical_ai.passed;
    let total_checks = transparency.total
        + user_control.total
        + compliance.total
        + security.total
        + ethical_ai.total;

    if !has_ai {
        return TrustReport {
            score: None,
            grade: "not-applicable".to_string(),
            category_scores,
            passed_checks,
            total_checks,
            has_ai_implementation: false,
        };
    }

    let composite = category_scores.transparency * 0.25
        + category_scores.user_control * 0.20
        + category_scores.compliance * 0.25
        + category_scores.security * 0.20
        + category_scores.ethical_ai * 0.10;
    let composite = (composite * 10.0).round() / 10.0;

    TrustReport {
        score: Some(composite),
        grade: trust_grade(composite).to_string(),
        category_scores,
        passed_checks,
        total_checks,
        has_ai_implementation: true,
    }
}

fn trust_grade(score: f64) -> &'static str {
    if score >= 85.0 {
        "excellent"
    } else if score >= 70.0 {
        "good"
    } else if score >= 50.0 {
        "fair"
    } else {
        "poor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::{DetectionCategory, FindingKind};
    use std::collections::HashMap;

    fn finding(severity: Severity) -> Finding {
        Finding {
            kind: FindingKind::MissingSecurityHeader,
            severity,
            title: "test".to_string(),
            description: "test".to_string(),
            evidence: vec![],
            recommendation: "test".to_string(),
            impact: "test".to_string(),
        }
    }

    fn findings(critical: usize, high: usize, medium: usize, low: usize) -> Vec<Finding> {
        let mut out = Vec::new();
        out.extend(std::iter::repeat_with(|| finding(Severity::Critical)).take(critical));
        out.extend(std::iter::repeat_with(|| finding(Severity::High)).take(high));
        out.extend(std::iter::repeat_with(|| finding(Severity::Medium)).take(medium));
        out.extend(std::iter::repeat_with(|| finding(Severity::Low)).take(low));
        out
    }

    #[test]
    fn clean_scan_is_perfect() {
        let result = compute(&[]);
        assert_eq!(result.score, 100);
        assert_eq!(result.level, RiskLevel::Low);
        assert_eq!(result.grade, "A+");
        assert_eq!(result.critical_issues, 0);
        assert_eq!(result.low_issues, 0);
    }

    #[test]
    fn single_critical_finding() {
        let result = compute(&findings(1, 0, 0, 0));
        // 100 - 25 = 75
        assert_eq!(result.score, 75);
        assert_eq!(result.level, RiskLevel::Medium);
        assert_eq!(result.grade, "B");
        assert_eq!(result.critical_issues, 1);
    }

    #[test]
    fn repeated_criticals_diminish() {
        // 25, then 25 + 15 = 40, then 55
        assert_eq!(compute(&findings(1, 0, 0, 0)).score, 75);
        assert_eq!(compute(&findings(2, 0, 0, 0)).score, 60);
        assert_eq!(compute(&findings(3, 0, 0, 0)).score, 45);
    }

    #[test]
    fn critical_penalty_caps_at_sixty() {
        // 25 + 9*15 = 160, capped at 60
        let result = compute(&findings(10, 0, 0, 0));
        assert_eq!(result.score, 40);
        assert_eq!(result.critical_issues, 10);
    }

    #[test]
    fn low_findings_never_outweigh_a_critical() {
        // 20 lows: 2 + 19*1 = 21, capped at 15 -> 85
        let lows = compute(&findings(0, 0, 0, 20));
        assert_eq!(lows.score, 85);
        assert!(lows.score > compute(&findings(1, 0, 0, 0)).score);
    }

    #[test]
    fn mixed_findings_add_up() {
        // critical 25, high 12+8=20, medium 6, low 2+1+1=4 -> 55 penalty
        let result = compute(&findings(1, 2, 1, 3));
        assert_eq!(result.score, 45);
        assert_eq!(result.level, RiskLevel::High);
        assert_eq!(result.grade, "D");
    }

    #[test]
    fn everything_capped_floors_at_zero() {
        // 60 + 50 + 30 + 15 = 155, clamped to 0
        let result = compute(&findings(10, 10, 10, 20));
        assert_eq!(result.score, 0);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.grade, "F");
    }

    #[test]
    fn grade_band_boundaries() {
        assert_eq!(grade_for(100), "A+");
        assert_eq!(grade_for(95), "A+");
        assert_eq!(grade_for(94), "A");
        assert_eq!(grade_for(90), "A");
        assert_eq!(grade_for(89), "A-");
        assert_eq!(grade_for(85), "A-");
        assert_eq!(grade_for(80), "B+");
        assert_eq!(grade_for(75), "B");
        assert_eq!(grade_for(70), "B-");
        assert_eq!(grade_for(65), "C+");
        assert_eq!(grade_for(60), "C");
        assert_eq!(grade_for(55), "C-");
        assert_eq!(grade_for(50), "D+");
        assert_eq!(grade_for(45), "D");
        assert_eq!(grade_for(40), "D-");
        assert_eq!(grade_for(39), "F");
        assert_eq!(grade_for(0), "F");
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for(100), RiskLevel::Low);
        assert_eq!(level_for(80), RiskLevel::Low);
        assert_eq!(level_for(79), RiskLevel::Medium);
        assert_eq!(level_for(60), RiskLevel::Medium);
        assert_eq!(level_for(59), RiskLevel::High);
        assert_eq!(level_for(40), RiskLevel::High);
        assert_eq!(level_for(39), RiskLevel::Critical);
        assert_eq!(level_for(0), RiskLevel::Critical);
    }

    fn snapshot(markup: &str, final_url: &str) -> CrawlSnapshot {
        CrawlSnapshot {
            url: final_url.to_string(),
            final_url: final_url.to_string(),
            markup: markup.to_string(),
            scripts: vec![],
            cookies: vec![],
            network_requests: vec![],
            response_headers: HashMap::new(),
            load_time_ms: 10,
        }
    }

    fn detection(confidence: Confidence) -> Detection {
        Detection {
            name: "OpenAI".to_string(),
            category: DetectionCategory::AiProvider,
            confidence,
            evidence_points: 4,
            evidence: vec![],
        }
    }

    #[test]
    fn trust_suppressed_without_ai() {
        let snap = snapshot("<html>privacy policy</html>", "https://example.com");
        let report = trust_report(&snap, &[], &[]);
        assert_eq!(report.score, None);
        assert_eq!(report.grade, "not-applicable");
        assert!(!report.has_ai_implementation);
    }

    #[test]
    fn trust_suppressed_for_low_confidence_only() {
        let snap = snapshot("<html></html>", "https://example.com");
        let report = trust_report(&snap, &[detection(Confidence::Low)], &[]);
        assert_eq!(report.score, None);
        assert_eq!(report.grade, "not-applicable");
    }

    #[test]
    fn trust_full_marks_for_exemplary_page() {
        let markup = "<html>Our AI assistant. See our AI policy and data usage. \
                      Send feedback or talk to a human. You can delete my data. \
                      Privacy policy, terms of service, cookie consent. \
                      Community guidelines; the assistant has limitations.</html>";
        let mut snap = snapshot(markup, "https://example.com");
        snap.response_headers.insert(
            "content-security-policy".to_string(),
            "default-src 'self'".to_string(),
        );

        let report = trust_report(&snap, &[detection(Confidence::High)], &[]);
        assert_eq!(report.score, Some(100.0));
        assert_eq!(report.grade, "excellent");
        assert_eq!(report.passed_checks, report.total_checks);
        assert_eq!(report.category_scores.transparency, 100.0);
        assert_eq!(report.category_scores.ethical_ai, 100.0);
    }

    #[test]
    fn trust_weighs_categories() {
        // Bare page over plain http: only the no-critical-findings check
        // passes, so security = round(1/3 * 100) = 33 and the composite is
        // 33 * 0.20 = 6.6.
        let snap = snapshot("<html></html>", "http://example.com");
        let report = trust_report(&snap, &[detection(Confidence::Medium)], &[]);

        assert_eq!(report.category_scores.security, 33.0);
        assert_eq!(report.category_scores.transparency, 0.0);
        assert_eq!(report.score, Some(6.6));
        assert_eq!(report.grade, "poor");
        assert_eq!(report.passed_checks, 1);
        assert_eq!(report.total_checks, 14);
    }

    #[test]
    fn trust_grade_thresholds() {
        assert_eq!(trust_grade(85.0), "excellent");
        assert_eq!(trust_grade(84.9), "good");
        assert_eq!(trust_grade(70.0), "good");
        assert_eq!(trust_grade(69.9), "fair");
        assert_eq!(trust_grade(50.0), "fair");
        assert_eq!(trust_grade(49.9), "poor");
    }
}
