//! Detects embedded AI chat widgets by their loader scripts, messenger
//! endpoints, page globals, and cookies.

use anyhow::Error;
use regex::Regex;

use super::{Analyzer, AnalyzerOutput, DetectionRule};
use crate::models::finding::DetectionCategory;
use crate::models::snapshot::CrawlSnapshot;

pub struct ChatWidgetAnalyzer {
    rules: Vec<DetectionRule>,
}

impl ChatWidgetAnalyzer {
    pub fn new() -> Result<Self, Error> {
        let widget = |name: &str, script_res: &[&str], endpoints: &[&str], globals: &[&str], cookies: &[&str]| -> Result<DetectionRule, Error> {
            Ok(DetectionRule {
                name: name.to_string(),
                category: DetectionCategory::ChatWidget,
                script_patterns: script_res
                    .iter()
                    .map(|p| Regex::new(p))
                    .collect::<Result<Vec<_>, _>>()?,
                endpoint_patterns: endpoints.iter().map(|s| s.to_string()).collect(),
                header_patterns: vec![],
                globals: globals.iter().map(|s| s.to_string()).collect(),
                cookie_prefixes: cookies.iter().map(|s| s.to_string()).collect(),
            })
        };

        let rules = vec![
            widget(
                "Intercom",
                &[r"(?i)widget\.intercom\.io", r"(?i)js\.intercomcdn\.com"],
                &["api-iam.intercom.io"],
                &["intercomSettings", "Intercom("],
                &["intercom-id", "intercom-session"],
            )?,
            widget(
                "Drift",
                &[r"(?i)js\.driftt\.com", r"(?i)js\.drift\.com"],
                &["event.api.drift.com"],
                &["drift.load", "driftt"],
                &["driftt_aid", "drift_campaign_refresh"],
            )?,
            widget(
                "Crisp",
                &[r"(?i)client\.crisp\.chat"],
                &["client.relay.crisp.chat"],
                &["$crisp", "CRISP_WEBSITE_ID"],
                &["crisp-client"],
            )?,
            widget(
                "Tawk.to",
                &[r"(?i)embed\.tawk\.to"],
                &["va.tawk.to"],
                &["Tawk_API"],
                &["twk_", "TawkConnectionTime"],
            )?,
            widget(
                "Zendesk",
                &[r"(?i)static\.zdassets\.com", r"(?i)v2\.zopim\.com"],
                &["ekr.zdassets.com"],
                &["zESettings", "zE("],
                &["__zlcmid"],
            )?,
        ];

        Ok(Self { rules })
    }
}

impl Analyzer for ChatWidgetAnalyzer {
    fn name(&self) -> &'static str {
        "chat-widget"
    }

    fn analyze(&self, snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, Error> {
        let mut output = AnalyzerOutput::default();
        for rule in &self.rules {
            if let Some(detection) = rule.evaluate(snapshot) {
                output.detections.push(detection);
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::Confidence;
    use crate::models::snapshot::CookieRecord;

    fn snapshot() -> CrawlSnapshot {
        CrawlSnapshot {
            url: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            markup: String::new(),
            scripts: vec![],
            cookies: vec![],
            network_requests: vec![],
            response_headers: Default::default(),
            load_time_ms: 20,
        }
    }

    #[test]
    fn tawk_loader_script_detected() {
        let analyzer = ChatWidgetAnalyzer::new().unwrap();
        let mut snap = snapshot();
        snap.scripts = vec!["https://embed.tawk.to/5f9a/default".to_string()];

        let output = analyzer.analyze(&snap).unwrap();
        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.detections[0].name, "Tawk.to");
        assert_eq!(output.detections[0].confidence, Confidence::Medium);
    }

    #[test]
    fn zendesk_cookie_prefix_match() {
        let analyzer = ChatWidgetAnalyzer::new().unwrap();
        let mut snap = snapshot();
        snap.cookies = vec![CookieRecord {
            name: "__zlcmid".to_string(),
            value: "1".to_string(),
            secure: false,
            http_only: false,
            same_site: None,
        }];

        let output = analyzer.analyze(&snap).unwrap();
        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.detections[0].name, "Zendesk");
        assert_eq!(output.detections[0].confidence, Confidence::Low);
    }

    #[test]
    fn multiple_widgets_detected_independently() {
        let analyzer = ChatWidgetAnalyzer::new().unwrap();
        let mut snap = snapshot();
        snap.scripts = vec![
            "https://widget.intercom.io/widget/app123".to_string(),
            "https://client.crisp.chat/l.js".to_string(),
        ];
        snap.markup = "window.intercomSettings = { app_id: 'app123' };".to_string();

        let output = analyzer.analyze(&snap).unwrap();
        let names: Vec<&str> = output.detections.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"Intercom"));
        assert!(names.contains(&"Crisp"));

        let intercom = output
            .detections
            .iter()
            .find(|d| d.name == "Intercom")
            .unwrap();
        // script (2) + global (1)
        assert_eq!(intercom.evidence_points, 3);
    }
}
