//! Detects AI vendor integrations: provider API domains, inference
//! endpoints, SDK references, and provider-specific response headers.

use anyhow::Error;
use regex::Regex;

use super::{Analyzer, AnalyzerOutput, DetectionRule, EvidenceTally};
use crate::models::finding::DetectionCategory;
use crate::models::snapshot::CrawlSnapshot;

/// Inference endpoint paths commonly proxied through first-party backends.
const AI_ENDPOINT_PATHS: &[&str] = &[
    "/api/chat",
    "/api/ai",
    "/v1/chat",
    "/v1/completions",
    "/v1/embeddings",
    "/v1/messages",
    "/v1/complete",
    "/ai/generate",
    "/ai/chat",
    "/llm/",
    "/assistant",
    "/inference",
];

/// SDK and framework identifiers that show up in bundled markup.
const AI_JS_LIBRARIES: &[&str] = &[
    "@anthropic-ai",
    "@azure/openai",
    "@aws-sdk/client-bedrock",
    "@google/generative-ai",
    "cohere-ai",
    "@huggingface/inference",
    "langchain",
    "llamaindex",
    "@xenova/transformers",
    "@ai-sdk",
    "@vercel/ai",
    "tiktoken",
    "gpt-3-encoder",
];

pub struct AiProviderAnalyzer {
    rules: Vec<DetectionRule>,
}

impl AiProviderAnalyzer {
    pub fn new() -> Result<Self, Error> {
        let provider = |name: &str, script_res: &[&str], endpoints: &[&str], globals: &[&str], headers: &[&str]| -> Result<DetectionRule, Error> {
            Ok(DetectionRule {
                name: name.to_string(),
                category: DetectionCategory::AiProvider,
                script_patterns: script_res
                    .iter()
                    .map(|p| Regex::new(p))
                    .collect::<Result<Vec<_>, _>>()?,
                endpoint_patterns: endpoints.iter().map(|s| s.to_string()).collect(),
                header_patterns: headers.iter().map(|s| s.to_string()).collect(),
                globals: globals.iter().map(|s| s.to_string()).collect(),
                cookie_prefixes: vec![],
            })
        };

        let rules = vec![
            provider(
                "OpenAI",
                &[r"(?i)api\.openai\.com", r"(?i)cdn\.openai\.com"],
                &["api.openai.com", "/v1/chat/completions"],
                &["window.OpenAI", "openai.api"],
                &["openai-organization", "openai-model"],
            )?,
            provider(
                "Anthropic Claude",
                &[r"(?i)api\.anthropic\.com"],
                &["api.anthropic.com", "/v1/messages"],
                &["@anthropic-ai"],
                &["anthropic-version", "anthropic-ratelimit"],
            )?,
            provider(
                "Google Gemini",
                &[r"(?i)generativelanguage\.googleapis\.com"],
                &["generativelanguage.googleapis.com"],
                &["@google/generative-ai", "GoogleGenerativeAI"],
                &[],
            )?,
            provider(
                "Cohere",
                &[r"(?i)api\.cohere\.ai"],
                &["api.cohere.ai"],
                &["cohere-ai", "CohereClient"],
                &[],
            )?,
            provider(
                "Hugging Face",
                &[r"(?i)api-inference\.huggingface\.co"],
                &["api-inference.huggingface.co", "huggingface.co/models"],
                &["@huggingface/inference"],
                &[],
            )?,
            provider(
                "Azure OpenAI",
                &[r"(?i)\.openai\.azure\.com"],
                &["openai.azure.com"],
                &["@azure/openai"],
                &["azureml-model-deployment"],
            )?,
            provider(
                "AWS Bedrock",
                &[r"(?i)bedrock-runtime\.[a-z0-9-]+\.amazonaws\.com"],
                &["bedrock-runtime", "amazonaws.com/bedrock"],
                &["@aws-sdk/client-bedrock"],
                &[],
            )?,
            provider(
                "Google Vertex AI",
                &[r"(?i)aiplatform\.googleapis\.com"],
                &["aiplatform.googleapis.com"],
                &["@google-cloud/aiplatform", "vertexai"],
                &[],
            )?,
            provider(
                "Stability AI",
                &[r"(?i)api\.stability\.ai"],
                &["api.stability.ai"],
                &["stability-sdk", "dreamstudio"],
                &[],
            )?,
            provider(
                "Replicate",
                &[r"(?i)api\.replicate\.com"],
                &["api.replicate.com"],
                &["replicate-sdk"],
                &[],
            )?,
            provider(
                "ElevenLabs",
                &[r"(?i)api\.elevenlabs\.io"],
                &["api.elevenlabs.io"],
                &["elevenlabs"],
                &[],
            )?,
        ];

        Ok(Self { rules })
    }

    /// First-party inference endpoints and bundled SDK references are not
    /// attributable to a single vendor; they are reported as one generic
    /// integration detection so the signal is not lost.
    fn generic_integration(&self, snapshot: &CrawlSnapshot) -> Option<crate::models::finding::Detection> {
        let mut tally = EvidenceTally::new();

        for request in &snapshot.network_requests {
            for path in AI_ENDPOINT_PATHS {
                if request.url.contains(path) {
                    tally.endpoint(format!("{} ({})", request.url, path));
                }
            }
        }

        for library in AI_JS_LIBRARIES {
            if snapshot.markup.contains(library) {
                tally.global((*library).to_string());
            }
        }

        tally.into_detection("AI Integration", DetectionCategory::AiProvider)
    }
}

impl Analyzer for AiProviderAnalyzer {
    fn name(&self) -> &'static str {
        "ai-provider"
    }

    fn analyze(&self, snapshot: &CrawlSnapshot) -> Result<AnalyzerOutput, Error> {
        let mut output = AnalyzerOutput::default();

        for rule in &self.rules {
            if let Some(detection) = rule.evaluate(snapshot) {
                output.detections.push(detection);
            }
        }

        // Only fall back to the generic detection when no vendor matched,
        // otherwise every vendor hit would be double counted.
        if output.detections.is_empty() {
            if let Some(detection) = self.generic_integration(snapshot) {
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
    use crate::models::snapshot::NetworkRequest;

    fn snapshot() -> CrawlSnapshot {
        CrawlSnapshot {
            url: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            markup: String::new(),
            scripts: vec![],
            cookies: vec![],
            network_requests: vec![],
            response_headers: Default::default(),
            load_time_ms: 30,
        }
    }

    #[test]
    fn clean_page_yields_no_detections() {
        let analyzer = AiProviderAnalyzer::new().unwrap();
        let output = analyzer.analyze(&snapshot()).unwrap();
        assert!(output.detections.is_empty());
        assert!(output.findings.is_empty());
    }

    #[test]
    fn openai_script_and_endpoint_is_high_confidence() {
        let analyzer = AiProviderAnalyzer::new().unwrap();
        let mut snap = snapshot();
        snap.scripts = vec!["https://api.openai.com/v1/assistant.js".to_string()];
        snap.network_requests = vec![NetworkRequest {
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            method: "POST".to_string(),
            resource_type: "xhr".to_string(),
            status: Some(200),
        }];

        let output = analyzer.analyze(&snap).unwrap();
        let openai = output
            .detections
            .iter()
            .find(|d| d.name == "OpenAI")
            .expect("OpenAI detection");
        assert_eq!(openai.confidence, Confidence::High);
    }

    #[test]
    fn anthropic_version_header_scores_two_points() {
        let analyzer = AiProviderAnalyzer::new().unwrap();
        let mut snap = snapshot();
        snap.response_headers
            .insert("anthropic-version".to_string(), "2023-06-01".to_string());

        let output = analyzer.analyze(&snap).unwrap();
        let claude = output
            .detections
            .iter()
            .find(|d| d.name == "Anthropic Claude")
            .expect("Anthropic detection");
        assert_eq!(claude.evidence_points, 2);
        assert_eq!(claude.confidence, Confidence::Medium);
    }

    #[test]
    fn first_party_chat_endpoint_reports_generic_integration() {
        let analyzer = AiProviderAnalyzer::new().unwrap();
        let mut snap = snapshot();
        snap.network_requests = vec![NetworkRequest {
            url: "https://example.com/api/chat".to_string(),
            method: "POST".to_string(),
            resource_type: "fetch".to_string(),
            status: Some(200),
        }];

        let output = analyzer.analyze(&snap).unwrap();
        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.detections[0].name, "AI Integration");
        assert_eq!(output.detections[0].confidence, Confidence::Medium);
    }

    #[test]
    fn langchain_reference_alone_is_low_confidence() {
        let analyzer = AiProviderAnalyzer::new().unwrap();
        let mut snap = snapshot();
        snap.markup = r#"<script>import {LLMChain} from "langchain/chains";</script>"#.to_string();

        let output = analyzer.analyze(&snap).unwrap();
        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.detections[0].confidence, Confidence::Low);
    }
}
