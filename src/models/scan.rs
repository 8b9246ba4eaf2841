//! Scan lifecycle model: one row per assessment of a single URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "scan_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Completed,
    Failed,
}

impl ScanStatus {
    /// Legal lifecycle moves. SCANNING is entered only through the atomic
    /// claim; the SCANNING -> PENDING edge exists for the admin reset path.
    pub fn can_transition_to(self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Scanning)
                | (ScanStatus::Scanning, ScanStatus::Completed)
                | (ScanStatus::Scanning, ScanStatus::Failed)
                | (ScanStatus::Scanning, ScanStatus::Pending)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "risk_level", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Scan {
    pub id: Uuid,
    pub url: String,
    pub domain: String,
    pub scan_number: i32,
    pub status: ScanStatus,
    pub risk_score: Option<i32>,
    pub risk_level: Option<RiskLevel>,
    pub has_ai: bool,
    pub detected_tech: serde_json::Value,
    pub findings: serde_json::Value,
    pub metadata: serde_json::Value,
    pub worker_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// List-view DTO excluding the large JSON documents.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanSummary {
    pub id: Uuid,
    pub url: String,
    pub domain: String,
    pub scan_number: i32,
    pub status: ScanStatus,
    pub risk_score: Option<i32>,
    pub risk_level: Option<RiskLevel>,
    pub has_ai: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Submission request body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateScanRequest {
    #[validate(length(min = 1, max = 2048, message = "url must be 1-2048 characters"))]
    pub url: String,
}

/// Submission response: enough to poll for the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanCreated {
    #[serde(rename = "scanId")]
    pub scan_id: Uuid,
    #[serde(rename = "scanNumber")]
    pub scan_number: i32,
    pub domain: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_status_serialization() {
        let status = ScanStatus::Scanning;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"SCANNING\"");
    }

    #[test]
    fn risk_level_deserialization() {
        let level: RiskLevel = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(level, RiskLevel::Critical);
    }

    #[test]
    fn pending_can_only_move_to_scanning() {
        assert!(ScanStatus::Pending.can_transition_to(ScanStatus::Scanning));
        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Completed));
        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Failed));
    }

    #[test]
    fn scanning_reaches_both_terminals_and_reset() {
        assert!(ScanStatus::Scanning.can_transition_to(ScanStatus::Completed));
        assert!(ScanStatus::Scanning.can_transition_to(ScanStatus::Failed));
        assert!(ScanStatus::Scanning.can_transition_to(ScanStatus::Pending));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [
            ScanStatus::Pending,
            ScanStatus::Scanning,
            ScanStatus::Completed,
            ScanStatus::Failed,
        ] {
            assert!(!ScanStatus::Completed.can_transition_to(next));
            assert!(!ScanStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn create_scan_request_validates_length() {
        use validator::Validate;

        let ok = CreateScanRequest {
            url: "example.com".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty = CreateScanRequest { url: String::new() };
        assert!(empty.validate().is_err());
    }
}
