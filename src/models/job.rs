//! Queue-level unit of work backing a scan's processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Job type string for website scans. The queue is generic over type, but
/// scan jobs are the only type the workers currently understand.
pub const JOB_TYPE_SCAN: &str = "scan";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Payload carried by every `scan` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobPayload {
    #[serde(rename = "scanId")]
    pub scan_id: Uuid,
    pub url: String,
    pub domain: String,
}

impl Job {
    /// Decode the payload of a `scan` job. Fails on foreign job types or a
    /// malformed payload, both of which mean the job cannot be processed.
    pub fn scan_payload(&self) -> Result<ScanJobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
