//! Admin recovery routes: bulk deletion, stuck-scan reset, manual worker
//! trigger, and job retention cleanup.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::models::scan::ScanStatus;
use crate::services::admin::{
    self as admin_service, BulkDeleteResult, CleanupResult, ResetStuckResult, TriggerResult,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub status: ScanStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupJobsRequest {
    pub older_than_days: Option<i32>,
}

/// POST /api/admin/scans/bulk-delete — delete all scans (and jobs) in one
/// status.
pub async fn bulk_delete(
    State(state): State<AppState>,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Json<ApiResponse<BulkDeleteResult>>, AppError> {
    let result = admin_service::bulk_delete(&state.db, body.status).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/admin/scans/reset-stuck — move overdue SCANNING scans back to
/// PENDING.
pub async fn reset_stuck(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResetStuckResult>>, AppError> {
    let result = admin_service::reset_stuck(&state.db, state.config.max_scan_time_secs).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/admin/workers/trigger — spawn a one-shot worker if jobs are
/// waiting.
pub async fn trigger_worker(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TriggerResult>>, AppError> {
    let result = admin_service::trigger_worker(&state.db).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/admin/jobs/cleanup — purge finished jobs past retention.
pub async fn cleanup_jobs(
    State(state): State<AppState>,
    body: Option<Json<CleanupJobsRequest>>,
) -> Result<Json<ApiResponse<CleanupResult>>, AppError> {
    let days = body.and_then(|Json(b)| b.older_than_days);
    let result = admin_service::cleanup_jobs(&state.db, days).await?;
    Ok(ApiResponse::success(result))
}
