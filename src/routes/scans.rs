//! Scan submission, lookup, and report routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ApiResponse, AppError};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::scan::{CreateScanRequest, Scan, ScanCreated, ScanStatus, ScanSummary};
use crate::services::scan as scan_service;
use crate::AppState;

/// Status filter for the scan list (`?status=`).
#[derive(Debug, Default, Deserialize)]
pub struct ScanListQuery {
    pub status: Option<ScanStatus>,
}

/// POST /api/scan — submit a URL for scanning.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateScanRequest>,
) -> Result<Json<ApiResponse<ScanCreated>>, AppError> {
    body.validate()
        .map_err(|e| AppError::validation("INVALID_URL", e.to_string()))?;
    let created =
        scan_service::create_scan(&state.db, &body.url, false, state.config.job_max_attempts)
            .await?;
    Ok(ApiResponse::success(created))
}

/// POST /api/scan/regenerate — force a fresh scan even when one is in flight.
pub async fn regenerate(
    State(state): State<AppState>,
    Json(body): Json<CreateScanRequest>,
) -> Result<Json<ApiResponse<ScanCreated>>, AppError> {
    body.validate()
        .map_err(|e| AppError::validation("INVALID_URL", e.to_string()))?;
    let created =
        scan_service::create_scan(&state.db, &body.url, true, state.config.job_max_attempts)
            .await?;
    Ok(ApiResponse::success(created))
}

/// GET /api/scans/:id — get a scan by ID.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Scan>>, AppError> {
    let scan = scan_service::get_scan(&state.db, id).await?;
    Ok(ApiResponse::success(scan))
}

/// GET /api/scans — list scan summaries, optionally filtered by status.
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<ScanListQuery>,
) -> Result<Json<ApiResponse<PagedResult<ScanSummary>>>, AppError> {
    let result = scan_service::list_scans(&state.db, filter.status, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/reports/:domain/:scan_number — get a scan by report address.
pub async fn get_report(
    State(state): State<AppState>,
    Path((domain, scan_number)): Path<(String, i32)>,
) -> Result<Json<ApiResponse<Scan>>, AppError> {
    let scan = scan_service::get_scan_by_domain(&state.db, &domain, scan_number).await?;
    Ok(ApiResponse::success(scan))
}
