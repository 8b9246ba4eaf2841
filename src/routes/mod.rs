//! Route definitions for the TrustScan API.

pub mod admin;
pub mod health;
pub mod scans;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// Assemble the full route table.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/api/scan", post(scans::create))
        .route("/api/scan/regenerate", post(scans::regenerate))
        .route("/api/scans", get(scans::list))
        .route("/api/scans/{id}", get(scans::get_by_id))
        .route("/api/reports/{domain}/{scan_number}", get(scans::get_report))
        .route("/api/admin/scans/bulk-delete", post(admin::bulk_delete))
        .route("/api/admin/scans/reset-stuck", post(admin::reset_stuck))
        .route("/api/admin/workers/trigger", post(admin::trigger_worker))
        .route("/api/admin/jobs/cleanup", post(admin::cleanup_jobs))
}
