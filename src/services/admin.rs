//! Manual recovery operations behind the /api/admin surface.

use std::process::Stdio;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::job::JobStatus;
use crate::models::scan::ScanStatus;
use crate::services::queue;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResult {
    pub deleted_scans: u64,
    pub deleted_jobs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetStuckResult {
    pub reset_scans: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResult {
    pub pending_jobs: i64,
    pub worker_pid: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub deleted: u64,
}

/// Delete every scan in the given status together with the matching jobs.
/// SCANNING scans pair with PROCESSING jobs; COMPLETED is refused, finished
/// reports are not bulk-deletable.
pub async fn bulk_delete(pool: &PgPool, status: ScanStatus) -> Result<BulkDeleteResult, AppError> {
    let job_status = match status {
        ScanStatus::Pending => JobStatus::Pending,
        ScanStatus::Scanning => JobStatus::Processing,
        ScanStatus::Failed => JobStatus::Failed,
        ScanStatus::Completed => {
            return Err(AppError::validation(
                "INVALID_STATUS",
                "Status must be PENDING, FAILED, or SCANNING",
            ));
        }
    };

    let deleted_jobs = sqlx::query("DELETE FROM jobs WHERE status = $1")
        .bind(job_status)
        .execute(pool)
        .await?
        .rows_affected();
    let deleted_scans = sqlx::query("DELETE FROM scans WHERE status = $1")
        .bind(status)
        .execute(pool)
        .await?
        .rows_affected();

    info!(status = ?status, deleted_scans, deleted_jobs, "Bulk delete complete");
    Ok(BulkDeleteResult {
        deleted_scans,
        deleted_jobs,
    })
}

/// Reset SCANNING scans older than the cutoff back to PENDING so workers
/// can retry them. Manual alternative to the monitor's kill-and-delete.
pub async fn reset_stuck(pool: &PgPool, older_than_secs: i64) -> Result<ResetStuckResult, AppError> {
    let reset_scans = sqlx::query(
        "UPDATE scans \
         SET status = 'PENDING', worker_id = NULL, started_at = NULL \
         WHERE status = 'SCANNING' AND created_at < NOW() - make_interval(secs => $1)",
    )
    .bind(older_than_secs as f64)
    .execute(pool)
    .await?
    .rows_affected();

    info!(reset_scans, older_than_secs, "Stuck scans reset to pending");
    Ok(ResetStuckResult { reset_scans })
}

/// Spawn one detached `worker --once` process when the queue has pending
/// jobs. The child inherits the server's environment and drains the queue
/// on its own; nothing waits for it here.
pub async fn trigger_worker(pool: &PgPool) -> Result<TriggerResult, AppError> {
    let pending_jobs = queue::pending_count(pool).await?;
    if pending_jobs == 0 {
        return Ok(TriggerResult {
            pending_jobs: 0,
            worker_pid: None,
        });
    }

    let exe = std::env::current_exe()
        .map_err(|e| AppError::Internal(format!("Cannot locate current executable: {e}")))?;
    let worker_bin = exe
        .parent()
        .map(|dir| dir.join("worker"))
        .ok_or_else(|| AppError::Internal("Cannot locate worker binary".to_string()))?;

    let child = tokio::process::Command::new(&worker_bin)
        .arg("--once")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| AppError::Internal(format!("Failed to spawn worker: {e}")))?;
    let worker_pid = child.id();
    // Dropping the handle leaves the child running; the runtime reaps it
    // when it exits.
    drop(child);

    info!(pending_jobs, worker_pid = ?worker_pid, "Worker spawned to drain queue");
    Ok(TriggerResult {
        pending_jobs,
        worker_pid,
    })
}

/// Purge finished jobs older than the retention window.
pub async fn cleanup_jobs(
    pool: &PgPool,
    older_than_days: Option<i32>,
) -> Result<CleanupResult, AppError> {
    let days = older_than_days.unwrap_or(7);
    if days < 0 {
        return Err(AppError::validation(
            "INVALID_DAYS",
            "olderThanDays must be non-negative",
        ));
    }

    let deleted = queue::cleanup(pool, days).await?;
    Ok(CleanupResult { deleted })
}
