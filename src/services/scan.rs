//! Scan lifecycle: submission, lookup, and the persisted state machine.
//!
//! Every status change is a conditional UPDATE (`WHERE status = $expected`),
//! so an illegal transition can never be written, only observed and
//! reported. A scan deleted by the monitor mid-flight is not an error for
//! the worker that was processing it.

use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{ScanJobPayload, JOB_TYPE_SCAN};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::scan::{Scan, ScanCreated, ScanStatus, ScanSummary};
use crate::services::scoring::RiskScore;
use crate::services::{queue, validation};

/// Create a scan for a submitted URL and enqueue its job.
///
/// The target is normalized and DNS-validated first; a rejected domain
/// never reaches the queue. Unless `regenerate` is set, an in-flight scan
/// (PENDING or SCANNING) for the same domain is returned instead of
/// creating a duplicate.
pub async fn create_scan(
    pool: &PgPool,
    raw_url: &str,
    regenerate: bool,
    job_max_attempts: i32,
) -> Result<ScanCreated, AppError> {
    let target = validation::normalize_url(raw_url)?;
    validation::validate_domain(&target.domain).await?;

    if !regenerate {
        let existing = sqlx::query_as::<_, Scan>(
            "SELECT * FROM scans \
             WHERE domain = $1 AND status IN ('PENDING', 'SCANNING') \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&target.domain)
        .fetch_optional(pool)
        .await?;

        if let Some(scan) = existing {
            info!(
                scan_id = %scan.id,
                domain = %scan.domain,
                status = ?scan.status,
                "Returning in-flight scan for duplicate submission"
            );
            return Ok(ScanCreated {
                scan_id: scan.id,
                scan_number: scan.scan_number,
                domain: scan.domain,
            });
        }
    }

    // scan_number is assigned inside the insert so it stays monotonic per
    // domain; a concurrent submitter can still collide on the unique index,
    // in which case the subselect is simply re-run.
    let mut attempt = 0;
    let scan = loop {
        attempt += 1;
        let inserted = sqlx::query_as::<_, Scan>(
            "INSERT INTO scans (url, domain, scan_number) \
             VALUES ($1, $2, (SELECT COALESCE(MAX(scan_number), 0) + 1 FROM scans WHERE domain = $2)) \
             RETURNING *",
        )
        .bind(&target.url)
        .bind(&target.domain)
        .fetch_one(pool)
        .await;

        match inserted {
            Ok(scan) => break scan,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() && attempt < 3 => {
                debug!(domain = %target.domain, attempt, "Scan number collision, retrying");
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AppError::Conflict(format!(
                    "Could not allocate a scan number for '{}'",
                    target.domain
                )));
            }
            Err(e) => return Err(e.into()),
        }
    };

    let payload = serde_json::to_value(ScanJobPayload {
        scan_id: scan.id,
        url: scan.url.clone(),
        domain: scan.domain.clone(),
    })
    .map_err(|e| AppError::Internal(format!("Failed to encode job payload: {e}")))?;

    queue::enqueue(pool, JOB_TYPE_SCAN, payload, job_max_attempts, regenerate).await?;

    info!(
        scan_id = %scan.id,
        scan_number = scan.scan_number,
        domain = %scan.domain,
        regenerate,
        "Scan created and queued"
    );

    Ok(ScanCreated {
        scan_id: scan.id,
        scan_number: scan.scan_number,
        domain: scan.domain,
    })
}

/// Fetch a scan by id.
pub async fn get_scan(pool: &PgPool, id: Uuid) -> Result<Scan, AppError> {
    sqlx::query_as::<_, Scan>("SELECT * FROM scans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Scan not found".to_string()))
}

/// Fetch a scan by domain and per-domain scan number.
///
/// Report URLs carry the domain as a slug (`example-com`); a segment
/// without a dot is converted back before lookup.
pub async fn get_scan_by_domain(
    pool: &PgPool,
    domain: &str,
    scan_number: i32,
) -> Result<Scan, AppError> {
    let domain = if domain.contains('.') {
        domain.to_ascii_lowercase()
    } else {
        domain.to_ascii_lowercase().replace('-', ".")
    };

    sqlx::query_as::<_, Scan>("SELECT * FROM scans WHERE domain = $1 AND scan_number = $2")
        .bind(&domain)
        .bind(scan_number)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Scan not found".to_string()))
}

/// List scan summaries, optionally filtered by status, newest first.
pub async fn list_scans(
    pool: &PgPool,
    status: Option<ScanStatus>,
    pagination: &Pagination,
) -> Result<PagedResult<ScanSummary>, AppError> {
    let where_clause = if status.is_some() {
        "WHERE status = $1"
    } else {
        ""
    };

    let count_sql = format!("SELECT COUNT(*) FROM scans {where_clause}");
    let data_sql = format!(
        "SELECT id, url, domain, scan_number, status, risk_score, risk_level, has_ai, \
                created_at, completed_at \
         FROM scans {where_clause} ORDER BY created_at DESC LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, ScanSummary>(&data_sql);
    if let Some(ref status) = status {
        count_query = count_query.bind(status);
        data_query = data_query.bind(status);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query.fetch_all(pool).await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Atomically move a PENDING scan to SCANNING, recording the worker's PID
/// and start time. Returns None when the scan has been removed or already
/// left PENDING; the caller should drop the job and move on either way.
pub async fn begin_scanning(
    pool: &PgPool,
    scan_id: Uuid,
    worker_id: i64,
) -> Result<Option<Scan>, AppError> {
    let scan = sqlx::query_as::<_, Scan>(
        "UPDATE scans \
         SET status = 'SCANNING', started_at = NOW(), worker_id = $2 \
         WHERE id = $1 AND status = 'PENDING' \
         RETURNING *",
    )
    .bind(scan_id)
    .bind(worker_id)
    .fetch_optional(pool)
    .await?;

    if scan.is_none() {
        match current_status(pool, scan_id).await? {
            None => debug!(scan_id = %scan_id, "Scan removed before claim"),
            Some(status) => {
                warn!(scan_id = %scan_id, status = ?status, "Scan not claimable, skipping")
            }
        }
    }
    Ok(scan)
}

/// Persist a successful scan: score, detections, findings, and timing
/// metadata. Returns false when the scan was deleted mid-flight.
pub async fn complete_scan(
    pool: &PgPool,
    scan_id: Uuid,
    risk: &RiskScore,
    has_ai: bool,
    detected_tech: &serde_json::Value,
    findings: &serde_json::Value,
    metadata: &serde_json::Value,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE scans \
         SET status = 'COMPLETED', risk_score = $2, risk_level = $3, has_ai = $4, \
             detected_tech = $5, findings = $6, metadata = $7, \
             worker_id = NULL, completed_at = NOW() \
         WHERE id = $1 AND status = 'SCANNING'",
    )
    .bind(scan_id)
    .bind(risk.score)
    .bind(risk.level)
    .bind(has_ai)
    .bind(detected_tech)
    .bind(findings)
    .bind(metadata)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match current_status(pool, scan_id).await? {
            None => {
                debug!(scan_id = %scan_id, "Scan removed before completion");
                Ok(false)
            }
            Some(status) => Err(AppError::InvalidTransition(format!(
                "Cannot complete scan {scan_id} in status {status:?}"
            ))),
        };
    }

    info!(scan_id = %scan_id, score = risk.score, level = ?risk.level, "Scan completed");
    Ok(true)
}

/// Persist a terminal failure: the error lands in metadata, the worker
/// binding is cleared. Returns false when the scan was deleted mid-flight.
pub async fn mark_failed(pool: &PgPool, scan_id: Uuid, error: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE scans \
         SET status = 'FAILED', metadata = jsonb_build_object('error', $2::text), \
             worker_id = NULL, completed_at = NOW() \
         WHERE id = $1 AND status = 'SCANNING'",
    )
    .bind(scan_id)
    .bind(error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match current_status(pool, scan_id).await? {
            None => {
                debug!(scan_id = %scan_id, "Scan removed before failure could be recorded");
                Ok(false)
            }
            Some(status) => Err(AppError::InvalidTransition(format!(
                "Cannot fail scan {scan_id} in status {status:?}"
            ))),
        };
    }

    info!(scan_id = %scan_id, error, "Scan failed");
    Ok(true)
}

/// Release a SCANNING scan back to PENDING so the retried job can claim it
/// again. The failed attempt's error is noted in metadata.
pub async fn release_for_retry(
    pool: &PgPool,
    scan_id: Uuid,
    error: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE scans \
         SET status = 'PENDING', metadata = jsonb_build_object('error', $2::text), \
             worker_id = NULL, started_at = NULL \
         WHERE id = $1 AND status = 'SCANNING'",
    )
    .bind(scan_id)
    .bind(error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match current_status(pool, scan_id).await? {
            None => {
                debug!(scan_id = %scan_id, "Scan removed before retry release");
                Ok(false)
            }
            Some(status) => Err(AppError::InvalidTransition(format!(
                "Cannot release scan {scan_id} in status {status:?}"
            ))),
        };
    }

    info!(scan_id = %scan_id, error, "Scan released back to queue for retry");
    Ok(true)
}

async fn current_status(pool: &PgPool, scan_id: Uuid) -> Result<Option<ScanStatus>, AppError> {
    let status = sqlx::query_scalar::<_, ScanStatus>("SELECT status FROM scans WHERE id = $1")
        .bind(scan_id)
        .fetch_optional(pool)
        .await?;
    Ok(status)
}
