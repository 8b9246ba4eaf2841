//! Durable FIFO job queue over Postgres.
//!
//! Claiming is a single atomic UPDATE guarded by `FOR UPDATE SKIP LOCKED`,
//! so any number of worker processes can poll the same table and no two of
//! them ever receive the same job. There is no priority ordering beyond
//! best-effort oldest-first.

use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{Job, JobStatus};

/// Insert a new PENDING job.
///
/// Unless `force` is set, an existing PENDING/PROCESSING job carrying the
/// same scanId in its payload is returned instead of inserting a duplicate.
pub async fn enqueue(
    pool: &PgPool,
    job_type: &str,
    payload: serde_json::Value,
    max_attempts: i32,
    force: bool,
) -> Result<Job, AppError> {
    if !force {
        if let Some(scan_id) = payload.get("scanId").and_then(|v| v.as_str()) {
            let existing = sqlx::query_as::<_, Job>(
                "SELECT * FROM jobs \
                 WHERE job_type = $1 AND payload->>'scanId' = $2 \
                 AND status IN ('PENDING', 'PROCESSING') \
                 ORDER BY created_at LIMIT 1",
            )
            .bind(job_type)
            .bind(scan_id)
            .fetch_optional(pool)
            .await?;

            if let Some(job) = existing {
                debug!(job_id = %job.id, scan_id, "Duplicate job suppressed");
                return Ok(job);
            }
        }
    }

    let job = sqlx::query_as::<_, Job>(
        "INSERT INTO jobs (job_type, payload, max_attempts) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(job_type)
    .bind(&payload)
    .bind(max_attempts)
    .fetch_one(pool)
    .await?;

    info!(job_id = %job.id, job_type, "Job enqueued");
    Ok(job)
}

/// Atomically claim the oldest claimable PENDING job, or None when the
/// queue is empty. Increments the attempt counter as part of the claim so
/// a crashed worker burns one attempt rather than looping forever.
pub async fn claim(pool: &PgPool, worker_id: i64) -> Result<Option<Job>, AppError> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'PROCESSING', attempts = attempts + 1, started_at = NOW()
        WHERE id = (
            SELECT id FROM jobs
            WHERE status = 'PENDING' AND attempts < max_attempts
            ORDER BY created_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING *
        "#,
    )
    .fetch_optional(pool)
    .await?;

    if let Some(ref job) = job {
        debug!(job_id = %job.id, worker_id, attempt = job.attempts, "Job claimed");
    }
    Ok(job)
}

/// Mark a PROCESSING job COMPLETED. A vanished job is not an error: the
/// monitor deletes jobs together with their scan, possibly mid-flight.
pub async fn complete(pool: &PgPool, job_id: Uuid) -> Result<(), AppError> {
    let result =
        sqlx::query("UPDATE jobs SET status = 'COMPLETED', completed_at = NOW() WHERE id = $1")
            .bind(job_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        debug!(job_id = %job_id, "Completed job no longer exists");
    }
    Ok(())
}

/// Record a processing failure. Jobs with attempts left revert to PENDING
/// for another worker to retry; exhausted jobs become FAILED terminally.
/// Returns the updated job so the caller can tell which of the two
/// happened, or None when the job has been deleted underneath us.
pub async fn fail(pool: &PgPool, job_id: Uuid, error: &str) -> Result<Option<Job>, AppError> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = CASE WHEN attempts >= max_attempts
                          THEN 'FAILED'::job_status
                          ELSE 'PENDING'::job_status END,
            completed_at = CASE WHEN attempts >= max_attempts THEN NOW() END,
            error = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(error)
    .fetch_optional(pool)
    .await?;

    match &job {
        Some(j) if j.status == JobStatus::Failed => {
            info!(job_id = %job_id, attempts = j.attempts, error, "Job failed permanently");
        }
        Some(j) => {
            info!(
                job_id = %job_id,
                attempts = j.attempts,
                max_attempts = j.max_attempts,
                error,
                "Job failed, will retry"
            );
        }
        None => debug!(job_id = %job_id, "Failed job no longer exists"),
    }
    Ok(job)
}

/// Delete COMPLETED/FAILED jobs finished more than `older_than_days` ago.
pub async fn cleanup(pool: &PgPool, older_than_days: i32) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM jobs \
         WHERE status IN ('COMPLETED', 'FAILED') \
         AND completed_at < NOW() - make_interval(days => $1)",
    )
    .bind(older_than_days)
    .execute(pool)
    .await?;

    info!(
        deleted = result.rows_affected(),
        older_than_days, "Cleaned up finished jobs"
    );
    Ok(result.rows_affected())
}

/// Number of PENDING jobs waiting for a worker.
pub async fn pending_count(pool: &PgPool) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE status = 'PENDING'")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
