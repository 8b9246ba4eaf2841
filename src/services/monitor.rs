//! Stuck-scan watchdog: enforces the per-scan wall-clock deadline from
//! outside the worker process.
//!
//! A scan that overstays SCANNING gets its worker signalled (SIGTERM,
//! then SIGKILL after a grace period) and is deleted together with its
//! jobs. A timed-out scan is removed, not marked FAILED. PENDING scans
//! nobody ever claimed are swept on the same tick.

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::scan::Scan;

/// Counts from one watchdog pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickReport {
    pub stuck_removed: u64,
    pub orphans_removed: u64,
    pub jobs_removed: u64,
    pub workers_killed: u64,
}

pub struct StuckScanMonitor {
    pool: PgPool,
    interval: Duration,
    max_scan_time_secs: i64,
    kill_grace: Duration,
    orphan_grace_secs: i64,
}

impl StuckScanMonitor {
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        Self {
            pool,
            interval: Duration::from_secs(config.monitor_interval_secs),
            max_scan_time_secs: config.max_scan_time_secs,
            kill_grace: Duration::from_secs(config.kill_grace_secs),
            orphan_grace_secs: config.orphan_grace_secs,
        }
    }

    /// Tick forever. A failed pass is logged and retried on the next
    /// interval.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_scan_time_secs = self.max_scan_time_secs,
            "Monitor started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                error!(error = %e, "Monitor tick failed");
            }
        }
    }

    /// One watchdog pass: reclaim overdue SCANNING scans, then sweep
    /// orphaned PENDING ones. Age is measured from creation, so retries do
    /// not reset a scan's deadline.
    pub async fn tick(&self) -> Result<TickReport, AppError> {
        let mut report = TickReport::default();

        let stuck = sqlx::query_as::<_, Scan>(
            "SELECT * FROM scans \
             WHERE status = 'SCANNING' AND created_at < NOW() - make_interval(secs => $1)",
        )
        .bind(self.max_scan_time_secs as f64)
        .fetch_all(&self.pool)
        .await?;

        for scan in &stuck {
            warn!(
                scan_id = %scan.id,
                url = %scan.url,
                worker_id = scan.worker_id,
                "Scan exceeded deadline, reclaiming"
            );
            if let Some(worker_id) = scan.worker_id {
                if self.terminate_worker(worker_id).await {
                    report.workers_killed += 1;
                }
            }
            let (scans, jobs) = self.delete_scan_with_jobs(scan.id).await?;
            report.stuck_removed += scans;
            report.jobs_removed += jobs;
        }

        let orphaned = sqlx::query_as::<_, Scan>(
            "SELECT * FROM scans \
             WHERE status = 'PENDING' AND created_at < NOW() - make_interval(secs => $1)",
        )
        .bind(self.orphan_grace_secs as f64)
        .fetch_all(&self.pool)
        .await?;

        for scan in &orphaned {
            info!(scan_id = %scan.id, url = %scan.url, "Removing orphaned pending scan");
            let (scans, jobs) = self.delete_scan_with_jobs(scan.id).await?;
            report.orphans_removed += scans;
            report.jobs_removed += jobs;
        }

        info!(
            stuck = report.stuck_removed,
            orphans = report.orphans_removed,
            jobs = report.jobs_removed,
            workers_killed = report.workers_killed,
            "Monitor tick complete"
        );
        Ok(report)
    }

    /// SIGTERM the worker, give it the grace period, then SIGKILL if it is
    /// still around. A process that is already gone is not an error.
    async fn terminate_worker(&self, worker_id: i64) -> bool {
        let pid = Pid::from_raw(worker_id as i32);

        match kill(pid, Signal::SIGTERM) {
            Ok(()) => {}
            Err(Errno::ESRCH) => {
                debug!(worker_id, "Worker process already gone");
                return false;
            }
            Err(e) => {
                warn!(worker_id, error = %e, "Could not signal worker");
                return false;
            }
        }

        tokio::time::sleep(self.kill_grace).await;

        // Signal 0 probes for existence without delivering anything.
        if kill(pid, None).is_ok() {
            match kill(pid, Signal::SIGKILL) {
                Ok(()) => info!(worker_id, "Worker force-killed after grace period"),
                Err(e) => warn!(worker_id, error = %e, "SIGKILL failed"),
            }
        } else {
            info!(worker_id, "Worker exited after SIGTERM");
        }
        true
    }

    /// Remove a scan and every job referencing it. Zero affected rows just
    /// means someone else got there first.
    async fn delete_scan_with_jobs(&self, scan_id: Uuid) -> Result<(u64, u64), AppError> {
        let jobs = sqlx::query("DELETE FROM jobs WHERE payload->>'scanId' = $1")
            .bind(scan_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        let scans = sqlx::query("DELETE FROM scans WHERE id = $1")
            .bind(scan_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok((scans, jobs))
    }
}
