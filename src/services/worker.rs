//! Scan worker: claims jobs off the queue and runs the crawl, analyze,
//! score, persist pipeline for each one.
//!
//! One worker processes one job at a time. Between jobs it rate-limits;
//! when the queue is empty it polls. Worker identity is the OS process id,
//! which the monitor uses to signal a stuck worker.

use std::time::{Duration, Instant};

use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analyzers::{self, Analyzer};
use crate::config::AppConfig;
use crate::crawler::Crawler;
use crate::errors::AppError;
use crate::models::job::{Job, JobStatus, JOB_TYPE_SCAN};
use crate::models::scan::Scan;
use crate::services::{queue, scan, scoring};

pub struct ScanWorker {
    pool: PgPool,
    crawler: Box<dyn Crawler>,
    analyzers: Vec<Box<dyn Analyzer>>,
    worker_id: i64,
    poll_interval: Duration,
    rate_limit: Duration,
}

impl ScanWorker {
    pub fn new(
        pool: PgPool,
        crawler: Box<dyn Crawler>,
        config: &AppConfig,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self {
            pool,
            crawler,
            analyzers: analyzers::default_analyzers()?,
            worker_id: i64::from(std::process::id()),
            poll_interval: Duration::from_millis(config.worker_poll_interval_ms),
            rate_limit: Duration::from_millis(config.scan_rate_limit_ms),
        })
    }

    /// Process jobs forever. Queue errors are logged and retried after the
    /// poll interval rather than taking the worker down.
    pub async fn run(&self) {
        info!(worker_id = self.worker_id, "Worker started");
        loop {
            match self.process_next().await {
                Ok(true) => tokio::time::sleep(self.rate_limit).await,
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    error!(worker_id = self.worker_id, error = %e, "Worker iteration failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Drain the queue: process jobs until a claim comes back empty, then
    /// return how many were handled.
    pub async fn run_until_empty(&self) -> Result<u64, AppError> {
        let mut processed = 0u64;
        while self.process_next().await? {
            processed += 1;
            tokio::time::sleep(self.rate_limit).await;
        }
        info!(worker_id = self.worker_id, processed, "Queue drained");
        Ok(processed)
    }

    /// Claim and process one job. Returns false when the queue is empty.
    pub async fn process_next(&self) -> Result<bool, AppError> {
        let Some(job) = queue::claim(&self.pool, self.worker_id).await? else {
            return Ok(false);
        };

        if job.job_type != JOB_TYPE_SCAN {
            warn!(job_id = %job.id, job_type = %job.job_type, "Unknown job type");
            self.handle_failure(&job, None, &format!("Unknown job type '{}'", job.job_type))
                .await?;
            return Ok(true);
        }

        let payload = match job.scan_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Job payload undecodable");
                self.handle_failure(&job, None, &format!("Invalid job payload: {e}"))
                    .await?;
                return Ok(true);
            }
        };

        let Some(scan) = scan::begin_scanning(&self.pool, payload.scan_id, self.worker_id).await?
        else {
            // Scan removed or no longer claimable; the job has nothing
            // left to do.
            queue::complete(&self.pool, job.id).await?;
            return Ok(true);
        };

        match self.run_scan(&scan).await {
            Ok(()) => queue::complete(&self.pool, job.id).await?,
            Err(e) => {
                let message = e.to_string();
                warn!(
                    job_id = %job.id,
                    scan_id = %scan.id,
                    attempt = job.attempts,
                    error = %message,
                    "Scan attempt failed"
                );
                self.handle_failure(&job, Some(scan.id), &message).await?;
            }
        }
        Ok(true)
    }

    /// Crawl the target, run the analyzer pipeline, score, and persist the
    /// completed scan.
    async fn run_scan(&self, scan: &Scan) -> Result<(), AppError> {
        let total_start = Instant::now();
        info!(scan_id = %scan.id, url = %scan.url, "Processing scan");

        let crawl_start = Instant::now();
        let snapshot = self.crawler.fetch(&scan.url).await?;
        let crawl_ms = crawl_start.elapsed().as_millis() as u64;

        let analyze_start = Instant::now();
        let outcome = analyzers::run_pipeline(&self.analyzers, &snapshot);
        let analyze_ms = analyze_start.elapsed().as_millis() as u64;

        let score_start = Instant::now();
        let risk = scoring::compute(&outcome.findings);
        let trust = scoring::trust_report(&snapshot, &outcome.detections, &outcome.findings);
        let score_ms = score_start.elapsed().as_millis() as u64;

        let has_ai = trust.has_ai_implementation;
        let detected_tech = serde_json::to_value(&outcome.detections)
            .map_err(|e| AppError::Internal(format!("Failed to encode detections: {e}")))?;
        let findings = serde_json::to_value(&outcome.findings)
            .map_err(|e| AppError::Internal(format!("Failed to encode findings: {e}")))?;
        let metadata = serde_json::json!({
            "strategy": self.crawler.strategy(),
            "finalUrl": snapshot.final_url,
            "timings": {
                "crawlMs": crawl_ms,
                "analyzeMs": analyze_ms,
                "scoreMs": score_ms,
                "totalMs": total_start.elapsed().as_millis() as u64,
            },
            "score": risk,
            "trustReport": trust,
            "analyzerFailures": outcome.failures,
        });

        scan::complete_scan(
            &self.pool,
            scan.id,
            &risk,
            has_ai,
            &detected_tech,
            &findings,
            &metadata,
        )
        .await?;
        Ok(())
    }

    /// Record a failed attempt on the job, then settle the scan: released
    /// back to PENDING while retries remain, FAILED once they are spent.
    async fn handle_failure(
        &self,
        job: &Job,
        scan_id: Option<Uuid>,
        message: &str,
    ) -> Result<(), AppError> {
        let failed_job = queue::fail(&self.pool, job.id, message).await?;
        let Some(scan_id) = scan_id else {
            return Ok(());
        };

        match failed_job {
            Some(job) if job.status == JobStatus::Failed => {
                scan::mark_failed(&self.pool, scan_id, message).await?;
            }
            Some(_) => {
                scan::release_for_retry(&self.pool, scan_id, message).await?;
            }
            // Job deleted along with its scan; nothing left to settle.
            None => {}
        }
        Ok(())
    }
}
