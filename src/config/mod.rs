use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Sleep between claim attempts when the queue is empty.
    pub worker_poll_interval_ms: u64,
    /// Delay between consecutive jobs in one worker.
    pub scan_rate_limit_ms: u64,
    /// Wall-clock deadline per scan, enforced by the monitor.
    pub max_scan_time_secs: i64,
    /// Watchdog tick interval.
    pub monitor_interval_secs: u64,
    /// Gap between SIGTERM and SIGKILL when reclaiming a stuck worker.
    pub kill_grace_secs: u64,
    /// PENDING scans never claimed within this window are orphaned.
    pub orphan_grace_secs: i64,
    pub job_max_attempts: i32,
    /// Per-request HTTP timeout inside the crawler.
    pub crawl_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            worker_poll_interval_ms: env::var("WORKER_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            scan_rate_limit_ms: env::var("SCAN_RATE_LIMIT_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            max_scan_time_secs: env::var("MAX_SCAN_TIME_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            monitor_interval_secs: env::var("MONITOR_INTERVAL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            kill_grace_secs: env::var("KILL_GRACE_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            orphan_grace_secs: env::var("ORPHAN_GRACE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            job_max_attempts: env::var("JOB_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            crawl_timeout_secs: env::var("CRAWL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}
