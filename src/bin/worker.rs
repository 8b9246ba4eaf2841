//! Scan worker process. Claims queued jobs and runs the scan pipeline.
//!
//! `worker --once` drains the queue and exits; without the flag it runs
//! until signalled.

use std::time::Duration;

use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trustscan::config::AppConfig;
use trustscan::crawler::HttpCrawler;
use trustscan::db;
use trustscan::services::worker::ScanWorker;

// Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trustscan=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let once = std::env::args().any(|arg| arg == "--once");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(&pool).await?;

    let crawler = HttpCrawler::new(Duration::from_secs(config.crawl_timeout_secs))?;
    let worker = ScanWorker::new(pool, Box::new(crawler), &config)?;

    if once {
        worker.run_until_empty().await?;
        return Ok(());
    }

    tokio::select! {
        _ = worker.run() => {}
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, stopping worker");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
