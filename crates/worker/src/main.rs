use std::sync::Arc;
use std::time::Duration;

use lipsync_cache::RedisFastStore;
use lipsync_db::PgJobStore;
use lipsync_events::NotificationHub;
use lipsync_generation::{FalConfig, FalGenerationTask};
use lipsync_pipeline::{JobQueue, QueueConfig};
use lipsync_worker::{init_tracing, log_events, WorkerConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = WorkerConfig::from_env().expect("Invalid worker configuration");
    init_tracing(config.log_format);

    let queue_config = QueueConfig::from_env().expect("Invalid queue configuration");
    let fal_config = FalConfig::from_env().expect("Invalid fal configuration");
    tracing::info!(
        model = %fal_config.model,
        stale_after_secs = queue_config.stale_after.as_secs(),
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = lipsync_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    lipsync_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    lipsync_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Redis ---
    let fast = RedisFastStore::connect(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");
    fast.health_check().await.expect("Redis health check failed");
    tracing::info!("Redis connection established");

    // --- Queue ---
    let hub = Arc::new(NotificationHub::default());
    let queue = JobQueue::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::new(fast),
        hub.clone(),
        Arc::new(FalGenerationTask::from_config(&fal_config)),
        queue_config,
    );

    let cancel = CancellationToken::new();
    let events_handle = tokio::spawn(log_events(hub.subscribe_all(), cancel.clone()));
    let sweeper_handle = queue.start_sweeper(cancel.clone());
    let worker_handle = queue.start_worker(cancel.clone());
    tracing::info!("Worker running");

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    let drain = async {
        for handle in [worker_handle, sweeper_handle].into_iter().flatten() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background task ended abnormally");
            }
        }
    };
    if tokio::time::timeout(config.shutdown_timeout, drain)
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout.as_secs(),
            "Shutdown timed out with a job in progress, leaving it to the recovery sweeper"
        );
    }

    hub.shutdown_all();
    let _ = tokio::time::timeout(Duration::from_secs(5), events_handle).await;
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
