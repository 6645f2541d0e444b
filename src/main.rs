//! JeanPay API server - main entry point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Install logging and the Prometheus recorder
//! 3. Create the database pool and run migrations
//! 4. Start the job server on the configured broker
//! 5. Build the HTTP router and serve until SIGINT/SIGTERM
//!
//! # Shutdown
//!
//! On the signal the job server is cancelled and starts draining within
//! `QUEUE_SHUTDOWN_TIMEOUT` while the listener stops accepting and in-flight
//! requests finish.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use jeanpay::{
    adapters::{email::build_email_sender, payment::PaystackClient, upload::LocalUploader},
    build_job_server, build_router,
    config::{Config, QueueBackend},
    db,
    jobs::{
        broker::{Broker, MemoryBroker, PgBroker},
        server::cancel_on,
    },
    logging,
    middleware::metrics::init_metrics,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    logging::init_logging(config.log_format());
    config.validate().map_err(anyhow::Error::msg)?;
    tracing::info!(config = ?config, "Configuration loaded");

    init_metrics()?;

    let pool = db::create_pool(&config.database_url(), config.db_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let broker: Arc<dyn Broker> = match config.queue_backend() {
        QueueBackend::Postgres => Arc::new(PgBroker::new(pool.clone())),
        QueueBackend::Memory => {
            tracing::warn!("Using the in-memory job broker; queued tasks are lost on restart");
            Arc::new(MemoryBroker::new())
        }
    };

    let email = build_email_sender(&config)?;
    let payments = Arc::new(PaystackClient::new(
        &config.paystack_base_url,
        &config.paystack_secret_key,
    )?);
    let uploader = Arc::new(LocalUploader::new(&config.upload_dir, &config.server_url));
    let port = config.port;

    let state = AppState::new(config, pool, broker.clone(), payments, uploader);

    let shutdown = CancellationToken::new();
    let job_server = build_job_server(&state, broker, email);
    let jobs = tokio::spawn(job_server.run(shutdown.clone()));

    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel_on(shutdown_signal(), shutdown.clone()))
        .await?;

    tracing::info!("HTTP server stopped, waiting for the job queue to drain");
    if let Err(e) = jobs.await {
        tracing::error!(error = %e, "Job server task failed");
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
