//! Orders service entry point.

use std::process::ExitCode;

use api::config::Config;
use api::supervisor::{Supervisor, SupervisorError};
use order_store::{InMemoryOrderStore, OrderStoreError, PostgresOrderStore};
use pipeline::SimulatedFulfillment;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to initialize tracing: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to run migrations: {0}")]
    Migration(#[from] OrderStoreError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    // 1. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 2. Bind before spawning anything so a busy port fails fast
    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(SupervisorError::Bind)?;
    tracing::info!(%addr, "starting orders service");

    // 3. Wire OS signals into the shared cancellation token
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    let processor = SimulatedFulfillment::new(config.worker_processing_delay);
    let supervisor = Supervisor::new(config.clone(), metrics_handle);

    // 4. Pick the store and run
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            let store = PostgresOrderStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL order store");
            supervisor.run(listener, store, processor, shutdown).await?;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory order store");
            supervisor
                .run(listener, InMemoryOrderStore::new(), processor, shutdown)
                .await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment alone is enough.
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let _tracer_provider = match api::telemetry::init(&config) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("{}", StartupError::from(e));
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => {
            tracing::info!("orders service shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "orders service terminated with error");
            ExitCode::FAILURE
        }
    }
}
