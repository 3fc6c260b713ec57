mod config;
mod db;
mod errors;
mod ingest;
mod mqtt;
mod normalize;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::Config,
    db::writer::PersistenceWriter,
    ingest::IngestService,
    mqtt::BusListener,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing, defaulting to info when RUST_LOG is unset
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    // Blocks until the store is reachable
    let pool = db::acquire(&config.database).await;

    let result = run(&config, pool.clone()).await;
    if let Err(e) = &result {
        error!(error = ?e, "Error occurred");
    }

    pool.close().await;
    info!("Database connection closed");
    result
}

async fn run(config: &Config, pool: sqlx::PgPool) -> Result<()> {
    if config.database.run_migrations {
        db::run_migrations(&pool)
            .await
            .context("failed to apply database migrations")?;
        info!("Database ready");
    }

    let ingest = IngestService::new(PersistenceWriter::new(pool));
    BusListener::new(&config.mqtt, ingest)
        .run(shutdown_signal())
        .await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
