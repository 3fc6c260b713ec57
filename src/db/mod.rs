pub mod models;
pub mod retry;
pub mod writer;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool};
use tracing::{info, warn};

use crate::config::DatabaseConfig;

use self::retry::{FixedInterval, RetryPolicy};

/// Blocks until the store accepts a connection, retrying at the configured
/// constant interval. Never fails.
pub async fn acquire(config: &DatabaseConfig) -> PgPool {
    acquire_with(config, &mut FixedInterval::new(config.retry_delay)).await
}

/// Same as [`acquire`] with a caller-supplied retry policy.
///
/// Each attempt is a single direct connection, so the policy alone decides
/// the spacing between attempts. The pool is only built once the store has
/// answered. It holds a single connection; each write checks it out for one
/// transaction, and a connection that fails the liveness ping on checkout is
/// dropped and reopened.
pub async fn acquire_with(config: &DatabaseConfig, policy: &mut impl RetryPolicy) -> PgPool {
    let options = config.connect_options();
    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        "Connecting to database"
    );

    let conn = retry::retry(policy, "database", || connect_once(&options)).await;
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close initial connection");
    }

    info!("Successfully connected to database");
    PgPoolOptions::new()
        .max_connections(1)
        .test_before_acquire(true)
        .connect_lazy_with(options)
}

/// One connection attempt, without the pool's internal backoff.
async fn connect_once(options: &PgConnectOptions) -> Result<PgConnection, sqlx::Error> {
    PgConnection::connect_with(options).await
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
