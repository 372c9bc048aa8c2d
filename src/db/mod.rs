pub(crate) mod models;
pub(crate) mod types;

use std::time::Duration;

use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

use crate::core::config::Settings;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const SLOW_STATEMENT: Duration = Duration::from_millis(500);

/// Opens the pool and applies pending migrations before the server binds.
pub(crate) async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database = settings.database();
    let options = database
        .database_url()
        .parse::<PgConnectOptions>()
        .context("DATABASE_URL is not a valid PostgreSQL URL")?
        .application_name("refuerzo-rust")
        .log_statements(tracing::log::LevelFilter::Off)
        .log_slow_statements(tracing::log::LevelFilter::Warn, SLOW_STATEMENT);

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .context("Failed to connect to PostgreSQL")?;

    MIGRATOR.run(&pool).await.context("Failed to apply database migrations")?;
    tracing::info!(
        max_connections = database.max_connections,
        migrations = MIGRATOR.iter().count(),
        "Database ready"
    );

    Ok(pool)
}
