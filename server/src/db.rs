use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::DatabaseConfig;

pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Opens the pool with a per-session statement timeout so a stuck lock wait surfaces as an
/// error instead of holding the transaction open.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let timeout_ms = config.statement_timeout.as_millis().to_string();
    let options = PgConnectOptions::from_str(&config.url)?
        .options([("statement_timeout", timeout_ms.as_str())]);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
}
