pub mod fixtures;
pub mod models;
pub mod rewards;
pub mod wagers;

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::Config;
use crate::error::Result;

pub use fixtures::{FixtureStore, UpsertOutcome};
pub use rewards::{ClaimStore, RewardPolicyStore};
pub use wagers::WagerLedger;

/// Open (creating if missing) the SQLite database and apply embedded migrations.
pub async fn connect(cfg: &Config) -> Result<SqlitePool> {
    let timeout = Duration::from_secs(cfg.db_timeout_secs);
    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(timeout)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);
    Ok(pool)
}
