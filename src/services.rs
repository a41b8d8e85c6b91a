use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::file_store::FileStore;
use crate::notifier::Notifier;
use crate::AppState;

pub async fn init_db_pool(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", config.database_url);
    Ok(pool)
}

pub async fn init_file_store(config: &Config) -> std::io::Result<FileStore> {
    let store = FileStore::new(&config.uploads_dir);
    store.ensure_root().await?;
    Ok(store)
}

/// Builds the shared state handed to every worker.
pub async fn init_app_state(
    config: Config,
    notifier: Arc<dyn Notifier>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let db_pool = init_db_pool(&config).await?;
    let file_store = init_file_store(&config).await?;
    Ok(AppState {
        db_pool,
        file_store,
        config,
        notifier,
    })
}
