use std::sync::Arc;

pub mod accounts;
pub mod auth;
pub mod comments;
pub mod config;
pub mod error;
pub mod file_store;
pub mod handlers;
pub mod likes;
pub mod models;
pub mod notifier;
pub mod services;
pub mod videos;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::file_store::FileStore;
use crate::notifier::Notifier;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub file_store: FileStore,
    pub config: Config,
    pub notifier: Arc<dyn Notifier>,
}
