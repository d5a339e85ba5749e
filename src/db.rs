use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::AppConfig;
use crate::error::EngineResult;

pub type DbPool = SqlitePool;

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(config: &AppConfig) -> EngineResult<DbPool> {
  let options = SqliteConnectOptions::from_str(&config.database_url)?
    .create_if_missing(true)
    .foreign_keys(true);

  tracing::info!(url = %config.database_url, "Initializing database");

  // Create connection pool
  let pool = SqlitePoolOptions::new()
    .max_connections(config.db_max_connections)
    .connect_with(options)
    .await?;

  // Run migrations
  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("Database initialized successfully");

  Ok(pool)
}
