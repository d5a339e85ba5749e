//! Runtime configuration read from the environment (and `.env` via dotenvy)

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite://commitment-engine.db?mode=rwc";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_APP_BASE_URL: &str = "/";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
  #[error("Missing required configuration: {0}")]
  MissingConfig(String),

  #[error("Invalid value for {name}: {reason}")]
  Invalid { name: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub database_url: String,
  pub listen_addr: SocketAddr,
  /// Bearer secret the scheduler must present on the cron endpoint
  pub cron_secret: String,
  /// Push relay; notifications are disabled when unset
  pub push_webhook_url: Option<Url>,
  pub app_base_url: String,
  pub db_max_connections: u32,
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let cron_secret = env::var("CRON_SECRET")
      .ok()
      .filter(|s| !s.trim().is_empty())
      .ok_or_else(|| ConfigError::MissingConfig("CRON_SECRET".into()))?;

    let listen_addr = var_or("LISTEN_ADDR", DEFAULT_LISTEN_ADDR)
      .parse()
      .map_err(|e| invalid("LISTEN_ADDR", e))?;

    let push_webhook_url = match env::var("PUSH_WEBHOOK_URL") {
      Ok(raw) if !raw.trim().is_empty() => {
        Some(Url::parse(raw.trim()).map_err(|e| invalid("PUSH_WEBHOOK_URL", e))?)
      }
      _ => None,
    };

    let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
      Ok(raw) => raw
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| invalid("DB_MAX_CONNECTIONS", "expected a positive integer"))?,
      Err(_) => DEFAULT_DB_MAX_CONNECTIONS,
    };

    Ok(Self {
      database_url: var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
      listen_addr,
      cron_secret,
      push_webhook_url,
      app_base_url: var_or("APP_BASE_URL", DEFAULT_APP_BASE_URL),
      db_max_connections,
    })
  }
}

fn var_or(name: &str, default: &str) -> String {
  env::var(name)
    .ok()
    .filter(|v| !v.trim().is_empty())
    .unwrap_or_else(|| default.to_string())
}

fn invalid(name: &str, reason: impl std::fmt::Display) -> ConfigError {
  ConfigError::Invalid {
    name: name.to_string(),
    reason: reason.to_string(),
  }
}
