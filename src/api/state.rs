//! Shared application state for API handlers

use crate::orchestrator::EngineContext;

#[derive(Clone)]
pub struct AppState {
  pub engine: EngineContext,
  /// Secret the scheduler presents as a bearer token
  pub cron_secret: String,
  pub version: String,
}

impl AppState {
  pub fn new(engine: EngineContext, cron_secret: impl Into<String>) -> Self {
    Self {
      engine,
      cron_secret: cron_secret.into(),
      version: env!("CARGO_PKG_VERSION").to_string(),
    }
  }
}
