//! Commitment engine
//!
//! Daily point targets, recovery/rest exceptions, penalty creation and the
//! penalty ledger for group fitness accountability. The library exposes the
//! engine modules and an axum server wrapping them.

pub mod api;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod flex_rest;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod points;
pub mod store;
pub mod target;

#[cfg(test)]
pub(crate) mod test_utils;

use std::sync::Arc;

use tokio::net::TcpListener;

use api::{create_router, AppState};
use config::AppConfig;
use notify::{DisabledNotifier, PushNotifier, WebhookNotifier};
use orchestrator::EngineContext;

/// Open the database, build the router and serve until Ctrl+C / SIGTERM
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
  let pool = db::initialize_db(&config).await?;

  let notifier: Arc<dyn PushNotifier> = match &config.push_webhook_url {
    Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
    None => {
      tracing::warn!("PUSH_WEBHOOK_URL not set, push notifications disabled");
      Arc::new(DisabledNotifier)
    }
  };

  let engine = EngineContext {
    db: pool.clone(),
    notifier,
    app_base_url: config.app_base_url.clone(),
  };
  let app = create_router(AppState::new(engine, config.cron_secret.clone()));

  let listener = TcpListener::bind(config.listen_addr).await?;
  tracing::info!("Commitment engine listening on {}", config.listen_addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  tracing::info!("Commitment engine shutting down");
  pool.close().await;

  Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "Failed to install Ctrl+C handler");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "Failed to install signal handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {
      tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    }
    _ = terminate => {
      tracing::info!("Received terminate signal, initiating graceful shutdown");
    }
  }
}
