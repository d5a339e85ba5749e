//! API Router configuration

use axum::{
  routing::{get, post},
  Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
  let api_routes = Router::new()
    // Scheduler trigger
    .route(
      "/cron/daily-penalties",
      get(handlers::daily_penalties).post(handlers::daily_penalties),
    )
    // Member penalties
    .route("/penalties", get(handlers::list_penalties))
    .route("/penalties/check", post(handlers::check_penalty))
    .route("/penalties/:id/accept", post(handlers::accept_penalty))
    .route("/penalties/:id/dispute", post(handlers::dispute_penalty));

  Router::new()
    .route("/health", get(handlers::health_check))
    .nest("/api", api_routes)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
