//! Health handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
  pub status: String,
  pub version: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
  Json(HealthCheckResponse {
    status: "healthy".to_string(),
    version: state.version.clone(),
  })
}
