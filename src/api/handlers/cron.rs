//! Scheduled trigger for the daily sweep

use axum::{extract::State, Json};
use chrono::Utc;

use crate::api::auth::CronAuth;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::orchestrator::{run_daily_sweep, sweep_date, SweepSummary};

/// Run the sweep for yesterday (UTC)
pub async fn daily_penalties(
  State(state): State<AppState>,
  _auth: CronAuth,
) -> ApiResult<Json<SweepSummary>> {
  let now = Utc::now();
  let date = sweep_date(now);

  let summary = run_daily_sweep(&state.engine, date, now).await?;
  tracing::info!(
    %date,
    groups = summary.groups_processed,
    auto_accepted = summary.auto_accepted.accepted,
    errors = summary.errors.len(),
    "Daily penalty sweep finished"
  );

  Ok(Json(summary))
}
