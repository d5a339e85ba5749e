//! Member-facing penalty handlers

use axum::{
  body::Bytes,
  extract::{Path, State},
  Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::api::auth::CurrentMember;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::ledger;
use crate::models::PendingPenalty;
use crate::orchestrator::{check_member, sweep_date, MemberCheck};

/// Optional body for the app-open check
#[derive(Debug, Default, Deserialize)]
pub struct CheckPenaltyRequest {
  /// `YYYY-MM-DD` in the member's local calendar; defaults to yesterday (UTC)
  #[serde(default)]
  pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DisputeRequest {
  pub reason: String,
}

fn parse_date(raw: &str) -> ApiResult<NaiveDate> {
  NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
    .map_err(|_| ApiError::BadRequest(format!("Invalid date {:?}, expected YYYY-MM-DD", raw)))
}

/// An empty body means "no date"; anything else must be a valid request
fn parse_check_request(body: &[u8]) -> ApiResult<CheckPenaltyRequest> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(CheckPenaltyRequest::default());
  }
  serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

/// Evaluate the calling member for one date, at most today (UTC)
pub async fn check_penalty(
  State(state): State<AppState>,
  CurrentMember(member): CurrentMember,
  body: Bytes,
) -> ApiResult<Json<MemberCheck>> {
  let now = Utc::now();
  let request = parse_check_request(&body)?;
  let date = match request.date.as_deref() {
    Some(raw) => parse_date(raw)?,
    None => sweep_date(now),
  };

  let check = check_member(&state.engine, member.id, date, now).await?;
  Ok(Json(check))
}

/// The caller's penalties, newest first
pub async fn list_penalties(
  State(state): State<AppState>,
  CurrentMember(member): CurrentMember,
) -> ApiResult<Json<Vec<PendingPenalty>>> {
  let penalties = ledger::list_member_penalties(&state.engine.db, member.id).await?;
  Ok(Json(penalties))
}

pub async fn accept_penalty(
  State(state): State<AppState>,
  CurrentMember(member): CurrentMember,
  Path(id): Path<i64>,
) -> ApiResult<Json<PendingPenalty>> {
  let penalty = ledger::accept_as_member(&state.engine.db, id, member.id, Utc::now()).await?;
  Ok(Json(penalty))
}

pub async fn dispute_penalty(
  State(state): State<AppState>,
  CurrentMember(member): CurrentMember,
  Path(id): Path<i64>,
  Json(request): Json<DisputeRequest>,
) -> ApiResult<Json<PendingPenalty>> {
  let reason = request.reason.trim();
  if reason.is_empty() {
    return Err(ApiError::BadRequest("Dispute reason is required".into()));
  }

  let penalty = ledger::dispute_penalty(&state.engine.db, id, member.id, reason, Utc::now()).await?;
  Ok(Json(penalty))
}
