//! Bearer-token extractors for the scheduler secret and member sessions

use axum::{
  async_trait,
  extract::FromRequestParts,
  http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;

use super::error::ApiError;
use super::state::AppState;
use crate::models::Member;
use crate::store;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|token| !token.is_empty())
}

/// Compare without short-circuiting on the first differing byte
fn secrets_match(given: &str, expected: &str) -> bool {
  given.len() == expected.len()
    && given
      .bytes()
      .zip(expected.bytes())
      .fold(0u8, |acc, (a, b)| acc | (a ^ b))
      == 0
}

/// Proof that the request carries the scheduler secret
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

#[async_trait]
impl FromRequestParts<AppState> for CronAuth {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
    match bearer_token(&parts.headers) {
      Some(token) if secrets_match(token, &state.cron_secret) => Ok(CronAuth),
      Some(_) => {
        tracing::warn!("Rejected scheduler trigger with wrong secret");
        Err(ApiError::Unauthorized("invalid scheduler secret".into()))
      }
      None => Err(ApiError::Unauthorized("missing scheduler secret".into())),
    }
  }
}

/// The member owning the request's session token
#[derive(Debug, Clone)]
pub struct CurrentMember(pub Member);

#[async_trait]
impl FromRequestParts<AppState> for CurrentMember {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)
      .ok_or_else(|| ApiError::Unauthorized("missing session token".into()))?;

    store::load_member_by_session(&state.engine.db, token, Utc::now())
      .await?
      .map(CurrentMember)
      .ok_or_else(|| ApiError::Unauthorized("invalid or expired session".into()))
  }
}
