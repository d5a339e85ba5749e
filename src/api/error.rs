//! API errors and their HTTP mapping

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  pub detail: String,
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn detail(&self) -> &str {
    match self {
      ApiError::Unauthorized(d)
      | ApiError::BadRequest(d)
      | ApiError::NotFound(d)
      | ApiError::Conflict(d)
      | ApiError::Internal(d) => d,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "Request failed");
    }

    let body = ErrorResponse {
      error: status.canonical_reason().unwrap_or("Error").to_string(),
      detail: self.detail().to_string(),
    };

    (status, Json(body)).into_response()
  }
}

impl From<EngineError> for ApiError {
  fn from(err: EngineError) -> Self {
    match err {
      EngineError::MemberNotInGroup(_) | EngineError::DateInFuture(_) => ApiError::BadRequest(err.to_string()),
      EngineError::GroupNotFound(_) | EngineError::MemberNotFound(_) | EngineError::PenaltyNotFound(_) => {
        ApiError::NotFound(err.to_string())
      }
      EngineError::InvalidState { .. } => ApiError::Conflict(err.to_string()),
      // Stored data the engine cannot interpret is a server fault
      EngineError::InvalidData(_) | EngineError::Database(_) | EngineError::Migration(_) => {
        ApiError::Internal(err.to_string())
      }
    }
  }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
