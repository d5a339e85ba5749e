use chrono::NaiveDate;
use thiserror::Error;

use crate::models::PenaltyStatus;

// ---------------------------------------------------------------------------
// Engine Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration failed: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Group not found: {0}")]
  GroupNotFound(i64),

  #[error("Member not found: {0}")]
  MemberNotFound(i64),

  #[error("Member {0} is not in a group")]
  MemberNotInGroup(i64),

  #[error("Penalty not found: {0}")]
  PenaltyNotFound(i64),

  #[error("Penalty {id} is {status}, expected pending")]
  InvalidState { id: i64, status: PenaltyStatus },

  #[error("Cannot evaluate {0}: the day has not happened yet")]
  DateInFuture(NaiveDate),

  #[error("Invalid data: {0}")]
  InvalidData(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
