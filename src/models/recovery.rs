use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::points::RECOVERY_DAY_TARGET_MINUTES;

/// A member's opt-in recovery day. At most one per (user, week).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecoveryDayActivation {
  pub id: i64,
  pub user_id: i64,
  pub used_date: NaiveDate,
  pub week_start_date: NaiveDate,
  pub recovery_minutes: i64,
  pub is_complete: bool,
}

impl RecoveryDayActivation {
  /// Complete when flagged so, or once enough minutes have accrued
  pub fn is_done(&self) -> bool {
    self.is_complete || self.recovery_minutes >= RECOVERY_DAY_TARGET_MINUTES
  }
}

/// Date-keyed sick exemption, independent of the member's current flag
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SickRecord {
  pub user_id: i64,
  pub date: NaiveDate,
}
