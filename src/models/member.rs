use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-member display mode. Only affects long-term target growth;
/// penalty evaluation always runs in `Sane`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WeekMode {
  #[default]
  Sane,
  Insane,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
  pub id: i64,
  pub username: String,
  pub group_id: Option<i64>,
  pub week_mode: WeekMode,
  pub is_sick_mode: bool,
  pub has_flexible_rest_day: bool,
  pub total_penalty_owed: f64,
  /// Stamped by the client-initiated check; informational only
  pub last_penalty_check: Option<NaiveDate>,
}
