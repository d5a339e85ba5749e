use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A group row. `rest_days`, `recovery_days` and `penalty_amount` are the
/// legacy per-group columns, only consulted when no `group_settings` row exists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
  pub id: i64,
  pub name: String,
  pub start_date: NaiveDate,
  pub rest_days: String,
  pub recovery_days: String,
  pub penalty_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupSettings {
  pub group_id: i64,
  pub rest_days: String,
  pub recovery_days: String,
  pub penalty_amount: f64,
}
