use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::points::ExerciseCategory;

/// A logged exercise joined with its category from the exercise lookup.
/// Immutable once written by the logging flow.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExerciseLog {
  pub user_id: i64,
  pub date: NaiveDate,
  pub points: i64,
  pub exercise_id: i64,
  pub category: ExerciseCategory,
}
