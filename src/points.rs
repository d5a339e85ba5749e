//! Point aggregation
//!
//! Turns a member's logged exercise for one day into effective points.
//! Recovery-category exercise only counts up to a quarter of the day's
//! target. An activated recovery day replaces all of this with a fixed
//! minutes goal.

use serde::{Deserialize, Serialize};

use crate::models::{ExerciseLog, RecoveryDayActivation};
use crate::target::quarter;

/// Minutes of recovery work that complete an activated recovery day
pub const RECOVERY_DAY_TARGET_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ExerciseCategory {
  #[default]
  Regular,
  Recovery,
}

/// Maximum recovery-category points that count toward `target`
pub fn recovery_cap(target: i64) -> i64 {
  quarter(target)
}

/// Breakdown of one day's logged points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointBreakdown {
  pub regular: i64,
  pub recovery: i64,
  pub cap: i64,
  pub effective: i64,
}

/// Sum a day's logs by category and cap the recovery share
pub fn aggregate_points(target: i64, logs: &[ExerciseLog]) -> PointBreakdown {
  let (regular, recovery) = logs.iter().fold((0i64, 0i64), |(reg, rec), log| match log.category {
    ExerciseCategory::Regular => (reg + log.points, rec),
    ExerciseCategory::Recovery => (reg, rec + log.points),
  });
  let cap = recovery_cap(target);

  PointBreakdown {
    regular,
    recovery,
    cap,
    effective: regular + recovery.min(cap),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressBasis {
  Points,
  RecoveryMinutes,
}

/// What a member achieved on a day, against what was required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayProgress {
  pub basis: ProgressBasis,
  pub achieved: i64,
  pub required: i64,
}

impl DayProgress {
  pub fn is_met(&self) -> bool {
    self.achieved >= self.required
  }
}

/// Effective progress for a day. An activated recovery day supersedes normal
/// aggregation and is measured in minutes against the fixed goal.
pub fn day_progress(
  target: i64,
  logs: &[ExerciseLog],
  activation: Option<&RecoveryDayActivation>,
) -> DayProgress {
  match activation {
    Some(activation) => DayProgress {
      basis: ProgressBasis::RecoveryMinutes,
      achieved: activation.recovery_minutes,
      required: RECOVERY_DAY_TARGET_MINUTES,
    },
    None => DayProgress {
      basis: ProgressBasis::Points,
      achieved: aggregate_points(target, logs).effective,
      required: target,
    },
  }
}
