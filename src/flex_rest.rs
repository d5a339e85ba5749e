//! Flexible rest day evaluation
//!
//! On a group rest day, members without the flexible-rest flag are simply
//! exempt. Flagged members earn the exemption by having scored at least double
//! the previous day's target; otherwise they are held to the rest day's own
//! (doubled) target.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{ExerciseLog, WeekMode};
use crate::points::aggregate_points;
use crate::target::{compute_target, weekday_index, DayRules};

/// Prior-day numbers behind a flexible rest decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlexRestCheck {
  pub prior_date: NaiveDate,
  pub prior_target: i64,
  pub prior_points: i64,
}

impl FlexRestCheck {
  pub fn qualified(&self) -> bool {
    self.prior_points >= self.prior_target * 2
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RestDayDecision {
  /// Member has no flexible rest day; rest days are unconditionally exempt
  Exempt,
  /// Flagged member doubled yesterday's target
  FlexQualified(FlexRestCheck),
  /// Flagged member did not qualify; evaluate today's rest-day target
  Fallthrough(FlexRestCheck),
}

/// Evaluate the day before `date` against its own target, sane mode
pub fn check_prior_day(
  date: NaiveDate,
  days_since_start: i64,
  rules: &DayRules,
  prior_logs: &[ExerciseLog],
) -> FlexRestCheck {
  let prior_date = date - Duration::days(1);
  let prior_target = compute_target(
    days_since_start - 1,
    WeekMode::Sane,
    rules,
    weekday_index(prior_date),
  );
  let prior_points = aggregate_points(prior_target, prior_logs).effective;

  FlexRestCheck {
    prior_date,
    prior_target,
    prior_points,
  }
}

/// Decide how a rest day is treated for one member
pub fn rest_day_decision(
  has_flexible_rest_day: bool,
  date: NaiveDate,
  days_since_start: i64,
  rules: &DayRules,
  prior_logs: &[ExerciseLog],
) -> RestDayDecision {
  if !has_flexible_rest_day {
    return RestDayDecision::Exempt;
  }

  let check = check_prior_day(date, days_since_start, rules, prior_logs);
  if check.qualified() {
    RestDayDecision::FlexQualified(check)
  } else {
    RestDayDecision::Fallthrough(check)
  }
}
