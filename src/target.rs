//! Daily point target
//!
//! The target grows by one point per day since the group started. In `sane`
//! mode growth freezes to a weekly cadence after `GROWTH_FREEZE_DAY`; `insane`
//! mode never freezes. Group rest days double the target, recovery days
//! quarter it. Everything here is pure so it can be evaluated for any past date.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::WeekMode;

/// Day offset after which sane-mode growth becomes weekly
pub const GROWTH_FREEZE_DAY: i64 = 448;

/// Canonical quarter rule, shared by the recovery-day target and the recovery
/// point cap: `round(value * 0.25)`, halves rounding up.
pub fn quarter(value: i64) -> i64 {
  (value as f64 * 0.25).round() as i64
}

/// Weekday index with 0 = Sunday .. 6 = Saturday
pub fn weekday_index(date: NaiveDate) -> u8 {
  date.weekday().num_days_from_sunday() as u8
}

/// Whole days from the group's start to `date`, clamped at zero
pub fn days_since_start(start_date: NaiveDate, date: NaiveDate) -> i64 {
  (date - start_date).num_days().max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayKind {
  Standard,
  Rest,
  Recovery,
}

// ---------------------------------------------------------------------------
/// Day Rules: a group's weekday exceptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRules {
  pub rest_days: BTreeSet<u8>,
  pub recovery_days: BTreeSet<u8>,
}

impl DayRules {
  pub fn new(rest_days: impl IntoIterator<Item = u8>, recovery_days: impl IntoIterator<Item = u8>) -> Self {
    Self {
      rest_days: rest_days.into_iter().collect(),
      recovery_days: recovery_days.into_iter().collect(),
    }
  }

  /// Parse the JSON weekday arrays stored on groups / group settings
  pub fn from_json(rest_days: &str, recovery_days: &str) -> EngineResult<Self> {
    Ok(Self {
      rest_days: parse_weekdays(rest_days)?,
      recovery_days: parse_weekdays(recovery_days)?,
    })
  }

  pub fn is_rest_day(&self, weekday: u8) -> bool {
    self.rest_days.contains(&weekday)
  }

  pub fn is_recovery_day(&self, weekday: u8) -> bool {
    self.recovery_days.contains(&weekday)
  }

  /// Rest takes precedence when a weekday is in both sets
  pub fn day_kind(&self, weekday: u8) -> DayKind {
    if self.is_rest_day(weekday) {
      DayKind::Rest
    } else if self.is_recovery_day(weekday) {
      DayKind::Recovery
    } else {
      DayKind::Standard
    }
  }
}

fn parse_weekdays(json: &str) -> EngineResult<BTreeSet<u8>> {
  let trimmed = json.trim();
  if trimmed.is_empty() {
    return Ok(BTreeSet::new());
  }
  let days: Vec<u8> = serde_json::from_str(trimmed)
    .map_err(|e| EngineError::InvalidData(format!("Failed to parse weekday list {:?}: {}", json, e)))?;
  if let Some(bad) = days.iter().find(|d| **d > 6) {
    return Err(EngineError::InvalidData(format!("Weekday out of range: {}", bad)));
  }
  Ok(days.into_iter().collect())
}

// ---------------------------------------------------------------------------
/// Target computation
// ---------------------------------------------------------------------------

/// Target before calendar exceptions
pub fn base_target(days_since_start: i64, mode: WeekMode) -> i64 {
  let days = days_since_start.max(0);
  if mode == WeekMode::Sane && days >= GROWTH_FREEZE_DAY {
    GROWTH_FREEZE_DAY + (days - GROWTH_FREEZE_DAY) / 7
  } else {
    1 + days
  }
}

/// Target for a day, applying the rest/recovery exception to the
/// (possibly frozen) base
pub fn compute_target(days_since_start: i64, mode: WeekMode, rules: &DayRules, weekday: u8) -> i64 {
  let base = base_target(days_since_start, mode);
  match rules.day_kind(weekday) {
    DayKind::Rest => base * 2,
    DayKind::Recovery => quarter(base),
    DayKind::Standard => base,
  }
}

/// Convenience wrapper deriving offset and weekday from calendar dates
pub fn target_for_date(start_date: NaiveDate, date: NaiveDate, mode: WeekMode, rules: &DayRules) -> i64 {
  compute_target(days_since_start(start_date, date), mode, rules, weekday_index(date))
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
