//! Member outcome classification
//!
//! A member's day is classified by an ordered chain of guards. The first guard
//! that returns an outcome wins:
//!
//! 1. group not started yet
//! 2. sick (current flag or a sick record for the date)
//! 3. recovery day complete
//! 4. group rest day (flexible rest may fall through)
//! 5. recovery day activated but incomplete
//! 6. standard day, always evaluated in sane mode

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::flex_rest::{rest_day_decision, FlexRestCheck, RestDayDecision};
use crate::models::{ExerciseLog, RecoveryDayActivation, WeekMode};
use crate::points::{day_progress, DayProgress};
use crate::target::{days_since_start, target_for_date, weekday_index, DayRules};

/// Everything needed to classify one member for one date
#[derive(Debug, Clone)]
pub struct MemberDay<'a> {
  pub date: NaiveDate,
  pub group_start: NaiveDate,
  pub rules: &'a DayRules,
  pub is_sick: bool,
  pub has_flexible_rest_day: bool,
  pub activation: Option<&'a RecoveryDayActivation>,
  pub logs: &'a [ExerciseLog],
  pub prior_logs: &'a [ExerciseLog],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptReason {
  NotStarted,
  Sick,
  RecoveryDayComplete,
  RestDay,
  FlexRestQualified,
}

impl ExemptReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::NotStarted => "group not started",
      Self::Sick => "sick mode",
      Self::RecoveryDayComplete => "recovery day complete",
      Self::RestDay => "rest day",
      Self::FlexRestQualified => "flex rest qualified",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissKind {
  Standard,
  RestDayFallthrough,
  RecoveryDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  Exempt { reason: ExemptReason },
  Met { progress: DayProgress },
  Missed { progress: DayProgress, kind: MissKind },
}

impl Outcome {
  pub fn is_penalty(&self) -> bool {
    matches!(self, Outcome::Missed { .. })
  }

  /// Explanation shown to the member when no penalty applies
  pub fn reason(&self) -> Option<&'static str> {
    match self {
      Outcome::Exempt { reason } => Some(reason.as_str()),
      Outcome::Met { .. } => Some("met target"),
      Outcome::Missed { .. } => None,
    }
  }
}

/// State carried down the chain by guards that decline to decide
#[derive(Debug, Default)]
struct Trail {
  rest_fallthrough: Option<FlexRestCheck>,
}

type Guard = fn(&MemberDay<'_>, &mut Trail) -> Option<Outcome>;

const GUARDS: [Guard; 5] = [
  not_started,
  sick,
  recovery_complete,
  rest_day,
  recovery_incomplete,
];

pub fn classify(day: &MemberDay<'_>) -> Outcome {
  let mut trail = Trail::default();
  for guard in GUARDS {
    if let Some(outcome) = guard(day, &mut trail) {
      return outcome;
    }
  }
  standard_day(day, &trail)
}

fn exempt(reason: ExemptReason) -> Option<Outcome> {
  Some(Outcome::Exempt { reason })
}

fn not_started(day: &MemberDay<'_>, _: &mut Trail) -> Option<Outcome> {
  (day.date < day.group_start).then_some(Outcome::Exempt {
    reason: ExemptReason::NotStarted,
  })
}

fn sick(day: &MemberDay<'_>, _: &mut Trail) -> Option<Outcome> {
  if day.is_sick {
    exempt(ExemptReason::Sick)
  } else {
    None
  }
}

fn recovery_complete(day: &MemberDay<'_>, _: &mut Trail) -> Option<Outcome> {
  match day.activation {
    Some(activation) if activation.is_done() => exempt(ExemptReason::RecoveryDayComplete),
    _ => None,
  }
}

fn rest_day(day: &MemberDay<'_>, trail: &mut Trail) -> Option<Outcome> {
  if !day.rules.is_rest_day(weekday_index(day.date)) {
    return None;
  }

  let offset = days_since_start(day.group_start, day.date);
  match rest_day_decision(day.has_flexible_rest_day, day.date, offset, day.rules, day.prior_logs) {
    RestDayDecision::Exempt => exempt(ExemptReason::RestDay),
    RestDayDecision::FlexQualified(_) => exempt(ExemptReason::FlexRestQualified),
    RestDayDecision::Fallthrough(check) => {
      trail.rest_fallthrough = Some(check);
      None
    }
  }
}

fn recovery_incomplete(day: &MemberDay<'_>, _: &mut Trail) -> Option<Outcome> {
  let activation = day.activation?;
  let progress = day_progress(0, day.logs, Some(activation));
  Some(settle(progress, MissKind::RecoveryDay))
}

fn standard_day(day: &MemberDay<'_>, trail: &Trail) -> Outcome {
  let target = target_for_date(day.group_start, day.date, WeekMode::Sane, day.rules);
  let progress = day_progress(target, day.logs, None);
  let kind = if trail.rest_fallthrough.is_some() {
    MissKind::RestDayFallthrough
  } else {
    MissKind::Standard
  };
  settle(progress, kind)
}

fn settle(progress: DayProgress, kind: MissKind) -> Outcome {
  if progress.is_met() {
    Outcome::Met { progress }
  } else {
    Outcome::Missed { progress, kind }
  }
}
