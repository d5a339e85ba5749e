//! Daily penalty orchestration
//!
//! `run_daily_sweep` walks every group with members, classifies each member
//! for the evaluated date, creates penalties for misses, auto-accepts expired
//! pending penalties and posts one summary per group to the group chat.
//! `check_member` is the same evaluation scoped to a single member, used when
//! the app opens.
//!
//! Safety against duplicate runs comes from persisted state only: the
//! per-(user, date) penalty guard and the status-gated ledger posting.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::classify::{classify, ExemptReason, MemberDay, Outcome};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, AutoAcceptReport, CreateOutcome};
use crate::models::{Group, Member, NewPendingPenalty, PendingPenalty};
use crate::notify::{self, PushNotifier, PushPayload};
use crate::store::{self, GroupDay};

/// Dependencies handed to every orchestration call
#[derive(Clone)]
pub struct EngineContext {
  pub db: SqlitePool,
  pub notifier: Arc<dyn PushNotifier>,
  /// Link embedded in push notifications
  pub app_base_url: String,
}

/// The calendar day evaluated by a scheduled run: the UTC day before `now`
pub fn sweep_date(now: DateTime<Utc>) -> NaiveDate {
  now.date_naive() - Duration::days(1)
}

pub fn member_day<'a>(day: &'a GroupDay, member: &Member) -> MemberDay<'a> {
  MemberDay {
    date: day.date,
    group_start: day.group.start_date,
    rules: &day.rules.rules,
    is_sick: day.is_sick(member),
    has_flexible_rest_day: member.has_flexible_rest_day,
    activation: day.activations.get(&member.id),
    logs: day.logs_for(member.id),
    prior_logs: day.prior_logs_for(member.id),
  }
}

fn penalty_for(day: &GroupDay, member: &Member, outcome: &Outcome) -> Option<NewPendingPenalty> {
  match outcome {
    Outcome::Missed { progress, .. } => Some(NewPendingPenalty {
      user_id: member.id,
      group_id: day.group.id,
      date: day.date,
      target_points: progress.required,
      actual_points: progress.achieved,
      penalty_amount: day.rules.penalty_amount,
    }),
    _ => None,
  }
}

// ---------------------------------------------------------------------------
/// Sweep results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSweepResult {
  pub group_id: i64,
  pub group_name: String,
  pub used_legacy_settings: bool,
  pub not_started: Vec<String>,
  pub sick: Vec<String>,
  pub recovery_complete: Vec<String>,
  pub rest_day: Vec<String>,
  pub flex_rest: Vec<String>,
  pub met_target: Vec<String>,
  pub penalized: Vec<String>,
  pub already_penalized: Vec<String>,
  pub exempt_count: usize,
  pub complete_count: usize,
  pub penalized_count: usize,
  pub errors: Vec<String>,
}

impl GroupSweepResult {
  fn new(group: &Group, used_legacy_settings: bool) -> Self {
    Self {
      group_id: group.id,
      group_name: group.name.clone(),
      used_legacy_settings,
      ..Default::default()
    }
  }

  fn record_exempt(&mut self, username: &str, reason: ExemptReason) {
    let bucket = match reason {
      ExemptReason::NotStarted => &mut self.not_started,
      ExemptReason::Sick => &mut self.sick,
      ExemptReason::RestDay => &mut self.rest_day,
      ExemptReason::FlexRestQualified => &mut self.flex_rest,
      ExemptReason::RecoveryDayComplete => {
        self.complete_count += 1;
        self.recovery_complete.push(username.to_string());
        return;
      }
    };
    bucket.push(username.to_string());
    self.exempt_count += 1;
  }

  fn record_met(&mut self, username: &str) {
    self.met_target.push(username.to_string());
    self.complete_count += 1;
  }

  fn record_penalty(&mut self, username: &str, created: bool) {
    if created {
      self.penalized.push(username.to_string());
    } else {
      self.already_penalized.push(username.to_string());
    }
    self.penalized_count += 1;
  }

  /// One-line chat summary
  pub fn summary_message(&self, date: NaiveDate) -> String {
    let mut message = format!(
      "Daily check for {}: {} exempt, {} complete, {} penalized.",
      date, self.exempt_count, self.complete_count, self.penalized_count
    );
    let owing: Vec<&str> = self
      .penalized
      .iter()
      .chain(self.already_penalized.iter())
      .map(String::as_str)
      .collect();
    if !owing.is_empty() {
      message.push_str(&format!(" Missed target: {}.", owing.join(", ")));
    }
    message
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
  pub date: NaiveDate,
  pub groups_processed: usize,
  pub auto_accepted: AutoAcceptReport,
  pub results: Vec<GroupSweepResult>,
  pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
/// Batch sweep
// ---------------------------------------------------------------------------

async fn sweep_group(
  ctx: &EngineContext,
  group: &Group,
  date: NaiveDate,
  now: DateTime<Utc>,
) -> EngineResult<GroupSweepResult> {
  let day = store::load_group_day(&ctx.db, group, date, None).await?;
  let mut result = GroupSweepResult::new(group, day.rules.from_legacy);

  for member in &day.members {
    let outcome = classify(&member_day(&day, member));

    match outcome {
      Outcome::Exempt { reason } => {
        result.record_exempt(&member.username, reason);
        continue;
      }
      Outcome::Met { .. } => {
        result.record_met(&member.username);
        continue;
      }
      Outcome::Missed { .. } => {}
    }
    let Some(new_penalty) = penalty_for(&day, member, &outcome) else {
      continue;
    };

    if day.penalized.contains(&member.id) {
      result.record_penalty(&member.username, false);
      continue;
    }

    match ledger::create_penalty(&ctx.db, &new_penalty, now).await {
      Ok(CreateOutcome::Created(_)) => result.record_penalty(&member.username, true),
      Ok(CreateOutcome::AlreadyExists(_)) => result.record_penalty(&member.username, false),
      Err(e) => {
        tracing::error!(group_id = group.id, user_id = member.id, error = %e, "Failed to create penalty");
        result.errors.push(format!("{}: {}", member.username, e));
      }
    }
  }

  tracing::info!(
    group_id = group.id,
    %date,
    exempt = result.exempt_count,
    complete = result.complete_count,
    penalized = result.penalized_count,
    "Group swept"
  );

  Ok(result)
}

/// Run the full daily sweep for `date`
pub async fn run_daily_sweep(
  ctx: &EngineContext,
  date: NaiveDate,
  now: DateTime<Utc>,
) -> EngineResult<SweepSummary> {
  let groups = store::load_groups_with_members(&ctx.db).await?;
  tracing::info!(%date, groups = groups.len(), "Starting daily penalty sweep");

  let mut results = Vec::with_capacity(groups.len());
  let mut errors = Vec::new();

  for group in &groups {
    match sweep_group(ctx, group, date, now).await {
      Ok(result) => results.push(result),
      Err(e) => {
        tracing::error!(group_id = group.id, error = %e, "Group sweep failed");
        errors.push(format!("group {} ({}): {}", group.id, group.name, e));
      }
    }
  }

  let auto_accepted = match ledger::auto_accept_expired(&ctx.db, now).await {
    Ok(report) => report,
    Err(e) => {
      tracing::error!(error = %e, "Auto-accept sweep failed");
      errors.push(format!("auto-accept: {}", e));
      AutoAcceptReport::default()
    }
  };

  for result in &results {
    let message = result.summary_message(date);
    if let Err(e) = notify::post_group_message(&ctx.db, result.group_id, &message, now).await {
      tracing::warn!(group_id = result.group_id, error = %e, "Failed to post group summary");
    }
  }

  Ok(SweepSummary {
    date,
    groups_processed: results.len(),
    auto_accepted,
    results,
    errors,
  })
}

// ---------------------------------------------------------------------------
/// Single-member check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MemberCheck {
  PenaltyExists { penalty: PendingPenalty },
  NoPenalty { reason: String },
  PenaltyCreated { penalty: PendingPenalty },
}

/// Evaluate one member for `date`, creating and announcing a penalty on a miss.
/// `date` may be at most the current UTC day.
pub async fn check_member(
  ctx: &EngineContext,
  user_id: i64,
  date: NaiveDate,
  now: DateTime<Utc>,
) -> EngineResult<MemberCheck> {
  if date > now.date_naive() {
    return Err(EngineError::DateInFuture(date));
  }

  let member = store::load_member(&ctx.db, user_id).await?;
  let group_id = member.group_id.ok_or(EngineError::MemberNotInGroup(user_id))?;
  let group = store::load_group(&ctx.db, group_id).await?;

  store::stamp_last_penalty_check(&ctx.db, user_id, date).await?;

  if let Some(penalty) = ledger::find_penalty_for_date(&ctx.db, user_id, date).await? {
    return Ok(MemberCheck::PenaltyExists { penalty });
  }

  // Nothing to load for days before the group started
  if date < group.start_date {
    return Ok(MemberCheck::NoPenalty {
      reason: ExemptReason::NotStarted.as_str().to_string(),
    });
  }

  let day = store::load_group_day(&ctx.db, &group, date, Some(user_id)).await?;
  let outcome = classify(&member_day(&day, &member));

  let Some(new_penalty) = penalty_for(&day, &member, &outcome) else {
    let reason = outcome.reason().unwrap_or("met target").to_string();
    tracing::debug!(user_id, %date, %reason, "No penalty");
    return Ok(MemberCheck::NoPenalty { reason });
  };

  match ledger::create_penalty(&ctx.db, &new_penalty, now).await? {
    CreateOutcome::AlreadyExists(penalty) => Ok(MemberCheck::PenaltyExists { penalty }),
    CreateOutcome::Created(penalty) => {
      let payload = PushPayload::for_penalty(&penalty, &ctx.app_base_url);
      if let Err(e) = ctx.notifier.send(user_id, &payload).await {
        tracing::warn!(user_id, penalty_id = penalty.id, error = %e, "Penalty push failed");
      }
      Ok(MemberCheck::PenaltyCreated { penalty })
    }
  }
}
