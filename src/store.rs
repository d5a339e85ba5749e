//! Read-side queries that load a group's state for one evaluated date

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::error::{EngineError, EngineResult};
use crate::models::{ExerciseLog, Group, GroupSettings, Member, RecoveryDayActivation, SickRecord};
use crate::target::{weekday_index, DayRules};

const MEMBER_COLUMNS: &str = "id, username, group_id, week_mode, is_sick_mode, \
   has_flexible_rest_day, total_penalty_owed, last_penalty_check";

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Groups that have at least one member. Ungrouped members never show up.
pub async fn load_groups_with_members(pool: &SqlitePool) -> EngineResult<Vec<Group>> {
  let groups = sqlx::query_as::<_, Group>(
    r#"
    SELECT g.id, g.name, g.start_date, g.rest_days, g.recovery_days, g.penalty_amount
    FROM groups g
    WHERE EXISTS (SELECT 1 FROM members m WHERE m.group_id = g.id)
    ORDER BY g.id
    "#,
  )
  .fetch_all(pool)
  .await?;

  Ok(groups)
}

pub async fn load_group(pool: &SqlitePool, group_id: i64) -> EngineResult<Group> {
  sqlx::query_as::<_, Group>(
    "SELECT id, name, start_date, rest_days, recovery_days, penalty_amount FROM groups WHERE id = ?1",
  )
  .bind(group_id)
  .fetch_optional(pool)
  .await?
  .ok_or(EngineError::GroupNotFound(group_id))
}

pub async fn load_group_settings(pool: &SqlitePool, group_id: i64) -> EngineResult<Option<GroupSettings>> {
  let settings = sqlx::query_as::<_, GroupSettings>(
    "SELECT group_id, rest_days, recovery_days, penalty_amount FROM group_settings WHERE group_id = ?1",
  )
  .bind(group_id)
  .fetch_optional(pool)
  .await?;

  Ok(settings)
}

/// Calendar rules and penalty amount in effect for a group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRules {
  pub rules: DayRules,
  pub penalty_amount: f64,
  /// True when no settings row existed and the legacy group columns were used
  pub from_legacy: bool,
}

pub async fn resolve_group_rules(pool: &SqlitePool, group: &Group) -> EngineResult<GroupRules> {
  match load_group_settings(pool, group.id).await? {
    Some(settings) => Ok(GroupRules {
      rules: DayRules::from_json(&settings.rest_days, &settings.recovery_days)?,
      penalty_amount: settings.penalty_amount,
      from_legacy: false,
    }),
    None => {
      tracing::debug!(group_id = group.id, "No group settings row, using legacy columns");
      Ok(GroupRules {
        rules: DayRules::from_json(&group.rest_days, &group.recovery_days)?,
        penalty_amount: group.penalty_amount,
        from_legacy: true,
      })
    }
  }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

pub async fn load_group_members(pool: &SqlitePool, group_id: i64) -> EngineResult<Vec<Member>> {
  let members = sqlx::query_as::<_, Member>(&format!(
    "SELECT {} FROM members WHERE group_id = ?1 ORDER BY id",
    MEMBER_COLUMNS
  ))
  .bind(group_id)
  .fetch_all(pool)
  .await?;

  Ok(members)
}

pub async fn load_member(pool: &SqlitePool, user_id: i64) -> EngineResult<Member> {
  sqlx::query_as::<_, Member>(&format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS))
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::MemberNotFound(user_id))
}

/// Resolve a bearer session token to its member, ignoring expired sessions
pub async fn load_member_by_session(
  pool: &SqlitePool,
  token: &str,
  now: DateTime<Utc>,
) -> EngineResult<Option<Member>> {
  let session: Option<(i64, DateTime<Utc>)> =
    sqlx::query_as("SELECT user_id, expires_at FROM member_sessions WHERE token = ?1")
      .bind(token)
      .fetch_optional(pool)
      .await?;

  match session {
    Some((user_id, expires_at)) if expires_at > now => Ok(Some(load_member(pool, user_id).await?)),
    _ => Ok(None),
  }
}

pub async fn stamp_last_penalty_check(pool: &SqlitePool, user_id: i64, date: NaiveDate) -> EngineResult<()> {
  sqlx::query("UPDATE members SET last_penalty_check = ?1 WHERE id = ?2")
    .bind(date)
    .bind(user_id)
    .execute(pool)
    .await?;

  Ok(())
}

// ---------------------------------------------------------------------------
// Day state
// ---------------------------------------------------------------------------

/// Logs for a group's members on a date, joined with the exercise category.
/// `user_id` narrows the result to one member.
pub async fn load_day_logs(
  pool: &SqlitePool,
  group_id: i64,
  date: NaiveDate,
  user_id: Option<i64>,
) -> EngineResult<Vec<ExerciseLog>> {
  let logs = sqlx::query_as::<_, ExerciseLog>(
    r#"
    SELECT l.user_id, l.date, l.points, l.exercise_id,
           COALESCE(e.category, 'regular') AS category
    FROM exercise_logs l
    JOIN members m ON m.id = l.user_id
    LEFT JOIN exercises e ON e.id = l.exercise_id
    WHERE m.group_id = ?1 AND l.date = ?2 AND (?3 IS NULL OR l.user_id = ?3)
    ORDER BY l.id
    "#,
  )
  .bind(group_id)
  .bind(date)
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  Ok(logs)
}

pub async fn load_sick_user_ids(
  pool: &SqlitePool,
  group_id: i64,
  date: NaiveDate,
  user_id: Option<i64>,
) -> EngineResult<HashSet<i64>> {
  let records = sqlx::query_as::<_, SickRecord>(
    r#"
    SELECT s.user_id, s.date
    FROM sick_records s
    JOIN members m ON m.id = s.user_id
    WHERE m.group_id = ?1 AND s.date = ?2 AND (?3 IS NULL OR s.user_id = ?3)
    "#,
  )
  .bind(group_id)
  .bind(date)
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  Ok(records.into_iter().map(|r| r.user_id).collect())
}

/// Recovery day activations used on `date`, one per member (earliest wins)
pub async fn load_activations(
  pool: &SqlitePool,
  group_id: i64,
  date: NaiveDate,
  user_id: Option<i64>,
) -> EngineResult<HashMap<i64, RecoveryDayActivation>> {
  let rows = sqlx::query_as::<_, RecoveryDayActivation>(
    r#"
    SELECT a.id, a.user_id, a.used_date, a.week_start_date, a.recovery_minutes, a.is_complete
    FROM recovery_day_activations a
    JOIN members m ON m.id = a.user_id
    WHERE m.group_id = ?1 AND a.used_date = ?2 AND (?3 IS NULL OR a.user_id = ?3)
    ORDER BY a.id
    "#,
  )
  .bind(group_id)
  .bind(date)
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let mut by_user = HashMap::new();
  for activation in rows {
    by_user.entry(activation.user_id).or_insert(activation);
  }
  Ok(by_user)
}

/// Members that already have a penalty row for `date`, whatever its status
pub async fn load_penalized_user_ids(
  pool: &SqlitePool,
  group_id: i64,
  date: NaiveDate,
) -> EngineResult<HashSet<i64>> {
  let rows: Vec<(i64,)> = sqlx::query_as(
    "SELECT DISTINCT user_id FROM pending_penalties WHERE group_id = ?1 AND date = ?2",
  )
  .bind(group_id)
  .bind(date)
  .fetch_all(pool)
  .await?;

  Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub fn group_logs_by_user(logs: Vec<ExerciseLog>) -> HashMap<i64, Vec<ExerciseLog>> {
  let mut by_user: HashMap<i64, Vec<ExerciseLog>> = HashMap::new();
  for log in logs {
    by_user.entry(log.user_id).or_default().push(log);
  }
  by_user
}

/// Everything the classifier needs for one group and date
#[derive(Debug, Clone)]
pub struct GroupDay {
  pub group: Group,
  pub date: NaiveDate,
  pub rules: GroupRules,
  pub members: Vec<Member>,
  pub logs: HashMap<i64, Vec<ExerciseLog>>,
  pub prior_logs: HashMap<i64, Vec<ExerciseLog>>,
  pub sick: HashSet<i64>,
  pub activations: HashMap<i64, RecoveryDayActivation>,
  pub penalized: HashSet<i64>,
}

impl GroupDay {
  pub fn is_sick(&self, member: &Member) -> bool {
    member.is_sick_mode || self.sick.contains(&member.id)
  }

  pub fn logs_for(&self, user_id: i64) -> &[ExerciseLog] {
    self.logs.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn prior_logs_for(&self, user_id: i64) -> &[ExerciseLog] {
    self.prior_logs.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
  }
}

/// Load a group's day. With `user_id` set, only that member is loaded.
pub async fn load_group_day(
  pool: &SqlitePool,
  group: &Group,
  date: NaiveDate,
  user_id: Option<i64>,
) -> EngineResult<GroupDay> {
  let rules = resolve_group_rules(pool, group).await?;

  let members = match user_id {
    Some(id) => vec![load_member(pool, id).await?],
    None => load_group_members(pool, group.id).await?,
  };

  let logs = group_logs_by_user(load_day_logs(pool, group.id, date, user_id).await?);

  // Yesterday's logs only matter for flexible rest on a rest day
  let needs_prior = rules.rules.is_rest_day(weekday_index(date))
    && members.iter().any(|m| m.has_flexible_rest_day);
  let prior_logs = if needs_prior {
    let prior_date = date
      .pred_opt()
      .ok_or_else(|| EngineError::InvalidData(format!("No day before {}", date)))?;
    group_logs_by_user(load_day_logs(pool, group.id, prior_date, user_id).await?)
  } else {
    HashMap::new()
  };

  let sick = load_sick_user_ids(pool, group.id, date, user_id).await?;
  let activations = load_activations(pool, group.id, date, user_id).await?;
  let penalized = load_penalized_user_ids(pool, group.id, date).await?;

  Ok(GroupDay {
    group: group.clone(),
    date,
    rules,
    members,
    logs,
    prior_logs,
    sick,
    activations,
    penalized,
  })
}
