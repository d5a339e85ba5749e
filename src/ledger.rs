//! Penalty ledger
//!
//! Lifecycle of a penalty record: `pending -> accepted | disputed`.
//! Creation is idempotent per (user, date). Acceptance posts a payment
//! transaction and bumps the member's balance inside one database
//! transaction, gated on the row still being `pending`, so repeated or
//! concurrent sweeps can never post twice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{EngineError, EngineResult};
use crate::models::penalty::TRANSACTION_TYPE_PENALTY;
use crate::models::{NewPendingPenalty, PaymentTransaction, PenaltyStatus, PendingPenalty};

const PENALTY_COLUMNS: &str = "id, user_id, group_id, date, target_points, actual_points, \
   penalty_amount, status, deadline, dispute_reason, resolved_at, created_at";

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
  Created(PendingPenalty),
  AlreadyExists(PendingPenalty),
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

pub async fn get_penalty(pool: &SqlitePool, penalty_id: i64) -> EngineResult<PendingPenalty> {
  sqlx::query_as::<_, PendingPenalty>(&format!(
    "SELECT {} FROM pending_penalties WHERE id = ?1",
    PENALTY_COLUMNS
  ))
  .bind(penalty_id)
  .fetch_optional(pool)
  .await?
  .ok_or(EngineError::PenaltyNotFound(penalty_id))
}

pub async fn find_penalty_for_date(
  pool: &SqlitePool,
  user_id: i64,
  date: NaiveDate,
) -> EngineResult<Option<PendingPenalty>> {
  let penalty = sqlx::query_as::<_, PendingPenalty>(&format!(
    "SELECT {} FROM pending_penalties WHERE user_id = ?1 AND date = ?2",
    PENALTY_COLUMNS
  ))
  .bind(user_id)
  .bind(date)
  .fetch_optional(pool)
  .await?;

  Ok(penalty)
}

/// A member's penalties, newest date first
pub async fn list_member_penalties(pool: &SqlitePool, user_id: i64) -> EngineResult<Vec<PendingPenalty>> {
  let penalties = sqlx::query_as::<_, PendingPenalty>(&format!(
    "SELECT {} FROM pending_penalties WHERE user_id = ?1 ORDER BY date DESC, id DESC",
    PENALTY_COLUMNS
  ))
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  Ok(penalties)
}

pub async fn list_transactions(pool: &SqlitePool, user_id: i64) -> EngineResult<Vec<PaymentTransaction>> {
  let transactions = sqlx::query_as::<_, PaymentTransaction>(
    r#"
    SELECT id, user_id, group_id, penalty_id, amount, transaction_type, description, created_at
    FROM payment_transactions
    WHERE user_id = ?1
    ORDER BY id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  Ok(transactions)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Create a pending penalty unless one already exists for (user, date).
/// The unique index backs up the existence check.
pub async fn create_penalty(
  pool: &SqlitePool,
  new: &NewPendingPenalty,
  now: DateTime<Utc>,
) -> EngineResult<CreateOutcome> {
  if let Some(existing) = find_penalty_for_date(pool, new.user_id, new.date).await? {
    return Ok(CreateOutcome::AlreadyExists(existing));
  }

  let result = sqlx::query(
    r#"
    INSERT INTO pending_penalties (
      user_id, group_id, date, target_points, actual_points,
      penalty_amount, status, deadline, created_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(user_id, date) DO NOTHING
    "#,
  )
  .bind(new.user_id)
  .bind(new.group_id)
  .bind(new.date)
  .bind(new.target_points)
  .bind(new.actual_points)
  .bind(new.penalty_amount)
  .bind(PenaltyStatus::Pending)
  .bind(NewPendingPenalty::deadline_from(now))
  .bind(now)
  .execute(pool)
  .await?;

  if result.rows_affected() == 0 {
    // Lost a race with another writer for the same (user, date)
    let existing = find_penalty_for_date(pool, new.user_id, new.date)
      .await?
      .ok_or_else(|| EngineError::InvalidData("penalty insert conflicted but no row found".into()))?;
    return Ok(CreateOutcome::AlreadyExists(existing));
  }

  let penalty = get_penalty(pool, result.last_insert_rowid()).await?;
  tracing::info!(
    penalty_id = penalty.id,
    user_id = penalty.user_id,
    date = %penalty.date,
    target = penalty.target_points,
    actual = penalty.actual_points,
    "Created pending penalty"
  );
  Ok(CreateOutcome::Created(penalty))
}

// ---------------------------------------------------------------------------
// Accept / dispute
// ---------------------------------------------------------------------------

/// Accept a pending penalty and post it to the ledger.
///
/// Returns `None` when the penalty was no longer pending, in which case
/// nothing is written.
pub async fn accept_penalty(
  pool: &SqlitePool,
  penalty_id: i64,
  now: DateTime<Utc>,
) -> EngineResult<Option<PaymentTransaction>> {
  let mut tx = pool.begin().await?;

  let penalty = sqlx::query_as::<_, PendingPenalty>(&format!(
    "SELECT {} FROM pending_penalties WHERE id = ?1",
    PENALTY_COLUMNS
  ))
  .bind(penalty_id)
  .fetch_optional(&mut *tx)
  .await?
  .ok_or(EngineError::PenaltyNotFound(penalty_id))?;

  let updated = sqlx::query(
    "UPDATE pending_penalties SET status = ?1, resolved_at = ?2 WHERE id = ?3 AND status = ?4",
  )
  .bind(PenaltyStatus::Accepted)
  .bind(now)
  .bind(penalty_id)
  .bind(PenaltyStatus::Pending)
  .execute(&mut *tx)
  .await?;

  if updated.rows_affected() == 0 {
    tx.rollback().await?;
    return Ok(None);
  }

  let description = format!(
    "Penalty for {}: {} of {} points",
    penalty.date, penalty.actual_points, penalty.target_points
  );

  let inserted = sqlx::query(
    r#"
    INSERT INTO payment_transactions (
      user_id, group_id, penalty_id, amount, transaction_type, description, created_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    "#,
  )
  .bind(penalty.user_id)
  .bind(penalty.group_id)
  .bind(penalty.id)
  .bind(penalty.penalty_amount)
  .bind(TRANSACTION_TYPE_PENALTY)
  .bind(&description)
  .bind(now)
  .execute(&mut *tx)
  .await?;

  sqlx::query("UPDATE members SET total_penalty_owed = total_penalty_owed + ?1 WHERE id = ?2")
    .bind(penalty.penalty_amount)
    .bind(penalty.user_id)
    .execute(&mut *tx)
    .await?;

  tx.commit().await?;

  tracing::info!(
    penalty_id = penalty.id,
    user_id = penalty.user_id,
    amount = penalty.penalty_amount,
    "Accepted penalty"
  );

  Ok(Some(PaymentTransaction {
    id: inserted.last_insert_rowid(),
    user_id: penalty.user_id,
    group_id: penalty.group_id,
    penalty_id: Some(penalty.id),
    amount: penalty.penalty_amount,
    transaction_type: TRANSACTION_TYPE_PENALTY.to_string(),
    description,
    created_at: now,
  }))
}

/// Load a penalty on behalf of a member. Another member's penalty is reported
/// as not found.
async fn owned_pending_penalty(pool: &SqlitePool, penalty_id: i64, user_id: i64) -> EngineResult<PendingPenalty> {
  let penalty = get_penalty(pool, penalty_id).await?;
  if penalty.user_id != user_id {
    return Err(EngineError::PenaltyNotFound(penalty_id));
  }
  if penalty.status != PenaltyStatus::Pending {
    return Err(EngineError::InvalidState {
      id: penalty_id,
      status: penalty.status,
    });
  }
  Ok(penalty)
}

/// Member-initiated acceptance
pub async fn accept_as_member(
  pool: &SqlitePool,
  penalty_id: i64,
  user_id: i64,
  now: DateTime<Utc>,
) -> EngineResult<PendingPenalty> {
  owned_pending_penalty(pool, penalty_id, user_id).await?;

  if accept_penalty(pool, penalty_id, now).await?.is_none() {
    let current = get_penalty(pool, penalty_id).await?;
    return Err(EngineError::InvalidState {
      id: penalty_id,
      status: current.status,
    });
  }

  get_penalty(pool, penalty_id).await
}

/// Member-initiated dispute. Only flips the status and keeps the reason,
/// nothing is posted to the ledger.
pub async fn dispute_penalty(
  pool: &SqlitePool,
  penalty_id: i64,
  user_id: i64,
  reason: &str,
  now: DateTime<Utc>,
) -> EngineResult<PendingPenalty> {
  owned_pending_penalty(pool, penalty_id, user_id).await?;

  let updated = sqlx::query(
    r#"
    UPDATE pending_penalties
    SET status = ?1, dispute_reason = ?2, resolved_at = ?3
    WHERE id = ?4 AND status = ?5
    "#,
  )
  .bind(PenaltyStatus::Disputed)
  .bind(reason)
  .bind(now)
  .bind(penalty_id)
  .bind(PenaltyStatus::Pending)
  .execute(pool)
  .await?;

  let penalty = get_penalty(pool, penalty_id).await?;
  if updated.rows_affected() == 0 {
    return Err(EngineError::InvalidState {
      id: penalty_id,
      status: penalty.status,
    });
  }

  tracing::info!(penalty_id, user_id, "Penalty disputed");
  Ok(penalty)
}

// ---------------------------------------------------------------------------
// Auto-accept sweep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAcceptReport {
  pub expired: usize,
  pub accepted: usize,
  /// Already resolved by someone else between selection and update
  pub skipped: usize,
  pub errors: Vec<String>,
}

/// Accept every pending penalty whose deadline has passed. A failure on one
/// record is logged and leaves it pending for the next sweep.
pub async fn auto_accept_expired(pool: &SqlitePool, now: DateTime<Utc>) -> EngineResult<AutoAcceptReport> {
  let pending = sqlx::query_as::<_, PendingPenalty>(&format!(
    "SELECT {} FROM pending_penalties WHERE status = ?1 ORDER BY id",
    PENALTY_COLUMNS
  ))
  .bind(PenaltyStatus::Pending)
  .fetch_all(pool)
  .await?;

  let mut report = AutoAcceptReport::default();

  for penalty in pending.iter().filter(|p| p.is_expired(now)) {
    report.expired += 1;
    match accept_penalty(pool, penalty.id, now).await {
      Ok(Some(_)) => report.accepted += 1,
      Ok(None) => report.skipped += 1,
      Err(e) => {
        tracing::error!(penalty_id = penalty.id, error = %e, "Auto-accept failed");
        report.errors.push(format!("penalty {}: {}", penalty.id, e));
      }
    }
  }

  if report.expired > 0 {
    tracing::info!(
      expired = report.expired,
      accepted = report.accepted,
      skipped = report.skipped,
      failed = report.errors.len(),
      "Auto-accept sweep finished"
    );
  }

  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::load_member;
  use crate::test_utils::*;
  use chrono::Duration;

  async fn setup() -> (SqlitePool, i64, i64) {
    let pool = setup_test_db().await;
    let group_id = seed_group(&pool, "crew", ymd(2025, 1, 1), "[]", "[]", 10.0).await;
    let user_id = seed_member(&pool, "alice", Some(group_id)).await;
    (pool, group_id, user_id)
  }

  fn new_penalty(user_id: i64, group_id: i64, date: NaiveDate) -> NewPendingPenalty {
    NewPendingPenalty {
      user_id,
      group_id,
      date,
      target_points: 100,
      actual_points: 65,
      penalty_amount: 10.0,
    }
  }

  #[tokio::test]
  async fn test_create_is_idempotent_per_user_and_date() {
    let (pool, group_id, user_id) = setup().await;
    let now = Utc::now();
    let date = ymd(2025, 2, 1);

    let first = create_penalty(&pool, &new_penalty(user_id, group_id, date), now).await.unwrap();
    let created = match first {
      CreateOutcome::Created(p) => p,
      other => panic!("expected creation, got {:?}", other),
    };
    assert_eq!(created.status, PenaltyStatus::Pending);
    assert_eq!((created.deadline - now).num_minutes(), 24 * 60);

    let second = create_penalty(&pool, &new_penalty(user_id, group_id, date), now).await.unwrap();
    assert!(matches!(second, CreateOutcome::AlreadyExists(ref p) if p.id == created.id));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_penalties")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(count, 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_unique_index_rejects_duplicate_rows() {
    let (pool, group_id, user_id) = setup().await;
    let date = ymd(2025, 2, 1);
    seed_pending_penalty(&pool, user_id, group_id, date, Utc::now()).await;

    let duplicate = sqlx::query(
      "INSERT INTO pending_penalties (user_id, group_id, date, target_points, actual_points, penalty_amount, status, deadline, created_at) VALUES (?1, ?2, ?3, 1, 0, 1.0, 'pending', ?4, ?4)",
    )
    .bind(user_id)
    .bind(group_id)
    .bind(date)
    .bind(Utc::now())
    .execute(&pool)
    .await;
    assert!(duplicate.is_err());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_accept_posts_once() {
    let (pool, group_id, user_id) = setup().await;
    let now = Utc::now();
    let id = seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 1), now).await;

    let posted = accept_penalty(&pool, id, now).await.unwrap();
    assert!(posted.is_some());
    assert!(accept_penalty(&pool, id, now).await.unwrap().is_none());

    let transactions = list_transactions(&pool, user_id).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].penalty_id, Some(id));
    assert_eq!(transactions[0].transaction_type, "penalty");

    let member = load_member(&pool, user_id).await.unwrap();
    assert_eq!(member.total_penalty_owed, 10.0);
    assert_eq!(get_penalty(&pool, id).await.unwrap().status, PenaltyStatus::Accepted);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_sweep_accepts_only_expired() {
    let (pool, group_id, user_id) = setup().await;
    let now = Utc::now();
    let expired = seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 1), now - Duration::hours(1)).await;
    let fresh = seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 2), now + Duration::hours(5)).await;

    let report = auto_accept_expired(&pool, now).await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.accepted, 1);
    assert!(report.errors.is_empty());

    assert_eq!(get_penalty(&pool, expired).await.unwrap().status, PenaltyStatus::Accepted);
    assert_eq!(get_penalty(&pool, fresh).await.unwrap().status, PenaltyStatus::Pending);
    assert_eq!(list_transactions(&pool, user_id).await.unwrap().len(), 1);

    // A second sweep finds nothing left to post
    let again = auto_accept_expired(&pool, now).await.unwrap();
    assert_eq!(again.expired, 0);
    assert_eq!(list_transactions(&pool, user_id).await.unwrap().len(), 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_failed_accept_stays_pending_and_sweep_continues() {
    let (pool, group_id, user_id) = setup().await;
    let now = Utc::now();
    let blocked = seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 1), now - Duration::hours(1)).await;
    let posted = seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 2), now - Duration::hours(1)).await;

    sqlx::query(&format!(
      "CREATE TRIGGER block_transaction BEFORE INSERT ON payment_transactions WHEN NEW.penalty_id = {} \
       BEGIN SELECT RAISE(ABORT, 'ledger unavailable'); END",
      blocked
    ))
    .execute(&pool)
    .await
    .unwrap();

    let report = auto_accept_expired(&pool, now).await.unwrap();
    assert_eq!(report.expired, 2);
    assert_eq!(report.accepted, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with(&format!("penalty {}:", blocked)));

    // The status change rolled back with the failed ledger insert
    let still_pending = get_penalty(&pool, blocked).await.unwrap();
    assert_eq!(still_pending.status, PenaltyStatus::Pending);
    assert!(still_pending.resolved_at.is_none());
    assert_eq!(get_penalty(&pool, posted).await.unwrap().status, PenaltyStatus::Accepted);

    let transactions = list_transactions(&pool, user_id).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].penalty_id, Some(posted));
    assert_eq!(load_member(&pool, user_id).await.unwrap().total_penalty_owed, 10.0);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_dispute_has_no_ledger_effect() {
    let (pool, group_id, user_id) = setup().await;
    let now = Utc::now();
    let id = seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 1), now - Duration::hours(1)).await;

    let disputed = dispute_penalty(&pool, id, user_id, "logged on paper", now).await.unwrap();
    assert_eq!(disputed.status, PenaltyStatus::Disputed);
    assert_eq!(disputed.dispute_reason.as_deref(), Some("logged on paper"));

    // Disputed penalties are not swept even when past the deadline
    let report = auto_accept_expired(&pool, now).await.unwrap();
    assert_eq!(report.expired, 0);
    assert!(list_transactions(&pool, user_id).await.unwrap().is_empty());
    assert_eq!(load_member(&pool, user_id).await.unwrap().total_penalty_owed, 0.0);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_member_cannot_touch_others_or_resolved_penalties() {
    let (pool, group_id, user_id) = setup().await;
    let bob = seed_member(&pool, "bob", Some(group_id)).await;
    let now = Utc::now();
    let id = seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 1), now).await;

    let err = accept_as_member(&pool, id, bob, now).await.unwrap_err();
    assert!(matches!(err, EngineError::PenaltyNotFound(_)));

    let accepted = accept_as_member(&pool, id, user_id, now).await.unwrap();
    assert_eq!(accepted.status, PenaltyStatus::Accepted);

    let err = dispute_penalty(&pool, id, user_id, "too late", now).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { status: PenaltyStatus::Accepted, .. }));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_list_member_penalties_newest_first() {
    let (pool, group_id, user_id) = setup().await;
    let now = Utc::now();
    seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 1), now).await;
    seed_pending_penalty(&pool, user_id, group_id, ymd(2025, 2, 3), now).await;

    let penalties = list_member_penalties(&pool, user_id).await.unwrap();
    assert_eq!(penalties.len(), 2);
    assert_eq!(penalties[0].date, ymd(2025, 2, 3));

    teardown_test_db(pool).await;
  }
}
