//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seed helpers for groups, members, logs and penalties

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::models::PenaltyStatus;
use crate::points::ExerciseCategory;

// ---------------------------------------------------------------------------
// Database Test Utilities
// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

// ---------------------------------------------------------------------------
// Seed Helpers
// ---------------------------------------------------------------------------

/// Insert a group with legacy rule columns, returning its id
pub async fn seed_group(
  pool: &SqlitePool,
  name: &str,
  start_date: NaiveDate,
  rest_days: &str,
  recovery_days: &str,
  penalty_amount: f64,
) -> i64 {
  sqlx::query(
    "INSERT INTO groups (name, start_date, rest_days, recovery_days, penalty_amount) VALUES (?1, ?2, ?3, ?4, ?5)",
  )
  .bind(name)
  .bind(start_date)
  .bind(rest_days)
  .bind(recovery_days)
  .bind(penalty_amount)
  .execute(pool)
  .await
  .expect("Failed to seed group")
  .last_insert_rowid()
}

pub async fn seed_group_settings(
  pool: &SqlitePool,
  group_id: i64,
  rest_days: &str,
  recovery_days: &str,
  penalty_amount: f64,
) {
  sqlx::query(
    "INSERT INTO group_settings (group_id, rest_days, recovery_days, penalty_amount) VALUES (?1, ?2, ?3, ?4)",
  )
  .bind(group_id)
  .bind(rest_days)
  .bind(recovery_days)
  .bind(penalty_amount)
  .execute(pool)
  .await
  .expect("Failed to seed group settings");
}

/// Insert a member in sane mode with no flags set
pub async fn seed_member(pool: &SqlitePool, username: &str, group_id: Option<i64>) -> i64 {
  sqlx::query("INSERT INTO members (username, group_id) VALUES (?1, ?2)")
    .bind(username)
    .bind(group_id)
    .execute(pool)
    .await
    .expect("Failed to seed member")
    .last_insert_rowid()
}

pub async fn set_sick_mode(pool: &SqlitePool, user_id: i64, sick: bool) {
  sqlx::query("UPDATE members SET is_sick_mode = ?1 WHERE id = ?2")
    .bind(sick)
    .bind(user_id)
    .execute(pool)
    .await
    .expect("Failed to set sick mode");
}

pub async fn set_flexible_rest_day(pool: &SqlitePool, user_id: i64, enabled: bool) {
  sqlx::query("UPDATE members SET has_flexible_rest_day = ?1 WHERE id = ?2")
    .bind(enabled)
    .bind(user_id)
    .execute(pool)
    .await
    .expect("Failed to set flexible rest day");
}

pub async fn seed_session(pool: &SqlitePool, token: &str, user_id: i64, expires_at: DateTime<Utc>) {
  sqlx::query("INSERT INTO member_sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)")
    .bind(token)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await
    .expect("Failed to seed session");
}

pub async fn seed_exercise(pool: &SqlitePool, name: &str, category: ExerciseCategory) -> i64 {
  sqlx::query("INSERT INTO exercises (name, category) VALUES (?1, ?2)")
    .bind(name)
    .bind(category)
    .execute(pool)
    .await
    .expect("Failed to seed exercise")
    .last_insert_rowid()
}

pub async fn seed_log(pool: &SqlitePool, user_id: i64, exercise_id: i64, date: NaiveDate, points: i64) {
  sqlx::query("INSERT INTO exercise_logs (user_id, exercise_id, date, points) VALUES (?1, ?2, ?3, ?4)")
    .bind(user_id)
    .bind(exercise_id)
    .bind(date)
    .bind(points)
    .execute(pool)
    .await
    .expect("Failed to seed exercise log");
}

pub async fn seed_sick_record(pool: &SqlitePool, user_id: i64, date: NaiveDate) {
  sqlx::query("INSERT INTO sick_records (user_id, date) VALUES (?1, ?2)")
    .bind(user_id)
    .bind(date)
    .execute(pool)
    .await
    .expect("Failed to seed sick record");
}

/// Activate a recovery day on `used_date`; the week key is that week's Sunday
pub async fn seed_activation(
  pool: &SqlitePool,
  user_id: i64,
  used_date: NaiveDate,
  recovery_minutes: i64,
  is_complete: bool,
) -> i64 {
  let week_start = used_date - Duration::days(used_date.weekday().num_days_from_sunday() as i64);
  sqlx::query(
    r#"
    INSERT INTO recovery_day_activations (user_id, used_date, week_start_date, recovery_minutes, is_complete)
    VALUES (?1, ?2, ?3, ?4, ?5)
    "#,
  )
  .bind(user_id)
  .bind(used_date)
  .bind(week_start)
  .bind(recovery_minutes)
  .bind(is_complete)
  .execute(pool)
  .await
  .expect("Failed to seed recovery day activation")
  .last_insert_rowid()
}

/// Insert a pending penalty of 10.0 (target 10, actual 0) with an explicit deadline
pub async fn seed_pending_penalty(
  pool: &SqlitePool,
  user_id: i64,
  group_id: i64,
  date: NaiveDate,
  deadline: DateTime<Utc>,
) -> i64 {
  sqlx::query(
    r#"
    INSERT INTO pending_penalties (
      user_id, group_id, date, target_points, actual_points,
      penalty_amount, status, deadline, created_at
    )
    VALUES (?1, ?2, ?3, 10, 0, 10.0, ?4, ?5, ?6)
    "#,
  )
  .bind(user_id)
  .bind(group_id)
  .bind(date)
  .bind(PenaltyStatus::Pending)
  .bind(deadline)
  .bind(Utc::now())
  .execute(pool)
  .await
  .expect("Failed to seed pending penalty")
  .last_insert_rowid()
}

// ---------------------------------------------------------------------------
// Time Helpers
// ---------------------------------------------------------------------------

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, day).expect("Invalid test date")
}

/// Create a DateTime N days ago from now
pub fn datetime_days_ago(days: i64) -> DateTime<Utc> {
  Utc::now() - Duration::days(days)
}

// ---------------------------------------------------------------------------
// Tests for Test Utilities
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    // Verify key tables exist
    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('members', 'pending_penalties', 'payment_transactions')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 3, "Expected 3 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_activation_keys_week_on_sunday() {
    let pool = setup_test_db().await;
    let group_id = seed_group(&pool, "crew", ymd(2025, 1, 1), "[]", "[]", 10.0).await;
    let user_id = seed_member(&pool, "alice", Some(group_id)).await;

    // Friday 2025-01-10 belongs to the week starting Sunday 2025-01-05
    seed_activation(&pool, user_id, ymd(2025, 1, 10), 5, false).await;
    let week_start: NaiveDate =
      sqlx::query_scalar("SELECT week_start_date FROM recovery_day_activations WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .expect("Failed to read activation");

    assert_eq!(week_start, ymd(2025, 1, 5));

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_datetime_helpers_produce_correct_dates() {
    let now = Utc::now();
    let past = datetime_days_ago(7);

    let diff = now - past;
    // Allow for slight timing differences (6-8 days is acceptable)
    assert!(diff.num_days() >= 6 && diff.num_days() <= 8,
            "Expected ~7 days difference, got {}", diff.num_days());
  }
}
