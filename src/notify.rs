//! Outbound notifications
//!
//! Push notifications go to an external webhook collaborator; group summaries
//! are written to the chat message table. Both are best-effort: callers log
//! failures and carry on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use url::Url;

use crate::error::EngineResult;
use crate::models::PendingPenalty;

// ---------------------------------------------------------------------------
// Push payloads
// ---------------------------------------------------------------------------

const PENALTY_ICON: &str = "/icons/icon-192x192.png";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
  pub penalty_id: i64,
  pub date: NaiveDate,
  pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub tag: String,
  pub data: PushData,
}

impl PushPayload {
  pub fn for_penalty(penalty: &PendingPenalty, app_base_url: &str) -> Self {
    Self {
      title: "Daily target missed".to_string(),
      body: format!(
        "You logged {} of {} points on {}. Accept or dispute within 24 hours.",
        penalty.actual_points, penalty.target_points, penalty.date
      ),
      icon: PENALTY_ICON.to_string(),
      tag: format!("penalty-{}", penalty.id),
      data: PushData {
        penalty_id: penalty.id,
        date: penalty.date,
        url: app_base_url.to_string(),
      },
    }
  }
}

// ---------------------------------------------------------------------------
// Push transport
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("Push request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Push endpoint returned {status}: {body}")]
  Rejected { status: u16, body: String },
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
  async fn send(&self, user_id: i64, payload: &PushPayload) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookRequest<'a> {
  user_id: i64,
  notification: &'a PushPayload,
}

/// Posts notifications as JSON to a push delivery webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client: Client,
  endpoint: Url,
}

impl WebhookNotifier {
  pub fn new(endpoint: Url) -> Self {
    Self {
      client: Client::new(),
      endpoint,
    }
  }
}

#[async_trait]
impl PushNotifier for WebhookNotifier {
  async fn send(&self, user_id: i64, payload: &PushPayload) -> Result<(), NotifyError> {
    let response = self
      .client
      .post(self.endpoint.clone())
      .json(&WebhookRequest {
        user_id,
        notification: payload,
      })
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      return Err(NotifyError::Rejected { status, body });
    }

    Ok(())
  }
}

/// Used when no push endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl PushNotifier for DisabledNotifier {
  async fn send(&self, user_id: i64, payload: &PushPayload) -> Result<(), NotifyError> {
    tracing::debug!(user_id, tag = %payload.tag, "Push disabled, dropping notification");
    Ok(())
  }
}

// ---------------------------------------------------------------------------
// Chat summary sink
// ---------------------------------------------------------------------------

pub const SYSTEM_MESSAGE_TYPE: &str = "system";

/// Post a system message into a group's chat
pub async fn post_group_message(
  pool: &SqlitePool,
  group_id: i64,
  message: &str,
  now: DateTime<Utc>,
) -> EngineResult<()> {
  sqlx::query(
    "INSERT INTO chat_messages (group_id, user_id, message, message_type, created_at) VALUES (?1, NULL, ?2, ?3, ?4)",
  )
  .bind(group_id)
  .bind(message)
  .bind(SYSTEM_MESSAGE_TYPE)
  .bind(now)
  .execute(pool)
  .await?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::PenaltyStatus;
  use crate::test_utils::*;
  use mockito::Matcher;
  use serde_json::json;

  fn penalty() -> PendingPenalty {
    let now = Utc::now();
    PendingPenalty {
      id: 42,
      user_id: 7,
      group_id: 1,
      date: ymd(2025, 3, 9),
      target_points: 100,
      actual_points: 65,
      penalty_amount: 10.0,
      status: PenaltyStatus::Pending,
      deadline: now,
      dispute_reason: None,
      resolved_at: None,
      created_at: now,
    }
  }

  #[test]
  fn test_payload_carries_penalty_id() {
    let payload = PushPayload::for_penalty(&penalty(), "https://app.example/penalties");
    assert_eq!(payload.tag, "penalty-42");
    assert_eq!(payload.data.penalty_id, 42);
    assert!(payload.body.contains("65 of 100"));

    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["data"]["penaltyId"], 42);
    assert_eq!(value["data"]["date"], "2025-03-09");
  }

  #[tokio::test]
  async fn test_webhook_posts_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/push")
      .match_header("content-type", "application/json")
      .match_body(Matcher::PartialJson(json!({
        "userId": 7,
        "notification": { "tag": "penalty-42", "data": { "penaltyId": 42 } }
      })))
      .with_status(201)
      .create_async()
      .await;

    let endpoint = Url::parse(&format!("{}/push", server.url())).unwrap();
    let notifier = WebhookNotifier::new(endpoint);
    notifier
      .send(7, &PushPayload::for_penalty(&penalty(), "/"))
      .await
      .unwrap();

    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_webhook_rejection_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("POST", "/push")
      .with_status(410)
      .with_body("subscription gone")
      .create_async()
      .await;

    let endpoint = Url::parse(&format!("{}/push", server.url())).unwrap();
    let err = WebhookNotifier::new(endpoint)
      .send(7, &PushPayload::for_penalty(&penalty(), "/"))
      .await
      .unwrap_err();

    match err {
      NotifyError::Rejected { status, body } => {
        assert_eq!(status, 410);
        assert_eq!(body, "subscription gone");
      }
      other => panic!("expected rejection, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_group_message_written_as_system() {
    let pool = setup_test_db().await;
    let group_id = seed_group(&pool, "crew", ymd(2025, 1, 1), "[]", "[]", 5.0).await;

    post_group_message(&pool, group_id, "hello", Utc::now()).await.unwrap();

    let (message, kind): (String, String) =
      sqlx::query_as("SELECT message, message_type FROM chat_messages WHERE group_id = ?1")
        .bind(group_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(message, "hello");
    assert_eq!(kind, "system");

    teardown_test_db(pool).await;
  }
}
