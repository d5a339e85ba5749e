use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How long a member has to accept or dispute before auto-acceptance
pub const PENALTY_RESPONSE_WINDOW_HOURS: i64 = 24;

/// Ledger entry type written when a penalty is accepted
pub const TRANSACTION_TYPE_PENALTY: &str = "penalty";

// ---------------------------------------------------------------------------
/// Penalty Status: pending -> accepted | disputed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PenaltyStatus {
  #[default]
  Pending,
  /// Terminal here; external review may revisit it
  Disputed,
  /// Terminal, ledger posted
  Accepted,
}

impl std::fmt::Display for PenaltyStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Pending => write!(f, "pending"),
      Self::Disputed => write!(f, "disputed"),
      Self::Accepted => write!(f, "accepted"),
    }
  }
}

impl std::str::FromStr for PenaltyStatus {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "disputed" => Ok(Self::Disputed),
      "accepted" => Ok(Self::Accepted),
      _ => Err(format!("Unknown penalty status: {}", s)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PendingPenalty {
  pub id: i64,
  pub user_id: i64,
  pub group_id: i64,
  pub date: NaiveDate,
  pub target_points: i64,
  pub actual_points: i64,
  pub penalty_amount: f64,
  pub status: PenaltyStatus,
  pub deadline: DateTime<Utc>,
  pub dispute_reason: Option<String>,
  pub resolved_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

impl PendingPenalty {
  /// Still pending and past its response deadline
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.status == PenaltyStatus::Pending && self.deadline < now
  }
}

/// For inserting a new penalty (without id, status, timestamps)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPendingPenalty {
  pub user_id: i64,
  pub group_id: i64,
  pub date: NaiveDate,
  pub target_points: i64,
  pub actual_points: i64,
  pub penalty_amount: f64,
}

impl NewPendingPenalty {
  pub fn deadline_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(PENALTY_RESPONSE_WINDOW_HOURS)
  }
}

/// Append-only ledger row, written only when a penalty becomes accepted
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
  pub id: i64,
  pub user_id: i64,
  pub group_id: i64,
  pub penalty_id: Option<i64>,
  pub amount: f64,
  pub transaction_type: String,
  pub description: String,
  pub created_at: DateTime<Utc>,
}
