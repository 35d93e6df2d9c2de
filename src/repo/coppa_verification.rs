use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

const VERIFICATION_VALIDITY_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
  Verified,
  Pending,
  Rejected,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CoppaVerificationRow {
  pub id: i64,
  pub child_profile_id: i64,
  pub platform: String,
  pub verification_method: String,
  pub status: String,
  pub details: Option<String>,
  pub verified_at: Option<DateTime<Utc>>,
  pub expires_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

pub async fn create(
  pool: &MySqlPool,
  child_profile_id: i64,
  platform: &str,
  verification_method: &str,
  status: VerificationStatus,
  details: Option<&serde_json::Value>,
) -> Result<CoppaVerificationRow, sqlx::Error> {
  let status_str = match status {
    VerificationStatus::Verified => "VERIFIED",
    VerificationStatus::Pending => "PENDING",
    VerificationStatus::Rejected => "REJECTED",
  };
  let details_json = details.map(|v| v.to_string());

  let now = Utc::now();
  let (verified_at, expires_at) = if status == VerificationStatus::Verified {
    (Some(now), Some(now + Duration::days(VERIFICATION_VALIDITY_DAYS)))
  } else {
    (None, None)
  };

  let result = sqlx::query(
    r#"
      INSERT INTO coppa_verifications (child_profile_id, platform, verification_method, status, details, verified_at, expires_at)
      VALUES (?, ?, ?, ?, ?, ?, ?);
    "#,
  )
  .bind(child_profile_id)
  .bind(platform)
  .bind(verification_method)
  .bind(status_str)
  .bind(&details_json)
  .bind(verified_at)
  .bind(expires_at)
  .execute(pool)
  .await?;

  find_by_id(pool, result.last_insert_id() as i64).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<CoppaVerificationRow>, sqlx::Error> {
  sqlx::query_as::<_, CoppaVerificationRow>("SELECT * FROM coppa_verifications WHERE id = ?;")
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Matches a PENDING row regardless of age, or a VERIFIED row whose
/// `expires_at` is still in the future — an expired VERIFIED row is
/// treated as if it didn't exist, forcing re-verification.
pub async fn find_active_or_pending(
  pool: &MySqlPool,
  child_profile_id: i64,
  platform: &str,
) -> Result<Option<CoppaVerificationRow>, sqlx::Error> {
  sqlx::query_as::<_, CoppaVerificationRow>(
    r#"
      SELECT * FROM coppa_verifications
      WHERE child_profile_id = ? AND platform = ?
        AND (
          status = 'PENDING'
          OR (status = 'VERIFIED' AND expires_at IS NOT NULL AND expires_at > ?)
        )
      ORDER BY
        CASE status WHEN 'VERIFIED' THEN 0 ELSE 1 END,
        created_at DESC
      LIMIT 1;
    "#,
  )
  .bind(child_profile_id)
  .bind(platform)
  .bind(Utc::now())
  .fetch_optional(pool)
  .await
}
