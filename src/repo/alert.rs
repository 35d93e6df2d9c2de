use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
  ScanComplete,
  NewFlags,
}

impl AlertType {
  pub fn as_str(&self) -> &'static str {
    match self {
      AlertType::ScanComplete => "SCAN_COMPLETE",
      AlertType::NewFlags => "NEW_FLAGS",
    }
  }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AlertRow {
  pub id: i64,
  pub child_profile_id: i64,
  pub alert_type: String,
  pub title: String,
  pub message: String,
  pub severity: String,
  pub summary_data: String,
  pub is_read: bool,
  pub read_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
  pool: &MySqlPool,
  child_profile_id: i64,
  alert_type: AlertType,
  title: &str,
  message: &str,
  severity: &str,
  summary_data: &serde_json::Value,
) -> Result<AlertRow, sqlx::Error> {
  let result = sqlx::query(
    r#"
      INSERT INTO alerts (child_profile_id, alert_type, title, message, severity, summary_data)
      VALUES (?, ?, ?, ?, ?, ?);
    "#,
  )
  .bind(child_profile_id)
  .bind(alert_type.as_str())
  .bind(title)
  .bind(message)
  .bind(severity)
  .bind(summary_data.to_string())
  .execute(pool)
  .await?;

  sqlx::query_as::<_, AlertRow>("SELECT * FROM alerts WHERE id = ?;")
    .bind(result.last_insert_id() as i64)
    .fetch_one(pool)
    .await
}

pub async fn list_for_child(
  pool: &MySqlPool,
  child_profile_id: i64,
  unread_only: bool,
) -> Result<Vec<AlertRow>, sqlx::Error> {
  sqlx::query_as::<_, AlertRow>(
    r#"
      SELECT * FROM alerts
      WHERE child_profile_id = ? AND (? = 0 OR is_read = 0)
      ORDER BY created_at DESC
      LIMIT 200;
    "#,
  )
  .bind(child_profile_id)
  .bind(unread_only as i32)
  .fetch_all(pool)
  .await
}

pub async fn mark_read(pool: &MySqlPool, alert_id: i64) -> Result<(), sqlx::Error> {
  sqlx::query("UPDATE alerts SET is_read = 1, read_at = CURRENT_TIMESTAMP(3) WHERE id = ?;")
    .bind(alert_id)
    .execute(pool)
    .await?;
  Ok(())
}

pub async fn mark_all_read(pool: &MySqlPool, child_profile_id: i64) -> Result<u64, sqlx::Error> {
  let result = sqlx::query(
    "UPDATE alerts SET is_read = 1, read_at = CURRENT_TIMESTAMP(3) WHERE child_profile_id = ? AND is_read = 0;",
  )
  .bind(child_profile_id)
  .execute(pool)
  .await?;
  Ok(result.rows_affected())
}
