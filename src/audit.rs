//! Append-only audit trail. No function in this module ever updates or
//! deletes a row — every action taken on behalf of a parent is written once
//! and kept forever.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditActionType {
  UserLogin,
  UserLogout,
  ProfileCreate,
  ProfileUpdate,
  ProfileDelete,
  AccountLink,
  AccountUnlink,
  ScanTriggered,
  ScanCompleted,
  ScanCancelled,
  MarkNotHarmful,
  DataAccessed,
  DataCreated,
  DataUpdated,
  DataDeleted,
  SystemError,
}

impl AuditActionType {
  pub fn as_str(&self) -> &'static str {
    match self {
      AuditActionType::UserLogin => "USER_LOGIN",
      AuditActionType::UserLogout => "USER_LOGOUT",
      AuditActionType::ProfileCreate => "PROFILE_CREATE",
      AuditActionType::ProfileUpdate => "PROFILE_UPDATE",
      AuditActionType::ProfileDelete => "PROFILE_DELETE",
      AuditActionType::AccountLink => "ACCOUNT_LINK",
      AuditActionType::AccountUnlink => "ACCOUNT_UNLINK",
      AuditActionType::ScanTriggered => "SCAN_TRIGGERED",
      AuditActionType::ScanCompleted => "SCAN_COMPLETED",
      AuditActionType::ScanCancelled => "SCAN_CANCELLED",
      AuditActionType::MarkNotHarmful => "MARK_NOT_HARMFUL",
      AuditActionType::DataAccessed => "DATA_ACCESSED",
      AuditActionType::DataCreated => "DATA_CREATED",
      AuditActionType::DataUpdated => "DATA_UPDATED",
      AuditActionType::DataDeleted => "DATA_DELETED",
      AuditActionType::SystemError => "SYSTEM_ERROR",
    }
  }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AuditLogRow {
  pub id: i64,
  pub parent_id: Option<i64>,
  pub action: String,
  pub resource_type: Option<String>,
  pub resource_id: Option<String>,
  pub details: Option<String>,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct AuditLogFilter {
  pub parent_id: Option<i64>,
  pub action: Option<AuditActionType>,
  pub resource_type: Option<String>,
  pub resource_id: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub async fn log_action(
  pool: &MySqlPool,
  action: AuditActionType,
  parent_id: Option<i64>,
  resource_type: Option<&str>,
  resource_id: Option<&str>,
  details: Option<&serde_json::Value>,
  ip_address: Option<&str>,
  user_agent: Option<&str>,
) -> Result<AuditLogRow, sqlx::Error> {
  let details_json = details.map(|v| v.to_string());

  let result = sqlx::query(
    r#"
      INSERT INTO audit_logs (parent_id, action, resource_type, resource_id, details, ip_address, user_agent)
      VALUES (?, ?, ?, ?, ?, ?, ?);
    "#,
  )
  .bind(parent_id)
  .bind(action.as_str())
  .bind(resource_type)
  .bind(resource_id)
  .bind(&details_json)
  .bind(ip_address)
  .bind(user_agent)
  .execute(pool)
  .await?;

  tracing::info!(action = action.as_str(), parent_id, "audit log entry written");

  sqlx::query_as::<_, AuditLogRow>("SELECT * FROM audit_logs WHERE id = ?;")
    .bind(result.last_insert_id() as i64)
    .fetch_one(pool)
    .await
}

pub async fn list(pool: &MySqlPool, filter: &AuditLogFilter) -> Result<Vec<AuditLogRow>, sqlx::Error> {
  sqlx::query_as::<_, AuditLogRow>(
    r#"
      SELECT * FROM audit_logs
      WHERE (? IS NULL OR parent_id = ?)
        AND (? IS NULL OR action = ?)
        AND (? IS NULL OR resource_type = ?)
        AND (? IS NULL OR resource_id = ?)
      ORDER BY created_at DESC
      LIMIT 500;
    "#,
  )
  .bind(filter.parent_id)
  .bind(filter.parent_id)
  .bind(filter.action.map(|a| a.as_str()))
  .bind(filter.action.map(|a| a.as_str()))
  .bind(&filter.resource_type)
  .bind(&filter.resource_type)
  .bind(&filter.resource_id)
  .bind(&filter.resource_id)
  .fetch_all(pool)
  .await
}

pub async fn aggregate_by_action(
  pool: &MySqlPool,
  since: DateTime<Utc>,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
  sqlx::query_as(
    r#"
      SELECT action, COUNT(*) AS cnt
      FROM audit_logs
      WHERE created_at >= ?
      GROUP BY action
      ORDER BY cnt DESC;
    "#,
  )
  .bind(since)
  .fetch_all(pool)
  .await
}

pub async fn aggregate_by_day(
  pool: &MySqlPool,
  since: DateTime<Utc>,
) -> Result<Vec<(NaiveDate, i64)>, sqlx::Error> {
  sqlx::query_as(
    r#"
      SELECT DATE(created_at) AS day, COUNT(*) AS cnt
      FROM audit_logs
      WHERE created_at >= ?
      GROUP BY DATE(created_at)
      ORDER BY day ASC;
    "#,
  )
  .bind(since)
  .fetch_all(pool)
  .await
}
