//! Enumerates active linked accounts and enqueues one scan task per account
//! per day, deduplicated so re-running the dispatch for the same day is a
//! no-op.

use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::audit::{self, AuditActionType};
use crate::repo::linked_account;

pub struct DispatchOutcome {
  pub candidates: usize,
  pub run_for_dt: NaiveDate,
}

pub async fn run_daily_tick(pool: &MySqlPool, run_for_dt: NaiveDate) -> Result<DispatchOutcome, sqlx::Error> {
  let accounts = linked_account::list_active(pool).await?;

  for account in &accounts {
    let dedupe_key = format!("{}:daily:{}", account.id, run_for_dt);
    sqlx::query(
      r#"
        INSERT INTO scan_tasks (linked_account_id, dedupe_key, status)
        VALUES (?, ?, 'pending')
        ON DUPLICATE KEY UPDATE updated_at = CURRENT_TIMESTAMP(3);
      "#,
    )
    .bind(account.id)
    .bind(&dedupe_key)
    .execute(pool)
    .await?;
  }

  let _ = audit::log_action(
    pool,
    AuditActionType::ScanTriggered,
    None,
    Some("scheduler"),
    Some(&run_for_dt.to_string()),
    Some(&serde_json::json!({ "candidates": accounts.len() })),
    None,
    None,
  )
  .await;

  Ok(DispatchOutcome { candidates: accounts.len(), run_for_dt })
}
