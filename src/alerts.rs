//! Alert synthesis: turns a finished scan into the alert rows a parent sees,
//! and fans delivery out to the [`Notifier`] port. A scan always produces a
//! `SCAN_COMPLETE` alert; it additionally produces a `NEW_FLAGS` alert only
//! when the scan actually found risky content.

use std::collections::HashSet;

use sqlx::MySqlPool;

use crate::analyzer::Severity;
use crate::lexicon::RiskCategory;
use crate::notifier::Notifier;
use crate::repo::alert::{self, AlertRow, AlertType};
use crate::repo::{child_profile, device_token, notification_preferences, parent_user};

fn severity_str(severity: Severity) -> &'static str {
  match severity {
    Severity::High => "high",
    Severity::Medium => "medium",
    Severity::Low => "low",
  }
}

async fn deliver(pool: &MySqlPool, notifier: &dyn Notifier, child_profile_id: i64, subject: &str, body: &str) {
  let Ok(Some(child)) = child_profile::find_by_id(pool, child_profile_id).await else {
    return;
  };
  let Ok(prefs) = notification_preferences::get_or_default(pool, child.parent_id).await else {
    return;
  };

  if prefs.email_enabled {
    if let Ok(Some(parent)) = parent_user::find_by_id(pool, child.parent_id).await {
      notifier.send_email(&parent.email, subject, body).await;
    }
  }

  if prefs.push_enabled {
    if let Ok(tokens) = device_token::list_for_parent(pool, child.parent_id).await {
      for token in tokens {
        notifier.send_push(&token, subject, body).await;
      }
    }
  }
}

pub async fn create_scan_complete_alert(
  pool: &MySqlPool,
  notifier: &dyn Notifier,
  child_profile_id: i64,
  channels_scanned: usize,
  videos_analyzed: usize,
  flagged_count: usize,
) -> Result<AlertRow, sqlx::Error> {
  let summary = serde_json::json!({
    "channels_scanned": channels_scanned,
    "videos_analyzed": videos_analyzed,
    "flagged_count": flagged_count,
  });

  let title = "Scan complete";
  let message = format!(
    "Scanned {channels_scanned} channel(s), analyzed {videos_analyzed} video(s), {flagged_count} flagged."
  );

  let row = alert::create(pool, child_profile_id, AlertType::ScanComplete, title, &message, "low", &summary).await?;

  deliver(pool, notifier, child_profile_id, title, &message).await;

  Ok(row)
}

/// Scoped to the categories observed during this scan run only.
pub async fn create_new_flags_alert(
  pool: &MySqlPool,
  notifier: &dyn Notifier,
  child_profile_id: i64,
  categories: &HashSet<RiskCategory>,
  overall_severity: Severity,
) -> Result<Option<AlertRow>, sqlx::Error> {
  if categories.is_empty() {
    return Ok(None);
  }

  let mut category_names: Vec<&'static str> = categories.iter().map(|c| c.as_wire_str()).collect();
  category_names.sort();

  let summary = serde_json::json!({ "categories": category_names });
  let severity = severity_str(overall_severity);
  let title = "New content flags found";
  let message = format!("Risk categories detected: {}", category_names.join(", "));
  let row = alert::create(pool, child_profile_id, AlertType::NewFlags, title, &message, severity, &summary).await?;

  deliver(pool, notifier, child_profile_id, title, &message).await;

  Ok(Some(row))
}

pub async fn mark_read(pool: &MySqlPool, alert_id: i64) -> Result<(), sqlx::Error> {
  alert::mark_read(pool, alert_id).await
}

pub async fn mark_all_read(pool: &MySqlPool, child_profile_id: i64) -> Result<u64, sqlx::Error> {
  alert::mark_all_read(pool, child_profile_id).await
}
