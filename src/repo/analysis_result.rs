use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

use crate::analyzer::Severity;
use crate::lexicon::RiskCategory;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AnalysisResultRow {
  pub id: i64,
  pub video_id: i64,
  pub channel_id: String,
  pub risk_category: String,
  pub severity: String,
  pub confidence_score: f64,
  pub keywords_matched: String,
  pub flagged_text: String,
  pub marked_not_harmful: bool,
  pub marked_not_harmful_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

const FLAGGED_TEXT_MAX_CHARS: usize = 200;

pub fn truncate_flagged_text(title: &str, description: &str) -> String {
  format!("{title} {description}").chars().take(FLAGGED_TEXT_MAX_CHARS).collect()
}

fn severity_str(severity: Severity) -> &'static str {
  match severity {
    Severity::High => "high",
    Severity::Medium => "medium",
    Severity::Low => "low",
  }
}

fn severity_rank(severity: &str) -> u8 {
  match severity {
    "high" => 2,
    "medium" => 1,
    _ => 0,
  }
}

/// Creates a row for `(video_id, risk_category)` if none exists yet;
/// otherwise unions the matched-keyword sets and keeps the higher of the
/// old/new severity and confidence score. Runs inside the caller's
/// transaction so concurrent scans of the same video can't race.
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
  tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
  video_id: i64,
  channel_id: &str,
  risk_category: RiskCategory,
  severity: Severity,
  confidence_score: f64,
  keywords: &[&str],
  flagged_text: &str,
) -> Result<AnalysisResultRow, sqlx::Error> {
  let category_str = risk_category.as_wire_str();

  let existing = sqlx::query_as::<_, AnalysisResultRow>(
    "SELECT * FROM analysis_results WHERE video_id = ? AND risk_category = ? FOR UPDATE;",
  )
  .bind(video_id)
  .bind(category_str)
  .fetch_optional(&mut **tx)
  .await?;

  let (merged_keywords, merged_severity, merged_confidence) = match &existing {
    Some(row) => {
      let mut set: HashSet<String> = serde_json::from_str(&row.keywords_matched).unwrap_or_default();
      set.extend(keywords.iter().map(|k| k.to_string()));
      let mut ordered: Vec<String> = set.into_iter().collect();
      ordered.sort();

      let merged_severity = if severity_rank(&row.severity) >= severity_rank(severity_str(severity)) {
        row.severity.clone()
      } else {
        severity_str(severity).to_string()
      };
      let merged_confidence = row.confidence_score.max(confidence_score);
      (ordered, merged_severity, merged_confidence)
    }
    None => {
      let mut ordered: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
      ordered.sort();
      (ordered, severity_str(severity).to_string(), confidence_score)
    }
  };

  let keywords_json = serde_json::to_string(&merged_keywords).unwrap_or_else(|_| "[]".to_string());

  sqlx::query(
    r#"
      INSERT INTO analysis_results (video_id, channel_id, risk_category, severity, confidence_score, keywords_matched, flagged_text)
      VALUES (?, ?, ?, ?, ?, ?, ?)
      ON DUPLICATE KEY UPDATE
        severity = VALUES(severity),
        confidence_score = VALUES(confidence_score),
        keywords_matched = VALUES(keywords_matched),
        flagged_text = VALUES(flagged_text);
    "#,
  )
  .bind(video_id)
  .bind(channel_id)
  .bind(category_str)
  .bind(&merged_severity)
  .bind(merged_confidence)
  .bind(&keywords_json)
  .bind(flagged_text)
  .execute(&mut **tx)
  .await?;

  sqlx::query_as::<_, AnalysisResultRow>("SELECT * FROM analysis_results WHERE video_id = ? AND risk_category = ?;")
    .bind(video_id)
    .bind(category_str)
    .fetch_one(&mut **tx)
    .await
}

pub async fn list_for_video(pool: &MySqlPool, video_id: i64) -> Result<Vec<AnalysisResultRow>, sqlx::Error> {
  sqlx::query_as::<_, AnalysisResultRow>("SELECT * FROM analysis_results WHERE video_id = ?;")
    .bind(video_id)
    .fetch_all(pool)
    .await
}

pub async fn mark_not_harmful(pool: &MySqlPool, analysis_result_id: i64) -> Result<(), sqlx::Error> {
  sqlx::query("UPDATE analysis_results SET marked_not_harmful = 1, marked_not_harmful_at = CURRENT_TIMESTAMP(3) WHERE id = ?;")
    .bind(analysis_result_id)
    .execute(pool)
    .await?;
  Ok(())
}
