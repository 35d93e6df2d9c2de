use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AnalyzedVideoRow {
  pub id: i64,
  pub channel_id: String,
  pub video_platform_id: String,
  pub title: String,
  pub description: Option<String>,
  pub thumbnail_url: Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  pub duration_seconds: Option<i32>,
  pub view_count: Option<i64>,
  pub like_count: Option<i64>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

pub struct VideoUpsert<'a> {
  pub channel_id: &'a str,
  pub video_platform_id: &'a str,
  pub title: &'a str,
  pub description: Option<&'a str>,
  pub thumbnail_url: Option<&'a str>,
  pub published_at: Option<DateTime<Utc>>,
  pub duration_seconds: Option<i32>,
  pub view_count: Option<i64>,
  pub like_count: Option<i64>,
}

/// `published_at`/`duration_seconds` are immutable once set: they are only
/// written on first insert. Every later call for the same
/// `video_platform_id` refreshes only title/description/thumbnail/stats.
pub async fn upsert(pool: &MySqlPool, video: VideoUpsert<'_>) -> Result<AnalyzedVideoRow, sqlx::Error> {
  sqlx::query(
    r#"
      INSERT INTO analyzed_videos (
        channel_id, video_platform_id, title, description, thumbnail_url,
        published_at, duration_seconds, view_count, like_count
      )
      VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
      ON DUPLICATE KEY UPDATE
        title = VALUES(title),
        description = VALUES(description),
        thumbnail_url = VALUES(thumbnail_url),
        view_count = VALUES(view_count),
        like_count = VALUES(like_count);
    "#,
  )
  .bind(video.channel_id)
  .bind(video.video_platform_id)
  .bind(video.title)
  .bind(video.description)
  .bind(video.thumbnail_url)
  .bind(video.published_at)
  .bind(video.duration_seconds)
  .bind(video.view_count)
  .bind(video.like_count)
  .execute(pool)
  .await?;

  find_by_platform_id(pool, video.video_platform_id)
    .await?
    .ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_platform_id(pool: &MySqlPool, video_platform_id: &str) -> Result<Option<AnalyzedVideoRow>, sqlx::Error> {
  sqlx::query_as::<_, AnalyzedVideoRow>("SELECT * FROM analyzed_videos WHERE video_platform_id = ?;")
    .bind(video_platform_id)
    .fetch_optional(pool)
    .await
}
