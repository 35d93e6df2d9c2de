use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SubscribedChannelRow {
  pub id: i64,
  pub linked_account_id: i64,
  pub channel_id: String,
  pub title: Option<String>,
  pub thumbnail_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

pub async fn upsert(
  pool: &MySqlPool,
  linked_account_id: i64,
  channel_id: &str,
  title: Option<&str>,
  thumbnail_url: Option<&str>,
) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
      INSERT INTO subscribed_channels (linked_account_id, channel_id, title, thumbnail_url)
      VALUES (?, ?, ?, ?)
      ON DUPLICATE KEY UPDATE
        title = VALUES(title),
        thumbnail_url = VALUES(thumbnail_url);
    "#,
  )
  .bind(linked_account_id)
  .bind(channel_id)
  .bind(title)
  .bind(thumbnail_url)
  .execute(pool)
  .await?;
  Ok(())
}

pub async fn list_for_account(pool: &MySqlPool, linked_account_id: i64) -> Result<Vec<SubscribedChannelRow>, sqlx::Error> {
  sqlx::query_as::<_, SubscribedChannelRow>("SELECT * FROM subscribed_channels WHERE linked_account_id = ?;")
    .bind(linked_account_id)
    .fetch_all(pool)
    .await
}
