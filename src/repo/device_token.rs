use sqlx::MySqlPool;

pub async fn register(pool: &MySqlPool, parent_id: i64, push_token: &str, platform: &str) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
      INSERT INTO device_tokens (parent_id, push_token, platform)
      VALUES (?, ?, ?)
      ON DUPLICATE KEY UPDATE platform = VALUES(platform);
    "#,
  )
  .bind(parent_id)
  .bind(push_token)
  .bind(platform)
  .execute(pool)
  .await?;
  Ok(())
}

pub async fn list_for_parent(pool: &MySqlPool, parent_id: i64) -> Result<Vec<String>, sqlx::Error> {
  sqlx::query_scalar("SELECT push_token FROM device_tokens WHERE parent_id = ?;")
    .bind(parent_id)
    .fetch_all(pool)
    .await
}
