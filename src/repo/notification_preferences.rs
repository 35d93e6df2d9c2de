use sqlx::MySqlPool;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct NotificationPreferencesRow {
  pub parent_id: i64,
  pub email_enabled: bool,
  pub push_enabled: bool,
}

pub async fn get_or_default(pool: &MySqlPool, parent_id: i64) -> Result<NotificationPreferencesRow, sqlx::Error> {
  if let Some(row) = sqlx::query_as::<_, NotificationPreferencesRow>(
    "SELECT parent_id, email_enabled, push_enabled FROM notification_preferences WHERE parent_id = ?;",
  )
  .bind(parent_id)
  .fetch_optional(pool)
  .await?
  {
    return Ok(row);
  }

  Ok(NotificationPreferencesRow { parent_id, email_enabled: true, push_enabled: true })
}

pub async fn upsert(pool: &MySqlPool, parent_id: i64, email_enabled: bool, push_enabled: bool) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
      INSERT INTO notification_preferences (parent_id, email_enabled, push_enabled)
      VALUES (?, ?, ?)
      ON DUPLICATE KEY UPDATE
        email_enabled = VALUES(email_enabled),
        push_enabled = VALUES(push_enabled);
    "#,
  )
  .bind(parent_id)
  .bind(email_enabled)
  .bind(push_enabled)
  .execute(pool)
  .await?;
  Ok(())
}
