use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ParentUserRow {
  pub id: i64,
  pub email: String,
  pub display_name: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

pub async fn create(pool: &MySqlPool, email: &str, display_name: Option<&str>) -> Result<ParentUserRow, sqlx::Error> {
  let result = sqlx::query("INSERT INTO parent_users (email, display_name) VALUES (?, ?);")
    .bind(email)
    .bind(display_name)
    .execute(pool)
    .await?;
  find_by_id(pool, result.last_insert_id() as i64).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<ParentUserRow>, sqlx::Error> {
  sqlx::query_as::<_, ParentUserRow>("SELECT * FROM parent_users WHERE id = ?;")
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_email(pool: &MySqlPool, email: &str) -> Result<Option<ParentUserRow>, sqlx::Error> {
  sqlx::query_as::<_, ParentUserRow>("SELECT * FROM parent_users WHERE email = ?;")
    .bind(email)
    .fetch_optional(pool)
    .await
}
