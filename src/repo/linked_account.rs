use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct LinkedAccountRow {
  pub id: i64,
  pub child_profile_id: i64,
  pub platform: String,
  pub platform_account_id: String,
  pub display_name: Option<String>,
  #[serde(skip_serializing)]
  pub access_token_ciphertext: Vec<u8>,
  #[serde(skip_serializing)]
  pub refresh_token_ciphertext: Option<Vec<u8>>,
  pub token_type: String,
  pub scope: Option<String>,
  pub token_expires_at: Option<DateTime<Utc>>,
  pub status: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

pub struct NewTokens<'a> {
  pub access_token_ciphertext: &'a [u8],
  pub refresh_token_ciphertext: Option<&'a [u8]>,
  pub token_type: &'a str,
  pub scope: Option<&'a str>,
  pub token_expires_at: Option<DateTime<Utc>>,
}

pub enum LinkOutcome {
  Created(LinkedAccountRow),
  Updated(LinkedAccountRow),
}

/// Matches an existing account by `(child_profile_id, platform,
/// platform_account_id)`: if found, refreshes tokens and re-activates it in
/// place; otherwise creates a new row.
pub async fn link(
  pool: &MySqlPool,
  child_profile_id: i64,
  platform: &str,
  platform_account_id: &str,
  display_name: Option<&str>,
  tokens: NewTokens<'_>,
) -> Result<LinkOutcome, sqlx::Error> {
  let existing = sqlx::query_as::<_, LinkedAccountRow>(
    "SELECT * FROM linked_accounts WHERE child_profile_id = ? AND platform = ? AND platform_account_id = ?;",
  )
  .bind(child_profile_id)
  .bind(platform)
  .bind(platform_account_id)
  .fetch_optional(pool)
  .await?;

  if let Some(row) = existing {
    sqlx::query(
      r#"
        UPDATE linked_accounts
        SET display_name = ?, access_token_ciphertext = ?, refresh_token_ciphertext = ?,
            token_type = ?, scope = ?, token_expires_at = ?, status = 'active'
        WHERE id = ?;
      "#,
    )
    .bind(display_name)
    .bind(tokens.access_token_ciphertext)
    .bind(tokens.refresh_token_ciphertext)
    .bind(tokens.token_type)
    .bind(tokens.scope)
    .bind(tokens.token_expires_at)
    .bind(row.id)
    .execute(pool)
    .await?;

    let updated = find_by_id(pool, row.id).await?.ok_or(sqlx::Error::RowNotFound)?;
    Ok(LinkOutcome::Updated(updated))
  } else {
    let result = sqlx::query(
      r#"
        INSERT INTO linked_accounts (
          child_profile_id, platform, platform_account_id, display_name,
          access_token_ciphertext, refresh_token_ciphertext, token_type, scope, token_expires_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);
      "#,
    )
    .bind(child_profile_id)
    .bind(platform)
    .bind(platform_account_id)
    .bind(display_name)
    .bind(tokens.access_token_ciphertext)
    .bind(tokens.refresh_token_ciphertext)
    .bind(tokens.token_type)
    .bind(tokens.scope)
    .bind(tokens.token_expires_at)
    .execute(pool)
    .await?;

    let created = find_by_id(pool, result.last_insert_id() as i64)
      .await?
      .ok_or(sqlx::Error::RowNotFound)?;
    Ok(LinkOutcome::Created(created))
  }
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<LinkedAccountRow>, sqlx::Error> {
  sqlx::query_as::<_, LinkedAccountRow>("SELECT * FROM linked_accounts WHERE id = ?;")
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_active(pool: &MySqlPool) -> Result<Vec<LinkedAccountRow>, sqlx::Error> {
  sqlx::query_as::<_, LinkedAccountRow>("SELECT * FROM linked_accounts WHERE status = 'active';")
    .fetch_all(pool)
    .await
}

pub async fn update_tokens(
  pool: &MySqlPool,
  id: i64,
  access_token_ciphertext: &[u8],
  refresh_token_ciphertext: Option<&[u8]>,
  token_expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
      UPDATE linked_accounts
      SET access_token_ciphertext = ?, refresh_token_ciphertext = COALESCE(?, refresh_token_ciphertext),
          token_expires_at = ?
      WHERE id = ?;
    "#,
  )
  .bind(access_token_ciphertext)
  .bind(refresh_token_ciphertext)
  .bind(token_expires_at)
  .bind(id)
  .execute(pool)
  .await?;
  Ok(())
}

pub async fn revoke(pool: &MySqlPool, id: i64) -> Result<(), sqlx::Error> {
  sqlx::query("UPDATE linked_accounts SET status = 'revoked' WHERE id = ?;")
    .bind(id)
    .execute(pool)
    .await?;
  Ok(())
}

/// Marks the account unusable after an unrecoverable integrity failure
/// (e.g. ciphertext that no longer decrypts). Distinct from [`revoke`],
/// which is a user-initiated unlink.
pub async fn deactivate(pool: &MySqlPool, id: i64) -> Result<(), sqlx::Error> {
  sqlx::query("UPDATE linked_accounts SET status = 'inactive' WHERE id = ?;")
    .bind(id)
    .execute(pool)
    .await?;
  Ok(())
}
