//! Token custody: decrypts stored credentials, refreshes them through the
//! platform's OAuth endpoint when close to expiry, and re-encrypts the
//! result before it ever touches the database again.

use chrono::{DateTime, Duration, Utc};
use sqlx::MySqlPool;

use crate::audit::{self, AuditActionType};
use crate::crypto::{decrypt_token, encrypt_token};
use crate::errors::AuthFailure;
use crate::providers::youtube::{refresh_tokens, youtube_oauth_client_from_env, YoutubeOAuthTokens};
use crate::repo::linked_account::{self, LinkedAccountRow};

async fn deactivate_on_integrity_failure(pool: &MySqlPool, linked_account_id: i64, reason: &str) {
  let _ = linked_account::deactivate(pool, linked_account_id).await;
  let _ = audit::log_action(
    pool,
    AuditActionType::SystemError,
    None,
    Some("linked_account"),
    Some(&linked_account_id.to_string()),
    Some(&serde_json::json!({ "reason": reason })),
    None,
    None,
  )
  .await;
}

pub struct AuthenticatedClient {
  pub access_token: String,
  pub linked_account_id: i64,
}

fn needs_refresh(expires_at: Option<DateTime<Utc>>, buffer_minutes: i64, now: DateTime<Utc>) -> bool {
  match expires_at {
    Some(expires_at) => expires_at - Duration::minutes(buffer_minutes) <= now,
    None => true,
  }
}

/// Returns a usable access token for `linked_account_id`, refreshing and
/// persisting a new one first if the stored token is within
/// `buffer_minutes` of expiry or already expired.
pub async fn get_authenticated_client(
  pool: &MySqlPool,
  encryption_key: &[u8],
  linked_account_id: i64,
  buffer_minutes: i64,
) -> Result<AuthenticatedClient, AuthFailure> {
  let account = linked_account::find_by_id(pool, linked_account_id)
    .await
    .map_err(|_| AuthFailure::NoTokens(linked_account_id))?
    .ok_or(AuthFailure::NoTokens(linked_account_id))?;

  let now = Utc::now();

  if !needs_refresh(account.token_expires_at, buffer_minutes, now) {
    let access_token = match decrypt_token(encryption_key, &account.access_token_ciphertext) {
      Ok(token) => token,
      Err(_) => {
        deactivate_on_integrity_failure(pool, linked_account_id, "access token ciphertext failed to decrypt").await;
        return Err(AuthFailure::CorruptCiphertext);
      }
    };
    return Ok(AuthenticatedClient { access_token, linked_account_id });
  }

  refresh_and_persist(pool, encryption_key, &account, now).await
}

async fn refresh_and_persist(
  pool: &MySqlPool,
  encryption_key: &[u8],
  account: &LinkedAccountRow,
  now: DateTime<Utc>,
) -> Result<AuthenticatedClient, AuthFailure> {
  let refresh_token_ciphertext = account
    .refresh_token_ciphertext
    .as_ref()
    .ok_or(AuthFailure::NoTokens(account.id))?;
  let refresh_token = match decrypt_token(encryption_key, refresh_token_ciphertext) {
    Ok(token) => token,
    Err(_) => {
      deactivate_on_integrity_failure(pool, account.id, "refresh token ciphertext failed to decrypt").await;
      return Err(AuthFailure::CorruptCiphertext);
    }
  };

  let (client, _redirect) = youtube_oauth_client_from_env()
    .map_err(|e| AuthFailure::RefreshRejected(e.to_string()))?;

  let tokens: YoutubeOAuthTokens = refresh_tokens(&client, &refresh_token)
    .await
    .map_err(|e| AuthFailure::RefreshRejected(e.to_string()))?;

  let access_ciphertext = encrypt_token(encryption_key, &tokens.access_token)
    .map_err(|_| AuthFailure::CorruptCiphertext)?;
  let refresh_ciphertext = match &tokens.refresh_token {
    Some(rt) => Some(encrypt_token(encryption_key, rt).map_err(|_| AuthFailure::CorruptCiphertext)?),
    None => None,
  };
  let expires_at = tokens.expires_in_seconds.map(|secs| now + Duration::seconds(secs as i64));

  linked_account::update_tokens(
    pool,
    account.id,
    &access_ciphertext,
    refresh_ciphertext.as_deref(),
    expires_at,
  )
  .await
  .map_err(|e| AuthFailure::RefreshRejected(e.to_string()))?;

  tracing::info!(linked_account_id = account.id, "refreshed oauth tokens");

  Ok(AuthenticatedClient { access_token: tokens.access_token, linked_account_id: account.id })
}

pub enum RevokeOutcome {
  Revoked,
  AlreadyRevoked,
}

pub async fn revoke(pool: &MySqlPool, linked_account_id: i64) -> Result<RevokeOutcome, AuthFailure> {
  let account = linked_account::find_by_id(pool, linked_account_id)
    .await
    .map_err(|_| AuthFailure::NoTokens(linked_account_id))?
    .ok_or(AuthFailure::NoTokens(linked_account_id))?;

  if account.status != "active" {
    return Ok(RevokeOutcome::AlreadyRevoked);
  }

  linked_account::revoke(pool, linked_account_id)
    .await
    .map_err(|e| AuthFailure::RefreshRejected(e.to_string()))?;

  Ok(RevokeOutcome::Revoked)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn refresh_needed_when_no_expiry_recorded() {
    assert!(needs_refresh(None, 5, Utc::now()));
  }

  #[test]
  fn refresh_needed_inside_buffer_window() {
    let expires_at = Utc::now() + Duration::minutes(3);
    assert!(needs_refresh(Some(expires_at), 5, Utc::now()));
  }

  #[test]
  fn refresh_not_needed_outside_buffer_window() {
    let expires_at = Utc::now() + Duration::minutes(30);
    assert!(!needs_refresh(Some(expires_at), 5, Utc::now()));
  }
}
