use bytes::Bytes;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use hyper::{HeaderMap, Method, StatusCode};
use serde::Deserialize;
use vercel_runtime::{run, service_fn, Error, Request, Response, ResponseBody};

use guardian_scan::audit::{self, AuditActionType};
use guardian_scan::config::AppConfig;
use guardian_scan::coppa::{self, CoppaDecision};
use guardian_scan::crypto::{encrypt_token, verify_state};
use guardian_scan::db::get_pool;
use guardian_scan::fetcher::youtube::fetch_my_channel_id;
use guardian_scan::providers::youtube::{exchange_code_for_tokens, youtube_oauth_client_from_config};
use guardian_scan::repo::linked_account::{self, LinkOutcome, NewTokens};

fn bearer_token(header_value: Option<&str>) -> Option<&str> {
  let value = header_value?;
  value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Result<Response<ResponseBody>, Error> {
  Ok(
    Response::builder()
      .status(status)
      .header("content-type", "application/json; charset=utf-8")
      .body(ResponseBody::from(value))?,
  )
}

#[derive(Deserialize)]
struct ExchangeRequest {
  code: String,
  state: String,
}

fn coppa_status_str(decision: CoppaDecision) -> &'static str {
  match decision {
    CoppaDecision::Allowed => "allowed",
    CoppaDecision::Pending => "pending",
    CoppaDecision::RequiresVerification => "requires_verification",
  }
}

async fn handle_exchange(method: &Method, headers: &HeaderMap, body: Bytes) -> Result<Response<ResponseBody>, Error> {
  if method != Method::POST {
    return json_response(
      StatusCode::METHOD_NOT_ALLOWED,
      serde_json::json!({"ok": false, "error": "method_not_allowed"}),
    );
  }

  let expected = std::env::var("RUST_INTERNAL_TOKEN").unwrap_or_default();
  let provided = bearer_token(headers.get("authorization").and_then(|v| v.to_str().ok())).unwrap_or("");

  if expected.is_empty() || provided != expected {
    return json_response(
      StatusCode::UNAUTHORIZED,
      serde_json::json!({"ok": false, "error": "unauthorized"}),
    );
  }

  let config = AppConfig::from_env().map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;

  let parsed: ExchangeRequest = serde_json::from_slice(&body).map_err(|e| -> Error {
    Box::new(std::io::Error::other(format!("invalid json body: {e}")))
  })?;

  if parsed.code.is_empty() || parsed.state.is_empty() {
    return json_response(
      StatusCode::BAD_REQUEST,
      serde_json::json!({"ok": false, "error": "bad_request", "message": "code and state are required"}),
    );
  }

  let verified = match verify_state(&config.state_signing_key, &parsed.state, Utc::now().timestamp()) {
    Ok(v) => v,
    Err(_) => {
      return json_response(
        StatusCode::UNAUTHORIZED,
        serde_json::json!({"ok": false, "error": "invalid_state"}),
      )
    }
  };

  let (client, _redirect) =
    youtube_oauth_client_from_config(&config.youtube_client_id, &config.youtube_client_secret, &config.youtube_redirect_uri)?;
  let tokens = exchange_code_for_tokens(&client, &parsed.code).await?;
  let platform_account_id = fetch_my_channel_id("https://youtube.googleapis.com/", &tokens.access_token)
    .await
    .map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;

  let access_ciphertext = encrypt_token(&config.token_encryption_key, &tokens.access_token)
    .map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;
  let refresh_ciphertext = match &tokens.refresh_token {
    Some(rt) => Some(
      encrypt_token(&config.token_encryption_key, rt).map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?,
    ),
    None => None,
  };
  let token_expires_at = tokens.expires_in_seconds.map(|secs| Utc::now() + Duration::seconds(secs as i64));

  let pool = get_pool().await?;

  let outcome = linked_account::link(
    pool,
    verified.child_profile_id,
    &verified.platform,
    &platform_account_id,
    None,
    NewTokens {
      access_token_ciphertext: &access_ciphertext,
      refresh_token_ciphertext: refresh_ciphertext.as_deref(),
      token_type: &tokens.token_type,
      scope: tokens.scope.as_deref(),
      token_expires_at,
    },
  )
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  let account = match &outcome {
    LinkOutcome::Created(row) => row,
    LinkOutcome::Updated(row) => row,
  };

  audit::log_action(
    pool,
    AuditActionType::AccountLink,
    Some(verified.parent_id),
    Some("linked_account"),
    Some(&account.id.to_string()),
    Some(&serde_json::json!({ "platform": verified.platform })),
    None,
    None,
  )
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  let decision = coppa::ensure_allowed(pool, verified.child_profile_id, &verified.platform)
    .await
    .map_err(|e| -> Error { Box::new(e) })?;

  json_response(
    StatusCode::OK,
    serde_json::json!({
      "ok": true,
      "linked_account_id": account.id,
      "coppa_status": coppa_status_str(decision),
    }),
  )
}

async fn handler(req: Request) -> Result<Response<ResponseBody>, Error> {
  let method = req.method().clone();
  let headers = req.headers().clone();
  let bytes = req.into_body().collect().await?.to_bytes();
  handle_exchange(&method, &headers, bytes).await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
  run(service_fn(handler)).await
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn returns_unauthorized_when_missing_internal_token() {
    std::env::set_var("RUST_INTERNAL_TOKEN", "secret");

    let headers = HeaderMap::new();
    let response = handle_exchange(&Method::POST, &headers, Bytes::new()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  }
}
