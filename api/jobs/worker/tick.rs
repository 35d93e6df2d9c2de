use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use hyper::{HeaderMap, Method, StatusCode};
use serde::Deserialize;
use vercel_runtime::{run, service_fn, Error, Request, Response, ResponseBody};

use guardian_scan::cache::RedisCache;
use guardian_scan::config::AppConfig;
use guardian_scan::db::get_pool;
use guardian_scan::fetcher::youtube::YoutubeFetcher;
use guardian_scan::notifier::{EmailPushNotifier, Notifier};
use guardian_scan::repo::linked_account;
use guardian_scan::worker::{self, ScanOutcome, ScanRequest, ScanWorkerConfig};

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

fn has_tidb_url() -> bool {
  std::env::var("TIDB_DATABASE_URL")
    .or_else(|_| std::env::var("DATABASE_URL"))
    .map(|v| !v.is_empty())
    .unwrap_or(false)
}

fn truncate_string(value: &str, max_chars: usize) -> String {
  value.chars().take(max_chars).collect()
}

fn worker_id() -> String {
  std::env::var("VERCEL_REGION")
    .or_else(|_| std::env::var("VERCEL_ENV"))
    .unwrap_or_else(|_| "local".to_string())
}

#[derive(Deserialize)]
struct TickRequest {
  now_ms: i64,
  limit: Option<i64>,
}

struct ClaimedTask {
  id: i64,
  linked_account_id: i64,
  attempt: i32,
  max_attempt: i32,
}

async fn handle_tick(method: &Method, headers: &HeaderMap, body: Bytes) -> Result<Response<ResponseBody>, Error> {
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

  if !has_tidb_url() {
    return json_response(
      StatusCode::NOT_IMPLEMENTED,
      serde_json::json!({"ok": false, "error": "not_configured", "message": "Missing TIDB_DATABASE_URL (or DATABASE_URL)"}),
    );
  }

  let parsed: TickRequest = match serde_json::from_slice(&body) {
    Ok(v) => v,
    Err(e) => {
      return json_response(
        StatusCode::BAD_REQUEST,
        serde_json::json!({"ok": false, "error": "bad_request", "message": format!("invalid json body: {e}")}),
      );
    }
  };

  if parsed.now_ms <= 0 {
    return json_response(
      StatusCode::BAD_REQUEST,
      serde_json::json!({"ok": false, "error": "bad_request", "message": "now_ms is required"}),
    );
  }

  let limit = parsed.limit.unwrap_or(10).clamp(1, 50);
  let now = Utc.timestamp_millis_opt(parsed.now_ms).single().unwrap_or_else(Utc::now);

  let config = AppConfig::from_env().map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;
  let pool = get_pool().await?;

  let lock_ttl_secs: i64 = std::env::var("SCAN_TASK_LOCK_TTL_SECS")
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(1800)
    .clamp(60, 3600);
  let stale_before = now - Duration::seconds(lock_ttl_secs);

  let reclaimed = sqlx::query(
    r#"
      UPDATE scan_tasks
      SET status='retrying', run_after=?, locked_by=NULL, locked_at=NULL
      WHERE status='running' AND locked_at IS NOT NULL AND locked_at < ?;
    "#,
  )
  .bind(now)
  .bind(stale_before)
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?
  .rows_affected();

  let worker_id = worker_id();

  let mut tx = pool.begin().await.map_err(|e| -> Error { Box::new(e) })?;
  let rows: Vec<(i64, i64, i32, i32)> = sqlx::query_as(
    r#"
      SELECT id, linked_account_id, attempt, max_attempt
      FROM scan_tasks
      WHERE status IN ('pending','retrying') AND run_after <= ?
      ORDER BY id ASC
      LIMIT ?
      FOR UPDATE;
    "#,
  )
  .bind(now)
  .bind(limit)
  .fetch_all(&mut *tx)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  let claimed: Vec<ClaimedTask> = rows
    .into_iter()
    .map(|(id, linked_account_id, attempt, max_attempt)| ClaimedTask { id, linked_account_id, attempt, max_attempt })
    .collect();

  for task in &claimed {
    sqlx::query("UPDATE scan_tasks SET status='running', attempt=attempt+1, locked_by=?, locked_at=? WHERE id=?;")
      .bind(&worker_id)
      .bind(now)
      .bind(task.id)
      .execute(&mut *tx)
      .await
      .map_err(|e| -> Error { Box::new(e) })?;
  }
  tx.commit().await.map_err(|e| -> Error { Box::new(e) })?;

  let cache = RedisCache::connect(&config.redis_url)
    .await
    .map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;
  let fetcher = YoutubeFetcher::new(std::time::Duration::from_secs(config.scan_cache_ttl_seconds));
  let notifier: Box<dyn Notifier> = Box::new(EmailPushNotifier::from_env(config.email_enabled, config.push_enabled));
  let worker_config = ScanWorkerConfig {
    token_encryption_key: config.token_encryption_key.clone(),
    token_refresh_buffer_minutes: config.token_refresh_buffer_minutes,
    scan_max_results_per_channel: config.scan_max_results_per_channel,
  };

  let mut succeeded = 0usize;
  let mut retried = 0usize;
  let mut dead = 0usize;
  let mut last_error: Option<String> = None;

  for task in &claimed {
    let attempt_next = task.attempt.saturating_add(1);

    let account = linked_account::find_by_id(pool, task.linked_account_id)
      .await
      .map_err(|e| -> Error { Box::new(e) })?;
    let Some(account) = account else {
      dead += 1;
      sqlx::query("UPDATE scan_tasks SET status='dead', locked_by=NULL, locked_at=NULL, last_error=? WHERE id=?;")
        .bind("linked account no longer exists")
        .bind(task.id)
        .execute(pool)
        .await
        .map_err(|e| -> Error { Box::new(e) })?;
      continue;
    };

    let request = ScanRequest { linked_account_id: task.linked_account_id, child_profile_id: account.child_profile_id };
    let outcome = worker::perform_account_scan(pool, &cache, &fetcher, notifier.as_ref(), &worker_config, request).await;

    match outcome {
      ScanOutcome::Success { .. } | ScanOutcome::Cancelled { .. } => {
        sqlx::query("UPDATE scan_tasks SET status='succeeded', locked_by=NULL, locked_at=NULL, last_error=NULL WHERE id=?;")
          .bind(task.id)
          .execute(pool)
          .await
          .map_err(|e| -> Error { Box::new(e) })?;
        succeeded += 1;
      }
      ScanOutcome::Failed { reason } => {
        let message = truncate_string(&reason, 2000);
        if last_error.is_none() {
          last_error = Some(message.clone());
        }

        if attempt_next >= task.max_attempt {
          sqlx::query("UPDATE scan_tasks SET status='dead', locked_by=NULL, locked_at=NULL, last_error=? WHERE id=?;")
            .bind(&message)
            .bind(task.id)
            .execute(pool)
            .await
            .map_err(|e| -> Error { Box::new(e) })?;
          dead += 1;
        } else {
          let backoff_seconds = (attempt_next as i64).saturating_mul(60);
          let run_after = now + Duration::seconds(backoff_seconds);
          sqlx::query(
            "UPDATE scan_tasks SET status='retrying', run_after=?, locked_by=NULL, locked_at=NULL, last_error=? WHERE id=?;",
          )
          .bind(run_after)
          .bind(&message)
          .bind(task.id)
          .execute(pool)
          .await
          .map_err(|e| -> Error { Box::new(e) })?;
          retried += 1;
        }
      }
    }
  }

  json_response(
    StatusCode::OK,
    serde_json::json!({
      "ok": true,
      "worker_id": worker_id,
      "reclaimed": reclaimed,
      "claimed": claimed.len(),
      "succeeded": succeeded,
      "retried": retried,
      "dead": dead,
      "last_error": last_error,
    }),
  )
}

async fn handler(req: Request) -> Result<Response<ResponseBody>, Error> {
  let method = req.method().clone();
  let headers = req.headers().clone();
  let bytes = req.into_body().collect().await?.to_bytes();
  handle_tick(&method, &headers, bytes).await
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
    let response = handle_tick(&Method::POST, &headers, Bytes::new()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn returns_not_configured_when_tidb_env_missing() {
    std::env::set_var("RUST_INTERNAL_TOKEN", "secret");
    std::env::remove_var("TIDB_DATABASE_URL");
    std::env::remove_var("DATABASE_URL");

    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Bearer secret".parse().unwrap());
    headers.insert("content-type", "application/json".parse().unwrap());

    let body = Bytes::from(r#"{"now_ms":1700000000000}"#);
    let response = handle_tick(&Method::POST, &headers, body).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
  }
}
