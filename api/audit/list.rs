use chrono::{DateTime, TimeZone, Utc};
use hyper::{HeaderMap, Method, StatusCode};
use vercel_runtime::{run, service_fn, Error, Request, Response, ResponseBody};

use guardian_scan::audit::{self, AuditActionType, AuditLogFilter};
use guardian_scan::db::get_pool;

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

fn query_value<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
  let query = query?;
  for part in query.split('&') {
    let (k, v) = part.split_once('=')?;
    if k == key {
      return Some(v);
    }
  }
  None
}

fn parse_action(raw: &str) -> Option<AuditActionType> {
  serde_json::from_value(serde_json::Value::String(raw.to_string())).ok()
}

fn parse_since(query: Option<&str>) -> Option<DateTime<Utc>> {
  query_value(query, "since_ms").and_then(|v| v.parse::<i64>().ok()).and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

async fn handle_list(method: &Method, headers: &HeaderMap, query: Option<&str>) -> Result<Response<ResponseBody>, Error> {
  if method != Method::GET {
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

  let filter = AuditLogFilter {
    parent_id: query_value(query, "parent_id").and_then(|v| v.parse::<i64>().ok()),
    action: query_value(query, "action").and_then(parse_action),
    resource_type: query_value(query, "resource_type").map(|v| v.to_string()),
    resource_id: query_value(query, "resource_id").map(|v| v.to_string()),
  };

  let pool = get_pool().await?;
  let entries = audit::list(pool, &filter).await.map_err(|e| -> Error { Box::new(e) })?;

  let mut response = serde_json::json!({"ok": true, "entries": entries});

  if let Some(since) = parse_since(query) {
    let by_action = audit::aggregate_by_action(pool, since).await.map_err(|e| -> Error { Box::new(e) })?;
    let by_day = audit::aggregate_by_day(pool, since).await.map_err(|e| -> Error { Box::new(e) })?;
    response["aggregate_by_action"] = serde_json::json!(by_action);
    response["aggregate_by_day"] = serde_json::json!(
      by_day.into_iter().map(|(day, count)| (day.to_string(), count)).collect::<Vec<_>>()
    );
  }

  json_response(StatusCode::OK, response)
}

async fn handler(req: Request) -> Result<Response<ResponseBody>, Error> {
  let method = req.method().clone();
  let headers = req.headers().clone();
  let query = req.uri().query().map(str::to_string);
  handle_list(&method, &headers, query.as_deref()).await
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
    let response = handle_list(&Method::GET, &headers, None).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  }

  #[test]
  fn parses_screaming_snake_case_action() {
    assert_eq!(parse_action("SCAN_COMPLETED"), Some(AuditActionType::ScanCompleted));
    assert_eq!(parse_action("not_a_real_action"), None);
  }
}
