use hyper::{HeaderMap, Method, StatusCode};
use vercel_runtime::{run, service_fn, Error, Request, Response, ResponseBody};

use guardian_scan::db::get_pool;
use guardian_scan::repo::alert;

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

  let Some(child_profile_id) = query_value(query, "child_profile_id").and_then(|v| v.parse::<i64>().ok()) else {
    return json_response(
      StatusCode::BAD_REQUEST,
      serde_json::json!({"ok": false, "error": "bad_request", "message": "child_profile_id is required"}),
    );
  };
  let unread_only = query_value(query, "unread_only") == Some("true");

  let pool = get_pool().await?;
  let alerts = alert::list_for_child(pool, child_profile_id, unread_only)
    .await
    .map_err(|e| -> Error { Box::new(e) })?;

  json_response(StatusCode::OK, serde_json::json!({"ok": true, "alerts": alerts}))
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
  fn parses_child_profile_id_from_query() {
    assert_eq!(query_value(Some("child_profile_id=42&unread_only=true"), "child_profile_id"), Some("42"));
    assert_eq!(query_value(Some("child_profile_id=42&unread_only=true"), "unread_only"), Some("true"));
  }
}
