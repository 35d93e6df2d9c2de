use vercel_runtime::Error;

use guardian_scan::config::AppConfig;
use guardian_scan::custodian::get_authenticated_client;
use guardian_scan::db::get_pool;

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
  args.iter().position(|a| a == flag).and_then(|idx| args.get(idx + 1)).cloned()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
  let args: Vec<String> = std::env::args().collect();

  let linked_account_id = parse_flag_value(&args, "--linked-account-id")
    .and_then(|v| v.trim().parse::<i64>().ok());
  let Some(linked_account_id) = linked_account_id else {
    eprintln!("Missing required --linked-account-id");
    return Ok(());
  };

  let config = AppConfig::from_env().map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;
  let pool = get_pool().await?;

  let authenticated = get_authenticated_client(pool, &config.token_encryption_key, linked_account_id, config.token_refresh_buffer_minutes)
    .await
    .map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;

  let connector = hyper_rustls::HttpsConnectorBuilder::new()
    .with_native_roots()
    .map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?
    .https_or_http()
    .enable_http1()
    .build();
  let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

  let mut hub = google_youtube3::YouTube::new(client, authenticated.access_token.clone());
  hub.base_url("https://youtube.googleapis.com/".to_string());
  hub.root_url("https://youtube.googleapis.com/".to_string());

  let (_, response) = hub
    .channels()
    .list(&vec!["id".into(), "snippet".into()])
    .mine(true)
    .doit()
    .await
    .map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;

  let items = response.items.unwrap_or_default();
  println!("ok=true linked_account_id={} channels_count={}", linked_account_id, items.len());
  for ch in items {
    let id = ch.id.unwrap_or_else(|| "unknown".to_string());
    let title = ch.snippet.as_ref().and_then(|s| s.title.clone()).unwrap_or_else(|| "unknown".to_string());
    println!("- {id}  {title}");
  }

  Ok(())
}
