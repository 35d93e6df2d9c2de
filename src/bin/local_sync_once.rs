use vercel_runtime::Error;

use guardian_scan::cache::RedisCache;
use guardian_scan::config::AppConfig;
use guardian_scan::db::get_pool;
use guardian_scan::fetcher::youtube::YoutubeFetcher;
use guardian_scan::notifier::EmailPushNotifier;
use guardian_scan::repo::linked_account;
use guardian_scan::worker::{perform_account_scan, ScanOutcome, ScanRequest, ScanWorkerConfig};

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
  args.iter().position(|a| a == flag).and_then(|idx| args.get(idx + 1)).cloned()
}

fn validate_database_url() -> Result<(), Error> {
  let url = std::env::var("TIDB_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")).unwrap_or_default();
  let trimmed = url.trim();
  if trimmed.is_empty() {
    return Err(Box::new(std::io::Error::other("Missing TIDB_DATABASE_URL (or DATABASE_URL)")) as Error);
  }
  if !trimmed.contains("://") {
    return Err(Box::new(std::io::Error::other(
      "Invalid TIDB_DATABASE_URL/DATABASE_URL (expected URL scheme like mysql://...)",
    )) as Error);
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
  validate_database_url()?;
  let args: Vec<String> = std::env::args().collect();

  let linked_account_id = parse_flag_value(&args, "--linked-account-id").and_then(|v| v.trim().parse::<i64>().ok());
  let Some(linked_account_id) = linked_account_id else {
    eprintln!("Missing required --linked-account-id");
    eprintln!("Example: cargo run --bin local_sync_once -- --linked-account-id 42");
    return Ok(());
  };

  let config = AppConfig::from_env().map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;
  let pool = get_pool().await?;

  let account = linked_account::find_by_id(pool, linked_account_id)
    .await
    .map_err(|e| -> Error { Box::new(e) })?
    .ok_or_else(|| -> Error { Box::new(std::io::Error::other("linked account not found")) })?;

  let cache = RedisCache::connect(&config.redis_url)
    .await
    .map_err(|e| -> Error { Box::new(std::io::Error::other(e.to_string())) })?;
  let fetcher = YoutubeFetcher::new(std::time::Duration::from_secs(config.scan_cache_ttl_seconds));
  let notifier = EmailPushNotifier::from_env(config.email_enabled, config.push_enabled);
  let worker_config = ScanWorkerConfig {
    token_encryption_key: config.token_encryption_key.clone(),
    token_refresh_buffer_minutes: config.token_refresh_buffer_minutes,
    scan_max_results_per_channel: config.scan_max_results_per_channel,
  };
  let request = ScanRequest { linked_account_id, child_profile_id: account.child_profile_id };

  let outcome = perform_account_scan(pool, &cache, &fetcher, &notifier, &worker_config, request).await;

  match outcome {
    ScanOutcome::Success { channels_scanned, videos_analyzed, flags_found } => {
      println!(
        "ok=true linked_account_id={linked_account_id} channels_scanned={channels_scanned} videos_analyzed={videos_analyzed} flags_found={flags_found}"
      );
    }
    ScanOutcome::Cancelled { channels_scanned, videos_analyzed, flags_found } => {
      println!(
        "ok=false linked_account_id={linked_account_id} cancelled=true channels_scanned={channels_scanned} videos_analyzed={videos_analyzed} flags_found={flags_found}"
      );
    }
    ScanOutcome::Failed { reason } => {
      println!("ok=false linked_account_id={linked_account_id} reason={reason}");
    }
  }

  Ok(())
}
