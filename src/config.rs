//! Central read of the handful of settings the worker and custodian need at
//! construction time. Per-request toggles (bearer tokens, schedule query
//! params) are still read ad hoc at each handler, matching the rest of this
//! codebase.

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub database_url: String,
  pub redis_url: String,
  pub token_encryption_key: Vec<u8>,
  pub state_signing_key: Vec<u8>,
  pub youtube_client_id: String,
  pub youtube_client_secret: String,
  pub youtube_redirect_uri: String,
  pub email_enabled: bool,
  pub push_enabled: bool,
  pub scan_max_results_per_channel: u32,
  pub scan_cache_ttl_seconds: u64,
  pub token_refresh_buffer_minutes: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("missing required environment variable: {0}")]
  Missing(&'static str),
  #[error("environment variable {0} is not valid base64: {1}")]
  InvalidBase64(&'static str, base64::DecodeError),
  #[error("environment variable {0} must decode to exactly {1} bytes")]
  WrongKeyLength(&'static str, usize),
}

fn require(key: &'static str) -> Result<String, ConfigError> {
  std::env::var(key)
    .ok()
    .filter(|v| !v.is_empty())
    .ok_or(ConfigError::Missing(key))
}

fn decode_key(key: &'static str, expected_len: usize) -> Result<Vec<u8>, ConfigError> {
  use base64::{engine::general_purpose::STANDARD, Engine};
  let raw = require(key)?;
  let bytes = STANDARD
    .decode(&raw)
    .map_err(|e| ConfigError::InvalidBase64(key, e))?;
  if bytes.len() != expected_len {
    return Err(ConfigError::WrongKeyLength(key, expected_len));
  }
  Ok(bytes)
}

fn env_flag(key: &str, default: bool) -> bool {
  std::env::var(key)
    .ok()
    .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
    .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
  std::env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
  std::env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
  std::env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let database_url = std::env::var("TIDB_DATABASE_URL")
      .or_else(|_| std::env::var("DATABASE_URL"))
      .map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

    Ok(AppConfig {
      database_url,
      redis_url: require("REDIS_URL")?,
      token_encryption_key: decode_key("TOKEN_ENCRYPTION_KEY", 32)?,
      state_signing_key: decode_key("SECRET_KEY", 32)?,
      youtube_client_id: require("YOUTUBE_CLIENT_ID")?,
      youtube_client_secret: require("YOUTUBE_CLIENT_SECRET")?,
      youtube_redirect_uri: require("YOUTUBE_REDIRECT_URI")?,
      email_enabled: env_flag("EMAIL_ENABLED", false),
      push_enabled: env_flag("PUSH_ENABLED", false),
      scan_max_results_per_channel: env_u32("SCAN_MAX_RESULTS_PER_CHANNEL", 25),
      scan_cache_ttl_seconds: env_u64("SCAN_CACHE_TTL_SECONDS", 86_400),
      token_refresh_buffer_minutes: env_i64("TOKEN_REFRESH_BUFFER_MINUTES", 5),
    })
  }
}
