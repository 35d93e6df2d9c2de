//! Typed domain errors. Bin entrypoints still collapse everything into
//! `vercel_runtime::Error` at the boundary, matching the teacher's style;
//! internal modules propagate one of these instead of a boxed trait object
//! so callers can branch on failure kind.

use vercel_runtime::Error as VercelError;

#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
  #[error("linked account {0} has no stored tokens")]
  NoTokens(i64),
  #[error("refresh token rejected by provider: {0}")]
  RefreshRejected(String),
  #[error("token payload failed integrity check")]
  CorruptCiphertext,
}

#[derive(Debug, thiserror::Error)]
pub enum TransientError {
  #[error("platform request failed: {0}")]
  PlatformUnavailable(String),
  #[error("cache backend unavailable: {0}")]
  CacheUnavailable(String),
  #[error("database unavailable: {0}")]
  DatabaseUnavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NotFoundError {
  #[error("linked account {0} not found")]
  LinkedAccount(i64),
  #[error("child profile {0} not found")]
  ChildProfile(i64),
  #[error("video {0} not found on platform")]
  Video(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
  #[error("decryption failed: {0}")]
  Decryption(String),
  #[error("state token signature invalid")]
  BadStateSignature,
  #[error("state token expired")]
  StateExpired,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
  #[error("{field} is required")]
  Missing { field: &'static str },
  #[error("{field} has an invalid value: {reason}")]
  Invalid { field: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
  #[error(transparent)]
  Auth(#[from] AuthFailure),
  #[error(transparent)]
  Transient(#[from] TransientError),
  #[error(transparent)]
  NotFound(#[from] NotFoundError),
  #[error(transparent)]
  Integrity(#[from] IntegrityError),
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error("sql error: {0}")]
  Sql(#[from] sqlx::Error),
}

pub fn boxed(err: impl std::error::Error + Send + Sync + 'static) -> VercelError {
  Box::new(err)
}
