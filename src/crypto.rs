//! Symmetric primitives: AES-256-GCM for OAuth token ciphertext at rest, and
//! an HMAC-SHA256 signed envelope for the OAuth `state` parameter.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::IntegrityError;

const NONCE_LEN: usize = 12;
const STATE_TOKEN_TTL_SECONDS: i64 = 3_600;

/// Encrypts `plaintext` under `key` (must be exactly 32 bytes), returning
/// `nonce || ciphertext`.
pub fn encrypt_token(key: &[u8], plaintext: &str) -> Result<Vec<u8>, IntegrityError> {
  let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
  let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
  let ciphertext = cipher
    .encrypt(&nonce, plaintext.as_bytes())
    .map_err(|e| IntegrityError::Decryption(e.to_string()))?;

  let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
  out.extend_from_slice(nonce.as_slice());
  out.extend_from_slice(&ciphertext);
  Ok(out)
}

/// Decrypts a buffer produced by [`encrypt_token`]. Any tampering, wrong
/// key, or malformed buffer surfaces as [`IntegrityError::Decryption`] —
/// never a panic.
pub fn decrypt_token(key: &[u8], payload: &[u8]) -> Result<String, IntegrityError> {
  if payload.len() < NONCE_LEN {
    return Err(IntegrityError::Decryption("ciphertext shorter than nonce".into()));
  }
  let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
  let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
  let nonce = Nonce::from_slice(nonce_bytes);

  let plaintext = cipher
    .decrypt(nonce, ciphertext)
    .map_err(|_| IntegrityError::Decryption("authentication tag mismatch".into()))?;

  String::from_utf8(plaintext).map_err(|e| IntegrityError::Decryption(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct StateEnvelope {
  child_profile_id: i64,
  platform: String,
  parent_id: i64,
  issued_at: i64,
  nonce: String,
}

type HmacSha256 = Hmac<Sha256>;

fn sign_envelope(key: &[u8], envelope_json: &[u8]) -> Vec<u8> {
  let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
  mac.update(envelope_json);
  mac.finalize().into_bytes().to_vec()
}

/// Builds a signed, base64url-encoded `state` parameter carrying the linking
/// context through the OAuth redirect round trip.
pub fn sign_state(
  key: &[u8],
  child_profile_id: i64,
  platform: &str,
  parent_id: i64,
  now_unix: i64,
) -> String {
  use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

  let envelope = StateEnvelope {
    child_profile_id,
    platform: platform.to_string(),
    parent_id,
    issued_at: now_unix,
    nonce: uuid::Uuid::new_v4().to_string(),
  };
  let envelope_json = serde_json::to_vec(&envelope).expect("envelope serializes");
  let signature = sign_envelope(key, &envelope_json);

  format!(
    "{}.{}",
    URL_SAFE_NO_PAD.encode(&envelope_json),
    URL_SAFE_NO_PAD.encode(signature)
  )
}

pub struct VerifiedState {
  pub child_profile_id: i64,
  pub platform: String,
  pub parent_id: i64,
}

/// Verifies signature and expiry (1 hour from issuance) for a token produced
/// by [`sign_state`].
pub fn verify_state(key: &[u8], token: &str, now_unix: i64) -> Result<VerifiedState, IntegrityError> {
  use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
  use subtle_compare::constant_time_eq;

  let (envelope_b64, signature_b64) = token
    .split_once('.')
    .ok_or(IntegrityError::BadStateSignature)?;

  let envelope_json = URL_SAFE_NO_PAD
    .decode(envelope_b64)
    .map_err(|_| IntegrityError::BadStateSignature)?;
  let signature = URL_SAFE_NO_PAD
    .decode(signature_b64)
    .map_err(|_| IntegrityError::BadStateSignature)?;

  let expected_signature = sign_envelope(key, &envelope_json);
  if !constant_time_eq(&signature, &expected_signature) {
    return Err(IntegrityError::BadStateSignature);
  }

  let envelope: StateEnvelope =
    serde_json::from_slice(&envelope_json).map_err(|_| IntegrityError::BadStateSignature)?;

  if now_unix - envelope.issued_at > STATE_TOKEN_TTL_SECONDS {
    return Err(IntegrityError::StateExpired);
  }

  Ok(VerifiedState {
    child_profile_id: envelope.child_profile_id,
    platform: envelope.platform,
    parent_id: envelope.parent_id,
  })
}

/// Minimal constant-time byte comparison, kept local rather than pulled in
/// as a dependency for one function.
mod subtle_compare {
  pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
      return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
      diff |= x ^ y;
    }
    diff == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const KEY: [u8; 32] = [7u8; 32];

  #[test]
  fn token_round_trips() {
    let ciphertext = encrypt_token(&KEY, "ya29.secret-access-token").unwrap();
    let plaintext = decrypt_token(&KEY, &ciphertext).unwrap();
    assert_eq!(plaintext, "ya29.secret-access-token");
  }

  #[test]
  fn token_decrypt_fails_on_tamper() {
    let mut ciphertext = encrypt_token(&KEY, "ya29.secret-access-token").unwrap();
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0xFF;
    assert!(decrypt_token(&KEY, &ciphertext).is_err());
  }

  #[test]
  fn token_decrypt_fails_on_wrong_key() {
    let ciphertext = encrypt_token(&KEY, "ya29.secret-access-token").unwrap();
    let wrong_key = [9u8; 32];
    assert!(decrypt_token(&wrong_key, &ciphertext).is_err());
  }

  #[test]
  fn state_round_trips_within_ttl() {
    let token = sign_state(&KEY, 42, "youtube", 7, 1_000_000);
    let verified = verify_state(&KEY, &token, 1_000_000 + 1_800).unwrap();
    assert_eq!(verified.child_profile_id, 42);
    assert_eq!(verified.platform, "youtube");
    assert_eq!(verified.parent_id, 7);
  }

  #[test]
  fn state_rejected_after_expiry() {
    let token = sign_state(&KEY, 42, "youtube", 7, 1_000_000);
    let err = verify_state(&KEY, &token, 1_000_000 + 3_601).unwrap_err();
    assert!(matches!(err, IntegrityError::StateExpired));
  }

  #[test]
  fn state_rejected_on_tampered_payload() {
    let token = sign_state(&KEY, 42, "youtube", 7, 1_000_000);
    let mut parts = token.splitn(2, '.');
    let envelope_b64 = parts.next().unwrap();
    let signature_b64 = parts.next().unwrap();
    let tampered = format!("{envelope_b64}x.{signature_b64}");
    assert!(verify_state(&KEY, &tampered, 1_000_000).is_err());
  }

  #[test]
  fn state_rejected_with_wrong_signing_key() {
    let token = sign_state(&KEY, 42, "youtube", 7, 1_000_000);
    let wrong_key = [1u8; 32];
    assert!(verify_state(&wrong_key, &token, 1_000_000).is_err());
  }
}
