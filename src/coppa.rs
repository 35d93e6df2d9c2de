//! Under-13 account-linking gate. A child profile with no birth date on
//! file or who is 13+ is always allowed; otherwise linking requires an
//! active verification, which two submission methods grant immediately and
//! the rest leave pending.

use chrono::Utc;
use sqlx::MySqlPool;

use crate::audit::{self, AuditActionType};
use crate::repo::child_profile;
use crate::repo::coppa_verification::{self, CoppaVerificationRow, VerificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoppaDecision {
  Allowed,
  RequiresVerification,
  Pending,
}

/// Methods that can stand in for a parent's identity verification directly,
/// without a human review step.
fn auto_approves(verification_method: &str) -> bool {
  matches!(verification_method, "credit_card" | "digital_signature")
}

pub async fn ensure_allowed(pool: &MySqlPool, child_profile_id: i64, platform: &str) -> Result<CoppaDecision, sqlx::Error> {
  let Some(child) = child_profile::find_by_id(pool, child_profile_id).await? else {
    return Ok(CoppaDecision::RequiresVerification);
  };

  let age = child.age_years(Utc::now().date_naive());
  if age.map(|a| a >= 13).unwrap_or(true) {
    return Ok(CoppaDecision::Allowed);
  }

  match coppa_verification::find_active_or_pending(pool, child_profile_id, platform).await? {
    Some(row) if row.status == "VERIFIED" => Ok(CoppaDecision::Allowed),
    Some(row) if row.status == "PENDING" => Ok(CoppaDecision::Pending),
    _ => Ok(CoppaDecision::RequiresVerification),
  }
}

pub async fn submit_verification(
  pool: &MySqlPool,
  parent_id: i64,
  child_profile_id: i64,
  platform: &str,
  verification_method: &str,
  details: Option<&serde_json::Value>,
) -> Result<CoppaVerificationRow, sqlx::Error> {
  let status = if auto_approves(verification_method) {
    VerificationStatus::Verified
  } else {
    VerificationStatus::Pending
  };

  let row = coppa_verification::create(pool, child_profile_id, platform, verification_method, status, details).await?;

  audit::log_action(
    pool,
    AuditActionType::DataCreated,
    Some(parent_id),
    Some("coppa_verification"),
    Some(&row.id.to_string()),
    Some(&serde_json::json!({ "verification_method": verification_method, "status": row.status })),
    None,
    None,
  )
  .await?;

  Ok(row)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn credit_card_auto_approves() {
    assert!(auto_approves("credit_card"));
  }

  #[test]
  fn digital_signature_auto_approves() {
    assert!(auto_approves("digital_signature"));
  }

  #[test]
  fn consent_form_does_not_auto_approve() {
    assert!(!auto_approves("consent_form"));
  }
}
