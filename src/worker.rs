//! Scan Worker: the central orchestrator. Takes one linked account, fetches
//! its subscribed channels and their recent videos, runs each through the
//! risk analyzer, persists results, and synthesizes alerts.

use std::collections::HashSet;
use std::time::Duration as StdDuration;

use sqlx::MySqlPool;
use tokio::time::timeout;

use crate::alerts;
use crate::analyzer::{self, Severity};
use crate::audit::{self, AuditActionType};
use crate::cache::Cache;
use crate::coppa::{self, CoppaDecision};
use crate::custodian;
use crate::errors::TransientError;
use crate::fetcher::youtube::PlatformFetcher;
use crate::lexicon::RiskCategory;
use crate::notifier::Notifier;
use crate::repo::analysis_result::truncate_flagged_text;
use crate::repo::{analysis_result, analyzed_video, linked_account, subscribed_channel};

const SCAN_HARD_TIMEOUT: StdDuration = StdDuration::from_secs(30 * 60);
const SCAN_LEASE_TTL: StdDuration = StdDuration::from_secs(30 * 60);
const SCAN_CANCEL_TTL: StdDuration = StdDuration::from_secs(30 * 60);

pub struct ScanRequest {
  pub linked_account_id: i64,
  pub child_profile_id: i64,
}

#[derive(Debug)]
pub enum ScanOutcome {
  Success { channels_scanned: usize, videos_analyzed: usize, flags_found: usize },
  Cancelled { channels_scanned: usize, videos_analyzed: usize, flags_found: usize },
  Failed { reason: String },
}

fn cancel_key(linked_account_id: i64) -> String {
  format!("scan_cancel:{linked_account_id}")
}

/// Requests cancellation of any in-progress scan for `linked_account_id`.
/// The worker observes this at each progress checkpoint and before every
/// per-video iteration; it does not interrupt work already underway.
pub async fn request_cancellation(cache: &dyn Cache, linked_account_id: i64) -> Result<(), TransientError> {
  cache.set_raw(&cancel_key(linked_account_id), "1".to_string(), SCAN_CANCEL_TTL).await
}

async fn is_cancelled(cache: &dyn Cache, linked_account_id: i64) -> bool {
  matches!(cache.get_raw(&cancel_key(linked_account_id)).await, Ok(Some(_)))
}

/// Holds the per-account lease for the lifetime of a scan. Call
/// [`ScanLease::release`] on every exit path — `Drop` only warns if that was
/// forgotten, since releasing a cache entry is inherently async and can't
/// run from a synchronous destructor.
struct ScanLease<'a> {
  cache: &'a dyn Cache,
  key: String,
  released: bool,
}

impl<'a> ScanLease<'a> {
  async fn acquire(cache: &'a dyn Cache, linked_account_id: i64) -> Result<Option<ScanLease<'a>>, ()> {
    let key = format!("scan_lease:{linked_account_id}");
    match cache.acquire_lease(&key, SCAN_LEASE_TTL).await {
      Ok(true) => Ok(Some(ScanLease { cache, key, released: false })),
      Ok(false) => Ok(None),
      Err(_) => Err(()),
    }
  }

  async fn release(mut self) {
    let _ = self.cache.release_lease(&self.key).await;
    self.released = true;
  }
}

impl Drop for ScanLease<'_> {
  fn drop(&mut self) {
    if !self.released {
      tracing::warn!(key = %self.key, "scan lease dropped without explicit release");
    }
  }
}

pub struct ScanWorkerConfig {
  pub token_encryption_key: Vec<u8>,
  pub token_refresh_buffer_minutes: i64,
  pub scan_max_results_per_channel: u32,
}

pub async fn perform_account_scan(
  pool: &MySqlPool,
  cache: &dyn Cache,
  fetcher: &dyn PlatformFetcher,
  notifier: &dyn Notifier,
  config: &ScanWorkerConfig,
  request: ScanRequest,
) -> ScanOutcome {
  match timeout(SCAN_HARD_TIMEOUT, run_scan(pool, cache, fetcher, notifier, config, &request)).await {
    Ok(outcome) => outcome,
    Err(_) => {
      audit_failure(pool, &request, "scan exceeded the 30 minute hard timeout").await;
      ScanOutcome::Failed { reason: "timeout".to_string() }
    }
  }
}

async fn audit_failure(pool: &MySqlPool, request: &ScanRequest, reason: &str) {
  let _ = audit::log_action(
    pool,
    AuditActionType::SystemError,
    None,
    Some("linked_account"),
    Some(&request.linked_account_id.to_string()),
    Some(&serde_json::json!({ "reason": reason })),
    None,
    None,
  )
  .await;
}

async fn audit_cancelled(pool: &MySqlPool, request: &ScanRequest, channels_scanned: usize, videos_analyzed: usize, flags_found: usize) {
  let _ = audit::log_action(
    pool,
    AuditActionType::ScanCancelled,
    None,
    Some("linked_account"),
    Some(&request.linked_account_id.to_string()),
    Some(&serde_json::json!({
      "channels_scanned": channels_scanned,
      "videos_analyzed": videos_analyzed,
      "flags_found": flags_found,
    })),
    None,
    None,
  )
  .await;
}

async fn run_scan(
  pool: &MySqlPool,
  cache: &dyn Cache,
  fetcher: &dyn PlatformFetcher,
  notifier: &dyn Notifier,
  config: &ScanWorkerConfig,
  request: &ScanRequest,
) -> ScanOutcome {
  let _ = audit::log_action(
    pool,
    AuditActionType::ScanTriggered,
    None,
    Some("linked_account"),
    Some(&request.linked_account_id.to_string()),
    None,
    None,
    None,
  )
  .await;

  let Some(account) = linked_account::find_by_id(pool, request.linked_account_id).await.ok().flatten() else {
    audit_failure(pool, request, "linked account not found").await;
    return ScanOutcome::Failed { reason: "linked_account_not_found".to_string() };
  };

  let lease = match ScanLease::acquire(cache, request.linked_account_id).await {
    Ok(Some(lease)) => lease,
    Ok(None) => return ScanOutcome::Failed { reason: "scan already in progress".to_string() },
    Err(_) => {
      audit_failure(pool, request, "cache unavailable while acquiring scan lease").await;
      return ScanOutcome::Failed { reason: "cache_unavailable".to_string() };
    }
  };

  let outcome = run_scan_under_lease(pool, fetcher, notifier, cache, config, request, &account).await;
  lease.release().await;
  outcome
}

async fn run_scan_under_lease(
  pool: &MySqlPool,
  fetcher: &dyn PlatformFetcher,
  notifier: &dyn Notifier,
  cache: &dyn Cache,
  config: &ScanWorkerConfig,
  request: &ScanRequest,
  account: &linked_account::LinkedAccountRow,
) -> ScanOutcome {
  match coppa::ensure_allowed(pool, request.child_profile_id, &account.platform).await {
    Ok(CoppaDecision::Allowed) => {}
    Ok(_) => {
      audit_failure(pool, request, "coppa verification required or pending").await;
      return ScanOutcome::Failed { reason: "coppa_not_allowed".to_string() };
    }
    Err(e) => {
      audit_failure(pool, request, &format!("coppa lookup failed: {e}")).await;
      return ScanOutcome::Failed { reason: "coppa_lookup_failed".to_string() };
    }
  }

  let client = match custodian::get_authenticated_client(
    pool,
    &config.token_encryption_key,
    request.linked_account_id,
    config.token_refresh_buffer_minutes,
  )
  .await
  {
    Ok(client) => client,
    Err(e) => {
      audit_failure(pool, request, &format!("token custody failed: {e}")).await;
      return ScanOutcome::Failed { reason: "auth_failed".to_string() };
    }
  };

  let channel_ids = match fetcher.fetch_subscribed_channels(&client.access_token).await {
    Ok(ids) => ids,
    Err(e) => {
      audit_failure(pool, request, &format!("fetching subscribed channels failed: {e}")).await;
      return ScanOutcome::Failed { reason: "fetch_channels_failed".to_string() };
    }
  };

  let mut videos_analyzed = 0usize;
  let mut flags_found = 0usize;
  let mut observed_categories: HashSet<RiskCategory> = HashSet::new();
  let mut worst_severity = Severity::Low;

  'channels: for channel_id in &channel_ids {
    if is_cancelled(cache, request.linked_account_id).await {
      audit_cancelled(pool, request, channel_ids.len(), videos_analyzed, flags_found).await;
      return ScanOutcome::Cancelled { channels_scanned: channel_ids.len(), videos_analyzed, flags_found };
    }

    let details = match fetcher.fetch_channel_details(cache, &client.access_token, channel_id).await {
      Ok(details) => details,
      Err(_) => continue,
    };

    if is_cancelled(cache, request.linked_account_id).await {
      audit_cancelled(pool, request, channel_ids.len(), videos_analyzed, flags_found).await;
      return ScanOutcome::Cancelled { channels_scanned: channel_ids.len(), videos_analyzed, flags_found };
    }

    let _ = subscribed_channel::upsert(
      pool,
      request.linked_account_id,
      channel_id,
      Some(&details.title),
      details.thumbnail_url.as_deref(),
    )
    .await;

    if is_cancelled(cache, request.linked_account_id).await {
      audit_cancelled(pool, request, channel_ids.len(), videos_analyzed, flags_found).await;
      return ScanOutcome::Cancelled { channels_scanned: channel_ids.len(), videos_analyzed, flags_found };
    }

    let videos = match fetcher
      .fetch_recent_videos(cache, &client.access_token, channel_id, config.scan_max_results_per_channel)
      .await
    {
      Ok(videos) => videos,
      Err(_) => continue,
    };

    for video in videos {
      if is_cancelled(cache, request.linked_account_id).await {
        audit_cancelled(pool, request, channel_ids.len(), videos_analyzed, flags_found).await;
        return ScanOutcome::Cancelled { channels_scanned: channel_ids.len(), videos_analyzed, flags_found };
      }

      let Ok(video_row) = analyzed_video::upsert(
        pool,
        analyzed_video::VideoUpsert {
          channel_id,
          video_platform_id: &video.video_id,
          title: &video.title,
          description: video.description.as_deref(),
          thumbnail_url: video.thumbnail_url.as_deref(),
          published_at: video.published_at,
          duration_seconds: video.duration_seconds,
          view_count: video.view_count,
          like_count: video.like_count,
        },
      )
      .await
      else {
        continue;
      };

      videos_analyzed += 1;

      let verdict = analyzer::analyze_content(&video.title, video.description.as_deref().unwrap_or(""));
      if !verdict.has_risk {
        continue;
      }

      if matches!(verdict.overall_severity, Severity::High)
        || (matches!(verdict.overall_severity, Severity::Medium) && matches!(worst_severity, Severity::Low))
      {
        worst_severity = verdict.overall_severity;
      }

      let flagged_text = truncate_flagged_text(&video.title, video.description.as_deref().unwrap_or(""));

      let Ok(mut tx) = pool.begin().await else { continue };
      for (category, keywords) in &verdict.categorized_keywords {
        if analysis_result::upsert(
          &mut tx,
          video_row.id,
          channel_id,
          *category,
          verdict.overall_severity,
          verdict.confidence_score,
          keywords,
          &flagged_text,
        )
        .await
        .is_ok()
        {
          observed_categories.insert(*category);
          flags_found += keywords.len();
        }
      }
      let _ = tx.commit().await;
    }

    if is_cancelled(cache, request.linked_account_id).await {
      break 'channels;
    }
  }

  if is_cancelled(cache, request.linked_account_id).await {
    audit_cancelled(pool, request, channel_ids.len(), videos_analyzed, flags_found).await;
    return ScanOutcome::Cancelled { channels_scanned: channel_ids.len(), videos_analyzed, flags_found };
  }

  let _ =
    alerts::create_scan_complete_alert(pool, notifier, request.child_profile_id, channel_ids.len(), videos_analyzed, flags_found)
      .await;

  if !observed_categories.is_empty() {
    let _ = alerts::create_new_flags_alert(pool, notifier, request.child_profile_id, &observed_categories, worst_severity).await;
  }

  let _ = audit::log_action(
    pool,
    AuditActionType::ScanCompleted,
    None,
    Some("linked_account"),
    Some(&request.linked_account_id.to_string()),
    Some(&serde_json::json!({
      "channels_scanned": channel_ids.len(),
      "videos_analyzed": videos_analyzed,
      "flags_found": flags_found,
    })),
    None,
    None,
  )
  .await;

  ScanOutcome::Success { channels_scanned: channel_ids.len(), videos_analyzed, flags_found }
}
