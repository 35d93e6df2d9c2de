//! YouTube platform fetcher: channel details, recent videos, and (v1 stub)
//! subscribed-channel discovery, all cached through the [`Cache`] port with
//! a 24-hour TTL and a "never cache a failure" invariant.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{self, Cache};
use crate::errors::{NotFoundError, TransientError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDetails {
  pub channel_id: String,
  pub title: String,
  pub description: Option<String>,
  pub thumbnail_url: Option<String>,
  pub subscriber_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSummary {
  pub video_id: String,
  pub title: String,
  pub description: Option<String>,
  pub thumbnail_url: Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  pub duration_seconds: Option<i32>,
  pub view_count: Option<i64>,
  pub like_count: Option<i64>,
}

#[async_trait]
pub trait PlatformFetcher: Send + Sync {
  async fn fetch_channel_details(
    &self,
    cache: &dyn Cache,
    access_token: &str,
    channel_id: &str,
  ) -> Result<ChannelDetails, FetchError>;

  async fn fetch_recent_videos(
    &self,
    cache: &dyn Cache,
    access_token: &str,
    channel_id: &str,
    max_results: u32,
  ) -> Result<Vec<VideoSummary>, FetchError>;

  /// v1 stub: returns a fixed seed list rather than calling the
  /// subscriptions endpoint. See the doc comment on the constant below.
  async fn fetch_subscribed_channels(&self, access_token: &str) -> Result<Vec<String>, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  #[error(transparent)]
  Transient(#[from] TransientError),
  #[error(transparent)]
  NotFound(#[from] NotFoundError),
}

/// YouTube has no "my child's linked channels" concept exposed to this
/// service yet — subscription discovery is stubbed to a known-good seed
/// channel until that surface is built.
const SEED_CHANNEL_ID: &str = "UCBR8-60-B28hp2BmDPdntcQ";

pub struct YoutubeFetcher {
  base_url: String,
  cache_ttl: StdDuration,
}

impl YoutubeFetcher {
  pub fn new(cache_ttl: StdDuration) -> Self {
    YoutubeFetcher { base_url: "https://youtube.googleapis.com/".to_string(), cache_ttl }
  }

  pub fn with_base_url(base_url: &str, cache_ttl: StdDuration) -> Self {
    YoutubeFetcher { base_url: base_url.to_string(), cache_ttl }
  }

  fn build_hub(&self, access_token: &str) -> Result<google_youtube3::YouTube<hyper_util::client::legacy::Client<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>, http_body_util::Full<bytes::Bytes>>>, FetchError> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
      .with_native_roots()
      .map_err(|e| TransientError::PlatformUnavailable(e.to_string()))?
      .https_or_http()
      .enable_http1()
      .build();
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);
    let mut hub = google_youtube3::YouTube::new(client, access_token.to_string());
    hub.base_url(self.base_url.clone());
    hub.root_url(self.base_url.clone());
    Ok(hub)
  }
}

/// Parses an ISO-8601 duration like `PT4M13S` into whole seconds. Returns
/// `None` for anything that doesn't start with `PT`.
fn parse_iso8601_duration(value: &str) -> Option<i32> {
  let rest = value.strip_prefix("PT")?;
  let mut seconds = 0i32;
  let mut number = String::new();
  for ch in rest.chars() {
    match ch {
      '0'..='9' => number.push(ch),
      'H' => {
        seconds += number.parse::<i32>().ok()? * 3600;
        number.clear();
      }
      'M' => {
        seconds += number.parse::<i32>().ok()? * 60;
        number.clear();
      }
      'S' => {
        seconds += number.parse::<i32>().ok()?;
        number.clear();
      }
      _ => return None,
    }
  }
  Some(seconds)
}

/// Resolves the channel id behind an access token, used once at account-link
/// time to identify which YouTube channel the grant belongs to.
pub async fn fetch_my_channel_id(base_url: &str, access_token: &str) -> Result<String, FetchError> {
  let connector = hyper_rustls::HttpsConnectorBuilder::new()
    .with_native_roots()
    .map_err(|e| TransientError::PlatformUnavailable(e.to_string()))?
    .https_or_http()
    .enable_http1()
    .build();
  let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);
  let mut hub = google_youtube3::YouTube::new(client, access_token.to_string());
  hub.base_url(base_url.to_string());
  hub.root_url(base_url.to_string());

  let (_, response) = hub
    .channels()
    .list(&vec!["id".into()])
    .mine(true)
    .doit()
    .await
    .map_err(|e| TransientError::PlatformUnavailable(e.to_string()))?;

  response
    .items
    .unwrap_or_default()
    .into_iter()
    .next()
    .and_then(|item| item.id)
    .ok_or_else(|| NotFoundError::Video("mine".to_string()).into())
}

#[async_trait]
impl PlatformFetcher for YoutubeFetcher {
  async fn fetch_channel_details(
    &self,
    cache: &dyn Cache,
    access_token: &str,
    channel_id: &str,
  ) -> Result<ChannelDetails, FetchError> {
    let cache_key = format!("channel_details:{channel_id}");
    if let Ok(Some(cached)) = cache::get::<ChannelDetails>(cache, &cache_key).await {
      return Ok(cached);
    }

    let hub = self.build_hub(access_token)?;
    let (_, response) = hub
      .channels()
      .list(&vec!["snippet".into(), "statistics".into()])
      .add_id(channel_id)
      .doit()
      .await
      .map_err(|e| TransientError::PlatformUnavailable(e.to_string()))?;

    let item = response
      .items
      .unwrap_or_default()
      .into_iter()
      .next()
      .ok_or_else(|| NotFoundError::Video(channel_id.to_string()))?;

    let snippet = item.snippet.unwrap_or_default();
    let statistics = item.statistics.unwrap_or_default();

    let details = ChannelDetails {
      channel_id: channel_id.to_string(),
      title: snippet.title.unwrap_or_else(|| "Untitled channel".to_string()),
      description: snippet.description,
      thumbnail_url: snippet.thumbnails.and_then(|t| t.default.and_then(|x| x.url)),
      subscriber_count: statistics.subscriber_count.map(|v| v as i64),
    };

    // Do not cache failures: only a successful fetch reaches this line.
    let _ = cache::set(cache, &cache_key, &details, self.cache_ttl).await;
    Ok(details)
  }

  async fn fetch_recent_videos(
    &self,
    cache: &dyn Cache,
    access_token: &str,
    channel_id: &str,
    max_results: u32,
  ) -> Result<Vec<VideoSummary>, FetchError> {
    let cache_key = format!("recent_videos:{channel_id}");
    if let Ok(Some(cached)) = cache::get::<Vec<VideoSummary>>(cache, &cache_key).await {
      return Ok(cached);
    }

    let hub = self.build_hub(access_token)?;
    let (_, search_response) = hub
      .search()
      .list(&vec!["id".into(), "snippet".into()])
      .channel_id(channel_id)
      .order("date")
      .add_type("video")
      .max_results(max_results)
      .doit()
      .await
      .map_err(|e| TransientError::PlatformUnavailable(e.to_string()))?;

    let items = search_response.items.unwrap_or_default();
    let video_ids: Vec<String> = items
      .iter()
      .filter_map(|i| i.id.as_ref().and_then(|id| id.video_id.clone()))
      .collect();

    if video_ids.is_empty() {
      let _ = cache::set(cache, &cache_key, &Vec::<VideoSummary>::new(), self.cache_ttl).await;
      return Ok(Vec::new());
    }

    let (_, videos_response) = hub
      .videos()
      .list(&vec!["snippet".into(), "contentDetails".into(), "statistics".into()])
      .add_id(&video_ids.join(","))
      .doit()
      .await
      .map_err(|e| TransientError::PlatformUnavailable(e.to_string()))?;

    let mut summaries = Vec::with_capacity(video_ids.len());
    for item in videos_response.items.unwrap_or_default() {
      let Some(video_id) = item.id.clone() else { continue };
      let snippet = item.snippet.unwrap_or_default();
      let content_details = item.content_details.unwrap_or_default();
      let statistics = item.statistics.unwrap_or_default();

      summaries.push(VideoSummary {
        video_id,
        title: snippet.title.unwrap_or_else(|| "Untitled video".to_string()),
        description: snippet.description,
        thumbnail_url: snippet.thumbnails.and_then(|t| t.default.and_then(|x| x.url)),
        published_at: snippet.published_at.map(|t| t.to_utc()),
        duration_seconds: content_details.duration.as_deref().and_then(parse_iso8601_duration),
        view_count: statistics.view_count.map(|v| v as i64),
        like_count: statistics.like_count.map(|v| v as i64),
      });
    }

    let _ = cache::set(cache, &cache_key, &summaries, self.cache_ttl).await;
    Ok(summaries)
  }

  async fn fetch_subscribed_channels(&self, _access_token: &str) -> Result<Vec<String>, FetchError> {
    Ok(vec![SEED_CHANNEL_ID.to_string()])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_minutes_and_seconds() {
    assert_eq!(parse_iso8601_duration("PT4M13S"), Some(253));
  }

  #[test]
  fn parses_hours_minutes_seconds() {
    assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
  }

  #[test]
  fn parses_seconds_only() {
    assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
  }

  #[test]
  fn rejects_non_duration_strings() {
    assert_eq!(parse_iso8601_duration("garbage"), None);
  }
}
