//! Outbound notification port. Delivery failures are logged and swallowed —
//! a parent missing one push notification must never fail a scan.

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send_email(&self, to: &str, subject: &str, body: &str) -> bool;
  async fn send_push(&self, device_token: &str, title: &str, body: &str) -> bool;
}

/// Console-only notifier for local dev and tests, matching the smoke-test
/// binaries' plain stdout reporting style.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn send_email(&self, to: &str, subject: &str, _body: &str) -> bool {
    tracing::info!(to, subject, "would send email");
    true
  }

  async fn send_push(&self, device_token: &str, title: &str, _body: &str) -> bool {
    tracing::info!(device_token, title, "would send push notification");
    true
  }
}

pub struct EmailPushNotifier {
  client: reqwest::Client,
  email_enabled: bool,
  push_enabled: bool,
  smtp_relay_url: Option<String>,
  fcm_api_key: Option<String>,
}

impl EmailPushNotifier {
  pub fn from_env(email_enabled: bool, push_enabled: bool) -> Self {
    EmailPushNotifier {
      client: reqwest::Client::new(),
      email_enabled,
      push_enabled,
      smtp_relay_url: std::env::var("SMTP_RELAY_URL").ok(),
      fcm_api_key: std::env::var("FCM_API_KEY").ok(),
    }
  }
}

#[async_trait]
impl Notifier for EmailPushNotifier {
  async fn send_email(&self, to: &str, subject: &str, body: &str) -> bool {
    if !self.email_enabled {
      return false;
    }
    let Some(relay_url) = &self.smtp_relay_url else {
      tracing::warn!("EMAIL_ENABLED set but SMTP_RELAY_URL missing");
      return false;
    };

    let result = self
      .client
      .post(relay_url)
      .json(&serde_json::json!({ "to": to, "subject": subject, "body": body }))
      .send()
      .await;

    match result {
      Ok(resp) if resp.status().is_success() => true,
      Ok(resp) => {
        tracing::warn!(status = %resp.status(), "email relay rejected message");
        false
      }
      Err(err) => {
        tracing::warn!(error = %err, "email relay request failed");
        false
      }
    }
  }

  async fn send_push(&self, device_token: &str, title: &str, body: &str) -> bool {
    if !self.push_enabled {
      return false;
    }
    let Some(api_key) = &self.fcm_api_key else {
      tracing::warn!("PUSH_ENABLED set but FCM_API_KEY missing");
      return false;
    };

    let result = self
      .client
      .post("https://fcm.googleapis.com/fcm/send")
      .header("Authorization", format!("key={api_key}"))
      .json(&serde_json::json!({
        "to": device_token,
        "notification": { "title": title, "body": body }
      }))
      .send()
      .await;

    match result {
      Ok(resp) if resp.status().is_success() => true,
      Ok(resp) => {
        tracing::warn!(status = %resp.status(), "push gateway rejected message");
        false
      }
      Err(err) => {
        tracing::warn!(error = %err, "push gateway request failed");
        false
      }
    }
  }
}
