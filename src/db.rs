use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use tokio::sync::OnceCell;
use vercel_runtime::Error;

static POOL: OnceCell<MySqlPool> = OnceCell::const_new();

async fn ensure_schema(pool: &MySqlPool) -> Result<(), Error> {
  // Keep schema creation idempotent; avoids footguns in early MVP.
  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS parent_users (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        email VARCHAR(255) NOT NULL,
        display_name VARCHAR(255) NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        UNIQUE KEY uq_parent_users_email (email)
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS child_profiles (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        parent_id BIGINT NOT NULL,
        display_name VARCHAR(255) NOT NULL,
        birth_date DATE NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        KEY idx_child_profiles_parent (parent_id),
        CONSTRAINT fk_child_profiles_parent FOREIGN KEY (parent_id) REFERENCES parent_users(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS linked_accounts (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        child_profile_id BIGINT NOT NULL,
        platform VARCHAR(32) NOT NULL,
        platform_account_id VARCHAR(128) NOT NULL,
        display_name VARCHAR(255) NULL,
        access_token_ciphertext VARBINARY(2048) NOT NULL,
        refresh_token_ciphertext VARBINARY(2048) NULL,
        token_type VARCHAR(32) NOT NULL,
        scope TEXT NULL,
        token_expires_at TIMESTAMP(3) NULL,
        status VARCHAR(16) NOT NULL DEFAULT 'active',
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        UNIQUE KEY uq_linked_accounts_platform (child_profile_id, platform, platform_account_id),
        CONSTRAINT fk_linked_accounts_child FOREIGN KEY (child_profile_id) REFERENCES child_profiles(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS coppa_verifications (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        child_profile_id BIGINT NOT NULL,
        platform VARCHAR(32) NOT NULL,
        verification_method VARCHAR(32) NOT NULL,
        status VARCHAR(16) NOT NULL,
        details TEXT NULL,
        verified_at TIMESTAMP(3) NULL,
        expires_at TIMESTAMP(3) NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        KEY idx_coppa_verifications_child (child_profile_id, platform, status),
        CONSTRAINT fk_coppa_verifications_child FOREIGN KEY (child_profile_id) REFERENCES child_profiles(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS subscribed_channels (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        linked_account_id BIGINT NOT NULL,
        channel_id VARCHAR(128) NOT NULL,
        title VARCHAR(512) NULL,
        thumbnail_url VARCHAR(1024) NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        UNIQUE KEY uq_subscribed_channels (linked_account_id, channel_id),
        CONSTRAINT fk_subscribed_channels_account FOREIGN KEY (linked_account_id) REFERENCES linked_accounts(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS analyzed_videos (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        channel_id VARCHAR(128) NOT NULL,
        video_platform_id VARCHAR(128) NOT NULL,
        title VARCHAR(512) NOT NULL,
        description MEDIUMTEXT NULL,
        thumbnail_url VARCHAR(1024) NULL,
        published_at TIMESTAMP(3) NULL,
        duration_seconds INT NULL,
        view_count BIGINT NULL,
        like_count BIGINT NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        UNIQUE KEY uq_analyzed_videos_platform_id (video_platform_id),
        KEY idx_analyzed_videos_channel (channel_id)
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS analysis_results (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        video_id BIGINT NOT NULL,
        channel_id VARCHAR(128) NOT NULL,
        risk_category VARCHAR(32) NOT NULL,
        severity VARCHAR(16) NOT NULL,
        confidence_score DOUBLE NOT NULL,
        keywords_matched TEXT NOT NULL,
        flagged_text VARCHAR(200) NOT NULL,
        marked_not_harmful TINYINT(1) NOT NULL DEFAULT 0,
        marked_not_harmful_at TIMESTAMP(3) NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        UNIQUE KEY uq_analysis_results_video_category (video_id, risk_category),
        KEY idx_analysis_results_channel (channel_id),
        CONSTRAINT fk_analysis_results_video FOREIGN KEY (video_id) REFERENCES analyzed_videos(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS alerts (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        child_profile_id BIGINT NOT NULL,
        alert_type VARCHAR(32) NOT NULL,
        title VARCHAR(255) NOT NULL,
        message VARCHAR(1024) NOT NULL,
        severity VARCHAR(16) NOT NULL,
        summary_data TEXT NOT NULL,
        is_read TINYINT(1) NOT NULL DEFAULT 0,
        read_at TIMESTAMP(3) NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        KEY idx_alerts_child (child_profile_id, is_read, created_at),
        CONSTRAINT fk_alerts_child FOREIGN KEY (child_profile_id) REFERENCES child_profiles(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS audit_logs (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        parent_id BIGINT NULL,
        action VARCHAR(64) NOT NULL,
        resource_type VARCHAR(64) NULL,
        resource_id VARCHAR(64) NULL,
        details TEXT NULL,
        ip_address VARCHAR(64) NULL,
        user_agent VARCHAR(512) NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        KEY idx_audit_logs_parent (parent_id, created_at),
        KEY idx_audit_logs_action (action, created_at),
        KEY idx_audit_logs_resource (resource_type, resource_id)
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS notification_preferences (
        parent_id BIGINT PRIMARY KEY,
        email_enabled TINYINT(1) NOT NULL DEFAULT 1,
        push_enabled TINYINT(1) NOT NULL DEFAULT 1,
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        CONSTRAINT fk_notification_preferences_parent FOREIGN KEY (parent_id) REFERENCES parent_users(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS device_tokens (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        parent_id BIGINT NOT NULL,
        push_token VARCHAR(512) NOT NULL,
        platform VARCHAR(16) NOT NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        UNIQUE KEY uq_device_tokens (parent_id, push_token),
        CONSTRAINT fk_device_tokens_parent FOREIGN KEY (parent_id) REFERENCES parent_users(id) ON DELETE CASCADE
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  sqlx::query(
    r#"
      CREATE TABLE IF NOT EXISTS scan_tasks (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        linked_account_id BIGINT NOT NULL,
        dedupe_key VARCHAR(191) NOT NULL,
        status VARCHAR(16) NOT NULL DEFAULT 'pending',
        attempt INT NOT NULL DEFAULT 0,
        max_attempt INT NOT NULL DEFAULT 3,
        run_after TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        locked_by VARCHAR(128) NULL,
        locked_at TIMESTAMP(3) NULL,
        last_error TEXT NULL,
        created_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
        UNIQUE KEY uq_scan_tasks_dedupe (dedupe_key),
        KEY idx_scan_tasks_claimable (status, run_after)
      );
    "#,
  )
  .execute(pool)
  .await
  .map_err(|e| -> Error { Box::new(e) })?;

  Ok(())
}

pub async fn get_pool() -> Result<&'static MySqlPool, Error> {
  POOL
    .get_or_try_init(|| async {
      let database_url = std::env::var("TIDB_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"))?;
      let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
      ensure_schema(&pool).await?;
      Ok::<_, Error>(pool)
    })
    .await
}
