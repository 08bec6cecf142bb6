use std::time::Duration as StdDuration;

use anyhow::{Context, Result};

use crate::export::ExportPolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub port: u16,
    pub rust_log: String,
    pub font_dir: String,
    /// Completion webhook. Notifications are disabled when unset.
    pub notify_webhook_url: Option<String>,
    pub export_freshness_hours: i64,
    pub signed_url_ttl_hours: u64,
    pub render_lease_minutes: i64,
    pub preview_page_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            font_dir: std::env::var("FONT_DIR").unwrap_or_else(|_| "assets/fonts".to_string()),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            export_freshness_hours: parse_env("EXPORT_FRESHNESS_HOURS", 24)?,
            signed_url_ttl_hours: parse_env("SIGNED_URL_TTL_HOURS", 24)?,
            render_lease_minutes: parse_env("RENDER_LEASE_MINUTES", 15)?,
            preview_page_limit: parse_env("PREVIEW_PAGE_LIMIT", 3)?,
        })
    }

    pub fn policy(&self) -> ExportPolicy {
        ExportPolicy {
            freshness: chrono::Duration::hours(self.export_freshness_hours),
            url_ttl: StdDuration::from_secs(self.signed_url_ttl_hours * 3600),
            render_lease: chrono::Duration::minutes(self.render_lease_minutes),
            preview_pages: self.preview_page_limit,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_defaults() {
        let config = Config {
            database_url: "postgres://localhost/keepsake".into(),
            s3_bucket: "exports".into(),
            s3_endpoint: "http://localhost:9000".into(),
            aws_access_key_id: "key".into(),
            aws_secret_access_key: "secret".into(),
            port: 8080,
            rust_log: "info".into(),
            font_dir: "assets/fonts".into(),
            notify_webhook_url: None,
            export_freshness_hours: 24,
            signed_url_ttl_hours: 24,
            render_lease_minutes: 15,
            preview_page_limit: 3,
        };
        let policy = config.policy();
        let default = ExportPolicy::default();
        assert_eq!(policy.freshness, default.freshness);
        assert_eq!(policy.url_ttl, default.url_ttl);
        assert_eq!(policy.render_lease, default.render_lease);
        assert_eq!(policy.preview_pages, default.preview_pages);
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        std::env::set_var("KEEPSAKE_TEST_LEASE", "fifteen");
        let err = parse_env::<i64>("KEEPSAKE_TEST_LEASE", 15).unwrap_err();
        assert!(err.to_string().contains("KEEPSAKE_TEST_LEASE"));
        std::env::remove_var("KEEPSAKE_TEST_LEASE");
        assert_eq!(parse_env::<i64>("KEEPSAKE_TEST_LEASE", 15).unwrap(), 15);
    }
}
