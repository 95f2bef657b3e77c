use std::time::Duration;

use anyhow::{Context, Result};

use crate::connectors::cloudflare::CloudflareConfig;
use crate::connectors::github::GitHubConfig;
use crate::connectors::http::RetryPolicy;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub github_org: String,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub cloudflare_account_id: Option<String>,
    pub cloudflare_api_token: Option<String>,
    pub cloudflare_api_url: String,
    /// Maximum number of items in a project's merged activity feed.
    pub feed_window: usize,
    pub connector_timeout_secs: u64,
    /// Total tries per connector call, the first one included.
    pub connector_max_attempts: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            github_org: require_env("GITHUB_ORG")?,
            github_token: optional_env("GITHUB_TOKEN"),
            github_api_url: optional_env("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            cloudflare_account_id: optional_env("CLOUDFLARE_ACCOUNT_ID"),
            cloudflare_api_token: optional_env("CLOUDFLARE_API_TOKEN"),
            cloudflare_api_url: optional_env("CLOUDFLARE_API_URL")
                .unwrap_or_else(|| DEFAULT_CLOUDFLARE_API_URL.to_string()),
            feed_window: parse_env("FEED_WINDOW", 10)?,
            connector_timeout_secs: parse_env("CONNECTOR_TIMEOUT_SECS", 10)?,
            connector_max_attempts: parse_env("CONNECTOR_MAX_ATTEMPTS", 3)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn github(&self) -> GitHubConfig {
        GitHubConfig {
            api_url: self.github_api_url.clone(),
            org: self.github_org.clone(),
            token: self.github_token.clone(),
        }
    }

    pub fn cloudflare(&self) -> CloudflareConfig {
        CloudflareConfig {
            api_url: self.cloudflare_api_url.clone(),
            account_id: self.cloudflare_account_id.clone(),
            api_token: self.cloudflare_api_token.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.connector_timeout_secs),
            max_attempts: self.connector_max_attempts.max(1),
            ..RetryPolicy::default()
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Treats unset and blank values the same so an empty `GITHUB_TOKEN=` in `.env`
/// means "unauthenticated" rather than an empty bearer token.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
