//! Cloudflare Pages connector: latest deployment status per Pages project.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::http::{endpoint, HttpFetcher, RetryPolicy};
use super::{DeploymentHost, FetchError};

const PAGES_SUFFIX: &str = ".pages.dev";

#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    pub api_url: String,
    pub account_id: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Preview,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Preview => "preview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Ready,
    Building,
    Error,
    Queued,
}

impl DeploymentState {
    /// Collapses the Pages stage status vocabulary into four states.
    /// Anything unrecognized (including `idle`) is treated as queued.
    pub fn from_remote(status: &str) -> Self {
        match status {
            "success" => DeploymentState::Ready,
            "active" => DeploymentState::Building,
            "failure" | "canceled" => DeploymentState::Error,
            _ => DeploymentState::Queued,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentStatus {
    pub state: DeploymentState,
    pub url: String,
    pub branch: Option<String>,
    pub commit_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDeployment {
    pub url: String,
    pub environment: String,
    pub created_on: DateTime<Utc>,
    pub latest_stage: Option<Stage>,
    pub deployment_trigger: Option<Trigger>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stage {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trigger {
    pub metadata: Option<TriggerMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerMetadata {
    pub branch: Option<String>,
    pub commit_hash: Option<String>,
}

impl RawDeployment {
    fn to_status(&self) -> DeploymentStatus {
        let metadata = self
            .deployment_trigger
            .as_ref()
            .and_then(|t| t.metadata.as_ref());
        DeploymentStatus {
            state: DeploymentState::from_remote(
                self.latest_stage
                    .as_ref()
                    .map(|s| s.status.as_str())
                    .unwrap_or(""),
            ),
            url: self.url.clone(),
            branch: metadata.and_then(|m| m.branch.clone()),
            commit_hash: metadata.and_then(|m| m.commit_hash.clone()),
            created_at: self.created_on,
            environment: self.environment.clone(),
        }
    }
}

/// Newest deployment in `environment`, else the newest deployment of any environment.
pub fn select_latest(
    deployments: &[RawDeployment],
    environment: Environment,
) -> Option<DeploymentStatus> {
    let newest_in = deployments
        .iter()
        .filter(|d| d.environment == environment.as_str())
        .max_by_key(|d| d.created_on);
    newest_in
        .or_else(|| deployments.iter().max_by_key(|d| d.created_on))
        .map(RawDeployment::to_status)
}

/// Derives the Pages project name from a deployment or preview URL.
///
/// Recognizes `<project>.pages.dev` and `<hash-or-branch>.<project>.pages.dev`.
/// Custom domains return `None`; they cannot be mapped back to a project.
pub fn extract_project_identifier(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{trimmed}")))
        .ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let prefix = host.strip_suffix(PAGES_SUFFIX)?;
    prefix
        .rsplit('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

pub struct CloudflareClient {
    config: CloudflareConfig,
    http: HttpFetcher,
    warned_missing_credentials: AtomicBool,
}

impl CloudflareClient {
    pub fn new(config: CloudflareConfig, policy: RetryPolicy) -> Self {
        Self {
            config,
            http: HttpFetcher::new("Cloudflare", policy),
            warned_missing_credentials: AtomicBool::new(false),
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.config.account_id, &self.config.api_token) {
            (Some(account), Some(token)) => Some((account.as_str(), token.as_str())),
            _ => None,
        }
    }
}

#[async_trait]
impl DeploymentHost for CloudflareClient {
    async fn try_deployments(&self, project: &str) -> Result<Vec<RawDeployment>, FetchError> {
        let Some((account_id, token)) = self.credentials() else {
            if !self.warned_missing_credentials.swap(true, Ordering::SeqCst) {
                warn!("Cloudflare credentials not configured; deployment status disabled");
            }
            return Err(FetchError::MissingCredentials("Cloudflare"));
        };

        let url = endpoint(
            &self.config.api_url,
            &["accounts", account_id, "pages", "projects", project, "deployments"],
        )?;
        let envelope: Envelope<Vec<RawDeployment>> = self
            .http
            .get_json(|c| c.get(url.clone()).bearer_auth(token))
            .await?;

        if !envelope.success {
            let message = envelope
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::Api(message));
        }
        Ok(envelope.result.unwrap_or_default())
    }
}
