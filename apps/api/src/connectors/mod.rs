//! Read-only connectors to the source-control host (GitHub) and the static
//! deployment host (Cloudflare Pages).
//!
//! Each trait has two layers. The `try_*` methods return `Result<_, FetchError>`
//! so callers and tests can see exactly what went wrong. The provided methods
//! without the prefix are what the rest of the service uses: they log the error
//! and degrade to the documented empty value, so enrichment gaps never fail a
//! request.

use std::fmt::Display;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub mod cloudflare;
pub mod github;
pub mod http;
#[cfg(test)]
pub(crate) mod test_support;

use crate::activity::tech_stack::{detect_from_manifest, TechStackItem};
use cloudflare::{DeploymentStatus, Environment, RawDeployment};
use github::{Branch, Commit, RemoteRepository};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("remote returned status {status}")]
    Status { status: u16 },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("remote API error: {0}")]
    Api(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("credentials for {0} are not configured")]
    MissingCredentials(&'static str),

    #[error("circuit open, remote host is failing")]
    CircuitOpen,

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(e)
        }
    }
}

impl FetchError {
    /// The failure behind a retry loop that ran out of attempts.
    pub fn root_cause(&self) -> &FetchError {
        match self {
            FetchError::Exhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), FetchError::Status { status: 404 })
    }
}

/// Logs a connector failure and substitutes the empty value.
pub fn degrade<T: Default>(result: Result<T, FetchError>, operation: &str, target: impl Display) -> T {
    match result {
        Ok(value) => value,
        // Already warned once by the connector that noticed.
        Err(FetchError::MissingCredentials(_)) => T::default(),
        Err(e) => {
            warn!("{operation} failed for {target}: {e}");
            T::default()
        }
    }
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Newest-first commits, at most `limit`, messages cut to their first line.
    async fn try_commits(
        &self,
        repo: &str,
        limit: usize,
        branch: Option<&str>,
    ) -> Result<Vec<Commit>, FetchError>;

    async fn try_branches(&self, repo: &str) -> Result<Vec<Branch>, FetchError>;

    /// `Ok(None)` when the repository does not exist.
    async fn try_repository(&self, repo: &str) -> Result<Option<RemoteRepository>, FetchError>;

    /// Decoded text of the repository's `package.json` at `branch` (default ref when `None`).
    async fn try_manifest(&self, repo: &str, branch: Option<&str>) -> Result<String, FetchError>;

    async fn try_open_pull_request_count(&self, repo: &str) -> Result<u32, FetchError>;

    /// One page of the organization's repositories, most recently pushed first.
    async fn try_organization_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError>;

    async fn commits(&self, repo: &str, limit: usize, branch: Option<&str>) -> Vec<Commit> {
        degrade(self.try_commits(repo, limit, branch).await, "get commits", repo)
    }

    async fn branches(&self, repo: &str) -> Vec<Branch> {
        degrade(self.try_branches(repo).await, "get branches", repo)
    }

    async fn repository(&self, repo: &str) -> Option<RemoteRepository> {
        degrade(self.try_repository(repo).await, "get repository", repo)
    }

    async fn open_pull_request_count(&self, repo: &str) -> u32 {
        degrade(self.try_open_pull_request_count(repo).await, "count pull requests", repo)
    }

    async fn organization_repositories(&self) -> Vec<RemoteRepository> {
        degrade(
            self.try_organization_repositories().await,
            "list repositories",
            "organization",
        )
    }

    async fn try_detect_tech_stack(
        &self,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Vec<TechStackItem>, FetchError> {
        let manifest = self.try_manifest(repo, branch).await?;
        detect_from_manifest(&manifest).map_err(FetchError::Parse)
    }

    async fn detect_tech_stack(&self, repo: &str, branch: Option<&str>) -> Vec<TechStackItem> {
        degrade(
            self.try_detect_tech_stack(repo, branch).await,
            "detect tech stack",
            repo,
        )
    }
}

#[async_trait]
pub trait DeploymentHost: Send + Sync {
    /// Deployments for a Pages project, newest first as returned by the host.
    async fn try_deployments(&self, project: &str) -> Result<Vec<RawDeployment>, FetchError>;

    async fn try_latest_deployment(
        &self,
        project: &str,
        environment: Environment,
    ) -> Result<Option<DeploymentStatus>, FetchError> {
        let deployments = self.try_deployments(project).await?;
        Ok(cloudflare::select_latest(&deployments, environment))
    }

    async fn latest_deployment(
        &self,
        project: &str,
        environment: Environment,
    ) -> Option<DeploymentStatus> {
        degrade(
            self.try_latest_deployment(project, environment).await,
            "get latest deployment",
            project,
        )
    }
}
