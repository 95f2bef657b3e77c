//! In-memory fakes for the connector and store traits.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::connectors::cloudflare::RawDeployment;
use crate::connectors::github::{Branch, Commit, RemoteRepository};
use crate::connectors::{DeploymentHost, FetchError, SourceControl};
use crate::models::project::{ProgressUpdateRow, ProjectRow};
use crate::store::{NewProgressUpdate, ProjectStore};

pub(crate) const REACT_MANIFEST: &str =
    r#"{"dependencies":{"react":"^18.0.0","left-pad":"^1.0.0"}}"#;

pub(crate) fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub(crate) fn project(title: &str, repository_name: Option<&str>) -> ProjectRow {
    ProjectRow {
        project_id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        client_name: Some("Acme Co".to_string()),
        title: title.to_string(),
        description: None,
        repository_name: repository_name.map(str::to_string),
        preview_url: None,
        project_status: "development".to_string(),
        total_value_cents: 500_000,
        amount_paid_cents: 250_000,
        tech_stack: vec![],
        created_at: at("2024-01-01T00:00:00Z"),
    }
}

pub(crate) fn remote_repo(name: &str) -> RemoteRepository {
    RemoteRepository {
        name: name.to_string(),
        full_name: format!("acme/{name}"),
        description: None,
        html_url: format!("https://github.com/acme/{name}"),
        default_branch: "main".to_string(),
        pushed_at: Some(at("2024-01-10T00:00:00Z")),
        open_issues_count: 0,
        language: None,
        private: true,
    }
}

pub(crate) fn sample_commit(sha: &str, date: &str) -> Commit {
    Commit {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        author_name: "Dana".to_string(),
        author_email: None,
        author_avatar: None,
        date: at(date),
        url: format!("https://github.com/acme/site/commit/{sha}"),
        branch: None,
    }
}

/// Scripted source-control host. Records `(operation, repo)` for every call.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub repositories: Vec<RemoteRepository>,
    pub commits: HashMap<String, Vec<Commit>>,
    pub branches: HashMap<String, Vec<Branch>>,
    pub manifests: HashMap<String, String>,
    pub pull_requests: HashMap<String, u32>,
    pub fail_listing: bool,
    pub fail_repo_calls: bool,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeSource {
    fn record(&self, operation: &str, repo: &str) -> Result<(), FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), repo.to_string()));
        if self.fail_repo_calls {
            Err(FetchError::Status { status: 500 })
        } else {
            Ok(())
        }
    }

    pub(crate) fn calls_for(&self, repo: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r == repo)
            .map(|(op, _)| op.clone())
            .collect()
    }
}

#[async_trait]
impl SourceControl for FakeSource {
    async fn try_commits(
        &self,
        repo: &str,
        limit: usize,
        branch: Option<&str>,
    ) -> Result<Vec<Commit>, FetchError> {
        self.record("commits", repo)?;
        Ok(self
            .commits
            .get(repo)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|mut c| {
                c.branch = branch.map(str::to_string);
                c
            })
            .collect())
    }

    async fn try_branches(&self, repo: &str) -> Result<Vec<Branch>, FetchError> {
        self.record("branches", repo)?;
        Ok(self.branches.get(repo).cloned().unwrap_or_default())
    }

    async fn try_repository(&self, repo: &str) -> Result<Option<RemoteRepository>, FetchError> {
        self.record("repository", repo)?;
        Ok(self.repositories.iter().find(|r| r.name == repo).cloned())
    }

    async fn try_manifest(&self, repo: &str, _branch: Option<&str>) -> Result<String, FetchError> {
        self.record("manifest", repo)?;
        self.manifests
            .get(repo)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }

    async fn try_open_pull_request_count(&self, repo: &str) -> Result<u32, FetchError> {
        self.record("pulls", repo)?;
        Ok(self.pull_requests.get(repo).copied().unwrap_or(0))
    }

    async fn try_organization_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError> {
        if self.fail_listing {
            return Err(FetchError::Timeout);
        }
        Ok(self.repositories.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeDeployments {
    pub deployments: HashMap<String, Vec<RawDeployment>>,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl DeploymentHost for FakeDeployments {
    async fn try_deployments(&self, project: &str) -> Result<Vec<RawDeployment>, FetchError> {
        self.calls.lock().unwrap().push(project.to_string());
        self.deployments
            .get(project)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub projects: Mutex<Vec<ProjectRow>>,
    pub updates: Mutex<Vec<ProgressUpdateRow>>,
    pub fail: bool,
}

impl MemoryStore {
    pub(crate) fn with_projects(projects: Vec<ProjectRow>) -> Self {
        Self {
            projects: Mutex::new(projects),
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        self.check()?;
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<ProjectRow>> {
        self.check()?;
        Ok(self
            .projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.project_id == project_id)
            .cloned())
    }

    async fn list_updates(&self, project_id: Uuid) -> Result<Vec<ProgressUpdateRow>> {
        self.check()?;
        let mut updates: Vec<ProgressUpdateRow> = self
            .updates
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.project_id == project_id)
            .cloned()
            .collect();
        updates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(updates)
    }

    async fn insert_update(&self, update: NewProgressUpdate) -> Result<ProgressUpdateRow> {
        self.check()?;
        let row = ProgressUpdateRow {
            update_id: Uuid::new_v4(),
            project_id: update.project_id,
            title: update.title,
            body: update.body,
            commit_hash: update.commit_hash,
            created_at: Utc::now(),
        };
        self.updates.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn update_billing(
        &self,
        project_id: Uuid,
        total_value_cents: i64,
        amount_paid_cents: i64,
    ) -> Result<Option<ProjectRow>> {
        self.check()?;
        let mut projects = self.projects.lock().unwrap();
        Ok(projects
            .iter_mut()
            .find(|p| p.project_id == project_id)
            .map(|p| {
                p.total_value_cents = total_value_cents;
                p.amount_paid_cents = amount_paid_cents;
                p.clone()
            }))
    }
}
