//! Detail view for a single project: repository, branches, commits on the
//! selected branch, merged activity feed, tech stack, and deployment status.

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::activity::enrichment::PermissionContext;
use crate::activity::feed::{merge_feed, FeedItem};
use crate::activity::tech_stack::TechStackItem;
use crate::connectors::cloudflare::{extract_project_identifier, DeploymentStatus, Environment};
use crate::connectors::github::{Branch, Commit, RemoteRepository};
use crate::connectors::{DeploymentHost, SourceControl};
use crate::errors::AppError;
use crate::models::project::ProjectRow;
use crate::store::ProjectStore;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDashboard {
    pub project: ProjectRow,
    /// `None` when the stored status is not a known lifecycle stage.
    pub progress_percent: Option<u8>,
    pub balance_due_cents: i64,
    pub repository: Option<RemoteRepository>,
    pub branches: Vec<Branch>,
    pub selected_branch: Option<String>,
    pub commits: Vec<Commit>,
    pub feed: Vec<FeedItem>,
    pub detected_tech_stack: Vec<TechStackItem>,
    pub deployment: Option<DeploymentStatus>,
}

#[derive(Default)]
struct RemoteView {
    repository: Option<RemoteRepository>,
    branches: Vec<Branch>,
    selected_branch: Option<String>,
    commits: Vec<Commit>,
    detected_tech_stack: Vec<TechStackItem>,
}

/// Everything the dashboard reads from, bundled so handlers pass one value.
pub struct DashboardSources<'a> {
    pub store: &'a dyn ProjectStore,
    pub source: &'a dyn SourceControl,
    pub deployments: &'a dyn DeploymentHost,
}

/// Builds the dashboard for `project_id`.
///
/// `requested_branch` re-scopes commits and tech stack; without it the
/// repository's default branch is used. `feed_window` caps both the commits
/// fetched and the merged feed.
pub async fn build_dashboard(
    sources: &DashboardSources<'_>,
    permissions: &PermissionContext,
    project_id: Uuid,
    requested_branch: Option<&str>,
    feed_window: usize,
) -> Result<ProjectDashboard, AppError> {
    if !permissions.can_view(project_id) {
        return Err(AppError::Forbidden);
    }

    let (project, updates) = tokio::join!(
        sources.store.get_project(project_id),
        sources.store.list_updates(project_id),
    );
    let project =
        project?.ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?;
    let updates = updates?;

    let pages_project = project
        .preview_url
        .as_deref()
        .and_then(extract_project_identifier);

    let deployment = async {
        match &pages_project {
            Some(name) => {
                sources
                    .deployments
                    .latest_deployment(name, Environment::Production)
                    .await
            }
            None => None,
        }
    };
    let remote = load_remote(
        sources.source,
        project.repository_name.as_deref(),
        requested_branch,
        feed_window,
    );
    let (deployment, remote) = tokio::join!(deployment, remote);

    let feed = merge_feed(&remote.commits, &updates, feed_window);
    debug!(
        "Dashboard for {project_id}: {} feed items, deployment {:?}",
        feed.len(),
        deployment.as_ref().map(|d| d.state)
    );

    let status = project.status();
    Ok(ProjectDashboard {
        progress_percent: status.map(|s| s.progress_percent()),
        balance_due_cents: project.balance_due_cents(),
        project,
        repository: remote.repository,
        branches: remote.branches,
        selected_branch: remote.selected_branch,
        commits: remote.commits,
        feed,
        detected_tech_stack: remote.detected_tech_stack,
        deployment,
    })
}

async fn load_remote(
    source: &dyn SourceControl,
    repository_name: Option<&str>,
    requested_branch: Option<&str>,
    commit_window: usize,
) -> RemoteView {
    let Some(name) = repository_name else {
        return RemoteView::default();
    };

    let (repository, branches) = tokio::join!(source.repository(name), source.branches(name));
    let Some(repository) = repository else {
        return RemoteView::default();
    };

    let branch = requested_branch
        .map(str::to_string)
        .unwrap_or_else(|| repository.default_branch.clone());
    let (commits, detected_tech_stack) = tokio::join!(
        source.commits(name, commit_window, Some(&branch)),
        source.detect_tech_stack(name, Some(&branch)),
    );

    RemoteView {
        repository: Some(repository),
        branches,
        selected_branch: Some(branch),
        commits,
        detected_tech_stack,
    }
}
