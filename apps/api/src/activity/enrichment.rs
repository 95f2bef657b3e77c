//! Project enrichment: joins persisted projects with the organization's
//! GitHub repositories and attaches live commit, pull request, and tech-stack
//! data for the projects the caller may see.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::activity::tech_stack::TechStackItem;
use crate::connectors::github::{Commit, RemoteRepository};
use crate::connectors::SourceControl;
use crate::errors::AppError;
use crate::models::project::ProjectRow;
use crate::store::ProjectStore;

/// Commits attached to each project in the listing.
pub const LISTING_COMMIT_WINDOW: usize = 5;

/// What the caller may see, as resolved by the upstream auth layer.
#[derive(Debug, Clone, Default)]
pub struct PermissionContext {
    pub is_admin: bool,
    pub allowed_project_ids: HashSet<Uuid>,
}

impl PermissionContext {
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            allowed_project_ids: HashSet::new(),
        }
    }

    pub fn scoped(allowed_project_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            is_admin: false,
            allowed_project_ids: allowed_project_ids.into_iter().collect(),
        }
    }

    pub fn can_view(&self, project_id: Uuid) -> bool {
        self.is_admin || self.allowed_project_ids.contains(&project_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedProject {
    #[serde(flatten)]
    pub project: ProjectRow,
    pub github_repo: Option<RemoteRepository>,
    pub commits: Vec<Commit>,
    pub open_prs: u32,
    pub last_push: Option<DateTime<Utc>>,
    pub detected_tech_stack: Vec<TechStackItem>,
}

impl EnrichedProject {
    fn without_remote(project: ProjectRow) -> Self {
        Self {
            project,
            github_repo: None,
            commits: Vec::new(),
            open_prs: 0,
            last_push: None,
            detected_tech_stack: Vec::new(),
        }
    }
}

/// Lists the projects visible to `permissions`, each merged with its remote
/// repository data.
///
/// Persistence failures propagate. Connector failures only leave the affected
/// enrichment fields empty. Projects filtered out by `permissions`, and
/// projects whose repository is not in the organization, cost no remote calls.
pub async fn enrich_projects(
    store: &dyn ProjectStore,
    source: &dyn SourceControl,
    permissions: &PermissionContext,
) -> Result<Vec<EnrichedProject>, AppError> {
    let (projects, repositories) =
        tokio::join!(store.list_projects(), source.organization_repositories());
    let projects = projects?;

    let by_name: HashMap<&str, &RemoteRepository> = repositories
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();

    let visible: Vec<ProjectRow> = projects
        .into_iter()
        .filter(|p| permissions.can_view(p.project_id))
        .collect();

    for project in &visible {
        if project.amount_paid_cents > project.total_value_cents {
            warn!(
                "Project {} has amount_paid_cents {} above total_value_cents {}",
                project.project_id, project.amount_paid_cents, project.total_value_cents
            );
        }
    }

    let enriched = join_all(visible.into_iter().map(|project| {
        let repository = project
            .repository_name
            .as_deref()
            .and_then(|name| by_name.get(name))
            .map(|r| (*r).clone());
        enrich_one(source, project, repository)
    }))
    .await;

    info!(
        "Enriched {} projects ({} with repositories) against {} remote repositories",
        enriched.len(),
        enriched.iter().filter(|p| p.github_repo.is_some()).count(),
        repositories.len()
    );

    Ok(enriched)
}

async fn enrich_one(
    source: &dyn SourceControl,
    project: ProjectRow,
    repository: Option<RemoteRepository>,
) -> EnrichedProject {
    let Some(repository) = repository else {
        return EnrichedProject::without_remote(project);
    };

    let (commits, open_prs, detected_tech_stack) = tokio::join!(
        source.commits(&repository.name, LISTING_COMMIT_WINDOW, None),
        source.open_pull_request_count(&repository.name),
        source.detect_tech_stack(&repository.name, None),
    );

    EnrichedProject {
        project,
        last_push: repository.pushed_at,
        github_repo: Some(repository),
        commits,
        open_prs,
        detected_tech_stack,
    }
}
