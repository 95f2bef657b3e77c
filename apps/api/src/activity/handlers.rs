//! Axum route handlers for the project activity API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::activity::dashboard::{build_dashboard, ProjectDashboard};
use crate::activity::enrichment::{enrich_projects, EnrichedProject};
use crate::activity::updates::{post_update, update_billing, BillingRequest, PostUpdateRequest};
use crate::auth::Caller;
use crate::connectors::github::RemoteRepository;
use crate::errors::AppError;
use crate::models::project::{ProgressUpdateRow, ProjectRow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub branch: Option<String>,
}

/// GET /api/v1/projects
///
/// Projects visible to the caller, enriched with live repository data.
pub async fn handle_list_projects(
    State(state): State<AppState>,
    Caller(permissions): Caller,
) -> Result<Json<Vec<EnrichedProject>>, AppError> {
    let projects =
        enrich_projects(state.store.as_ref(), state.source.as_ref(), &permissions).await?;
    Ok(Json(projects))
}

/// GET /api/v1/projects/:id/dashboard?branch=
pub async fn handle_project_dashboard(
    State(state): State<AppState>,
    Caller(permissions): Caller,
    Path(project_id): Path<Uuid>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ProjectDashboard>, AppError> {
    let branch = query
        .branch
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());
    let dashboard = build_dashboard(
        &state.dashboard_sources(),
        &permissions,
        project_id,
        branch,
        state.config.feed_window,
    )
    .await?;
    Ok(Json(dashboard))
}

/// POST /api/v1/projects/:id/updates (admin)
pub async fn handle_post_update(
    State(state): State<AppState>,
    caller: Caller,
    Path(project_id): Path<Uuid>,
    Json(request): Json<PostUpdateRequest>,
) -> Result<(StatusCode, Json<ProgressUpdateRow>), AppError> {
    caller.require_admin()?;
    let row = post_update(state.store.as_ref(), project_id, request).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /api/v1/projects/:id/billing (admin)
pub async fn handle_update_billing(
    State(state): State<AppState>,
    caller: Caller,
    Path(project_id): Path<Uuid>,
    Json(request): Json<BillingRequest>,
) -> Result<Json<ProjectRow>, AppError> {
    caller.require_admin()?;
    let project = update_billing(state.store.as_ref(), project_id, request).await?;
    Ok(Json(project))
}

/// GET /api/v1/repositories (admin)
///
/// The organization's repositories, for linking a project to one.
pub async fn handle_list_repositories(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<RemoteRepository>>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.source.organization_repositories().await))
}
