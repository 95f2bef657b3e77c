//! Back-office writes that feed the project views: posting progress updates
//! and recording billing totals.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::{ProgressUpdateRow, ProjectRow};
use crate::store::{NewProgressUpdate, ProjectStore};

#[derive(Debug, Deserialize)]
pub struct PostUpdateRequest {
    pub title: String,
    pub body: Option<String>,
    pub commit_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillingRequest {
    pub total_value_cents: i64,
    pub amount_paid_cents: i64,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Rejects negative amounts and payments above the project total.
pub fn validate_billing(total_value_cents: i64, amount_paid_cents: i64) -> Result<(), AppError> {
    if total_value_cents < 0 || amount_paid_cents < 0 {
        return Err(AppError::Validation(
            "Billing amounts cannot be negative".to_string(),
        ));
    }
    if amount_paid_cents > total_value_cents {
        return Err(AppError::Validation(format!(
            "amount_paid_cents ({amount_paid_cents}) exceeds total_value_cents ({total_value_cents})"
        )));
    }
    Ok(())
}

/// Records a progress update on an existing project. Updates are immutable
/// once posted.
pub async fn post_update(
    store: &dyn ProjectStore,
    project_id: Uuid,
    request: PostUpdateRequest,
) -> Result<ProgressUpdateRow, AppError> {
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    store
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?;

    let row = store
        .insert_update(NewProgressUpdate {
            project_id,
            title,
            body: non_blank(request.body),
            commit_hash: non_blank(request.commit_hash),
        })
        .await?;

    info!("Posted update '{}' to project {project_id}", row.title);
    Ok(row)
}

pub async fn update_billing(
    store: &dyn ProjectStore,
    project_id: Uuid,
    request: BillingRequest,
) -> Result<ProjectRow, AppError> {
    validate_billing(request.total_value_cents, request.amount_paid_cents)?;

    store
        .update_billing(
            project_id,
            request.total_value_cents,
            request.amount_paid_cents,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
}
