//! Persistence boundary for projects and their progress updates.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::project::{ProgressUpdateRow, ProjectRow};

const PROJECT_COLUMNS: &str = r#"
    p.project_id, p.client_id, c.company_name AS client_name, p.title, p.description,
    p.repository_name, p.preview_url, p.project_status, p.total_value_cents,
    p.amount_paid_cents, p.tech_stack, p.created_at
"#;

/// Fields for a new progress update. The id and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewProgressUpdate {
    pub project_id: Uuid,
    pub title: String,
    pub body: Option<String>,
    pub commit_hash: Option<String>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// All projects with their client name, newest first.
    async fn list_projects(&self) -> Result<Vec<ProjectRow>>;

    async fn get_project(&self, project_id: Uuid) -> Result<Option<ProjectRow>>;

    /// Progress updates for a project, newest first.
    async fn list_updates(&self, project_id: Uuid) -> Result<Vec<ProgressUpdateRow>>;

    async fn insert_update(&self, update: NewProgressUpdate) -> Result<ProgressUpdateRow>;

    /// Returns `None` when the project does not exist. Callers validate the amounts.
    async fn update_billing(
        &self,
        project_id: Uuid,
        total_value_cents: i64,
        amount_paid_cents: i64,
    ) -> Result<Option<ProjectRow>>;
}

pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the connection pool and verifies the database is reachable.
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("Failed to connect to DATABASE_URL")?;

        info!("PostgreSQL connection pool established");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p \
             LEFT JOIN clients c ON c.client_id = p.client_id \
             ORDER BY p.created_at DESC"
        );
        Ok(sqlx::query_as::<_, ProjectRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<ProjectRow>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p \
             LEFT JOIN clients c ON c.client_id = p.client_id \
             WHERE p.project_id = $1"
        );
        Ok(sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_updates(&self, project_id: Uuid) -> Result<Vec<ProgressUpdateRow>> {
        Ok(sqlx::query_as::<_, ProgressUpdateRow>(
            "SELECT * FROM project_updates WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_update(&self, update: NewProgressUpdate) -> Result<ProgressUpdateRow> {
        let row = sqlx::query_as::<_, ProgressUpdateRow>(
            r#"
            INSERT INTO project_updates (update_id, project_id, title, body, commit_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(update.project_id)
        .bind(&update.title)
        .bind(&update.body)
        .bind(&update.commit_hash)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Inserted progress update {} for project {}",
            row.update_id, row.project_id
        );
        Ok(row)
    }

    async fn update_billing(
        &self,
        project_id: Uuid,
        total_value_cents: i64,
        amount_paid_cents: i64,
    ) -> Result<Option<ProjectRow>> {
        let sql = format!(
            r#"
            WITH p AS (
                UPDATE projects
                SET total_value_cents = $2, amount_paid_cents = $3
                WHERE project_id = $1
                RETURNING *
            )
            SELECT {PROJECT_COLUMNS} FROM p
            LEFT JOIN clients c ON c.client_id = p.client_id
            "#
        );
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(project_id)
            .bind(total_value_cents)
            .bind(amount_paid_cents)
            .fetch_optional(&self.pool)
            .await?;

        if row.is_some() {
            info!("Updated billing for project {project_id}: {amount_paid_cents}/{total_value_cents} cents");
        }
        Ok(row)
    }
}
