use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Project lifecycle. Variant order is the delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Discovery,
    Architecture,
    Development,
    Testing,
    Shipped,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::Discovery,
        ProjectStatus::Architecture,
        ProjectStatus::Development,
        ProjectStatus::Testing,
        ProjectStatus::Shipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Discovery => "discovery",
            ProjectStatus::Architecture => "architecture",
            ProjectStatus::Development => "development",
            ProjectStatus::Testing => "testing",
            ProjectStatus::Shipped => "shipped",
        }
    }

    /// Position in the lifecycle as a percentage: discovery 0, shipped 100.
    pub fn progress_percent(&self) -> u8 {
        let index = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        (index * 100 / (Self::ALL.len() - 1)) as u8
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown project status '{s}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub project_id: Uuid,
    pub client_id: Uuid,
    /// From the joined client record.
    pub client_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// Join key against the organization's repositories.
    pub repository_name: Option<String>,
    pub preview_url: Option<String>,
    pub project_status: String,
    pub total_value_cents: i64,
    pub amount_paid_cents: i64,
    pub tech_stack: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ProjectRow {
    pub fn status(&self) -> Option<ProjectStatus> {
        self.project_status.parse().ok()
    }

    pub fn balance_due_cents(&self) -> i64 {
        (self.total_value_cents - self.amount_paid_cents).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressUpdateRow {
    pub update_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub body: Option<String>,
    /// Free text; not checked against real commits.
    pub commit_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}
