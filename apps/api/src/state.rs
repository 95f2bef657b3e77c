use std::sync::Arc;

use crate::activity::dashboard::DashboardSources;
use crate::config::Config;
use crate::connectors::{DeploymentHost, SourceControl};
use crate::store::ProjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProjectStore>,
    /// Source-control host. Default: GitHubClient.
    pub source: Arc<dyn SourceControl>,
    /// Deployment host. Default: CloudflareClient.
    pub deployments: Arc<dyn DeploymentHost>,
    pub config: Config,
}

impl AppState {
    pub fn dashboard_sources(&self) -> DashboardSources<'_> {
        DashboardSources {
            store: self.store.as_ref(),
            source: self.source.as_ref(),
            deployments: self.deployments.as_ref(),
        }
    }
}
