mod activity;
mod auth;
mod config;
mod connectors;
mod errors;
mod models;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::connectors::cloudflare::CloudflareClient;
use crate::connectors::github::GitHubClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgProjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hub API v{}", env!("CARGO_PKG_VERSION"));

    let store = PgProjectStore::connect(&config.database_url).await?;

    let policy = config.retry_policy();
    let github = GitHubClient::new(config.github(), policy.clone());
    if config.github_token.is_none() {
        warn!("GITHUB_TOKEN not set; GitHub requests are unauthenticated and rate limited");
    }
    info!("GitHub connector initialized (org: {})", config.github_org);

    let cloudflare = CloudflareClient::new(config.cloudflare(), policy);
    info!("Cloudflare connector initialized");

    info!("Activity feed window: {} items", config.feed_window);

    let state = AppState {
        store: Arc::new(store),
        source: Arc::new(github),
        deployments: Arc::new(cloudflare),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the portal and admin hosts

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
