pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::activity::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/projects", get(handlers::handle_list_projects))
        .route(
            "/api/v1/projects/:id/dashboard",
            get(handlers::handle_project_dashboard),
        )
        .route(
            "/api/v1/projects/:id/updates",
            post(handlers::handle_post_update),
        )
        .route(
            "/api/v1/projects/:id/billing",
            patch(handlers::handle_update_billing),
        )
        .route(
            "/api/v1/repositories",
            get(handlers::handle_list_repositories),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::activity::test_support::{
        project, remote_repo, FakeDeployments, FakeSource, MemoryStore,
    };
    use crate::auth::{PROJECTS_HEADER, ROLE_HEADER};
    use crate::config::Config;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://unused".to_string(),
            github_org: "acme".to_string(),
            github_token: None,
            github_api_url: "http://127.0.0.1:1".to_string(),
            cloudflare_account_id: None,
            cloudflare_api_token: None,
            cloudflare_api_url: "http://127.0.0.1:1".to_string(),
            feed_window: 10,
            connector_timeout_secs: 1,
            connector_max_attempts: 1,
            port: 0,
            rust_log: "info".to_string(),
        }
    }

    struct Harness {
        router: Router,
        store: Arc<MemoryStore>,
        project_a: Uuid,
        project_b: Uuid,
    }

    fn harness() -> Harness {
        let a = project("Client A site", Some("site"));
        let b = project("Client B app", None);
        let (project_a, project_b) = (a.project_id, b.project_id);
        let store = Arc::new(MemoryStore::with_projects(vec![a, b]));
        let mut source = FakeSource::default();
        source.repositories = vec![remote_repo("site")];

        let state = AppState {
            store: store.clone(),
            source: Arc::new(source),
            deployments: Arc::new(FakeDeployments::default()),
            config: test_config(),
        };
        Harness {
            router: build_router(state),
            store,
            project_a,
            project_b,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_as(uri: &str, role: Option<&str>, projects: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(role) = role {
            builder = builder.header(ROLE_HEADER, role);
        }
        if let Some(projects) = projects {
            builder = builder.header(PROJECTS_HEADER, projects);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_as(method: &str, uri: &str, role: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(ROLE_HEADER, role)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let (status, body) = send(&h.router, get_as("/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_projects_require_identity() {
        let h = harness();
        let (status, body) = send(&h.router, get_as("/api/v1/projects", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_client_sees_only_own_projects() {
        let h = harness();
        let (status, body) = send(
            &h.router,
            get_as("/api/v1/projects", Some("client"), Some(h.project_a.to_string())),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let projects = body.as_array().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0]["project_id"], h.project_a.to_string());
        assert_eq!(projects[0]["github_repo"]["name"], "site");
        assert_eq!(projects[0]["open_prs"], 0);
    }

    #[tokio::test]
    async fn test_admin_sees_all_projects() {
        let h = harness();
        let (status, body) =
            send(&h.router, get_as("/api/v1/projects", Some("admin"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_project_ids_rejected() {
        let h = harness();
        let (status, _) = send(
            &h.router,
            get_as("/api/v1/projects", Some("client"), Some("nope".to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_forbidden_for_other_client() {
        let h = harness();
        let uri = format!("/api/v1/projects/{}/dashboard", h.project_b);
        let (status, _) = send(
            &h.router,
            get_as(&uri, Some("client"), Some(h.project_a.to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_dashboard_for_own_project() {
        let h = harness();
        let uri = format!("/api/v1/projects/{}/dashboard?branch=develop", h.project_a);
        let (status, body) = send(
            &h.router,
            get_as(&uri, Some("client"), Some(h.project_a.to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected_branch"], "develop");
        assert_eq!(body["project"]["title"], "Client A site");
    }

    #[tokio::test]
    async fn test_post_update_admin_only() {
        let h = harness();
        let uri = format!("/api/v1/projects/{}/updates", h.project_a);
        let payload = json!({ "title": "Design approved", "body": "Moving to build" });

        let (status, _) = send(&h.router, json_as("POST", &uri, "client", payload.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(h.store.updates.lock().unwrap().is_empty());

        let (status, body) = send(&h.router, json_as("POST", &uri, "admin", payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "Design approved");
        assert_eq!(h.store.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_billing_overpayment_is_bad_request() {
        let h = harness();
        let uri = format!("/api/v1/projects/{}/billing", h.project_a);

        let (status, body) = send(
            &h.router,
            json_as(
                "PATCH",
                &uri,
                "admin",
                json!({ "total_value_cents": 1000, "amount_paid_cents": 2000 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_repositories_admin_only() {
        let h = harness();
        let (status, _) = send(
            &h.router,
            get_as("/api/v1/repositories", Some("client"), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&h.router, get_as("/api/v1/repositories", Some("admin"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "site");
    }
}
