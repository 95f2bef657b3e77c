//! Throwaway local HTTP servers standing in for GitHub and Cloudflare in tests.

use std::time::Duration;

use axum::Router;

use super::http::RetryPolicy;

/// Serves `router` on an ephemeral localhost port and returns its base URL.
pub(crate) async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

pub(crate) fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(5),
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        failure_threshold: 50,
        cooldown: Duration::from_secs(60),
    }
}
