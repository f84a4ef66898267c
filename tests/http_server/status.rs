use crate::helpers::*;

#[tokio::test]
async fn status_endpoint_returns_status_json() {
    let repo = create_test_repo().await;
    let server = TestServer::new(repo).await;

    let resp = server.get("/status").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_secs"].as_u64().is_some());
    assert_eq!(body["patients_with_active_alerts"], 0);
    assert_eq!(body["rate_limit"]["perMinute"]["used"], 0);
    assert_eq!(body["rate_limit"]["perMinute"]["limit"], 100);
    assert_eq!(body["rate_limit"]["perDay"]["limit"], 10_000);

    server.cleanup();
}

#[tokio::test]
async fn status_endpoint_requires_bearer_token() {
    let repo = create_test_repo().await;
    let server = TestServer::new(repo).await;

    let resp = server.get_unauthenticated("/status").await;

    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Unauthorized");

    server.cleanup();
}
