use carewatch::{models::CheckInStatus, test_helpers::AlertBuilder};
use chrono::Utc;

use crate::helpers::*;

#[tokio::test]
async fn active_alerts_endpoint_returns_empty_list_for_unknown_patient() {
    let repo = create_test_repo().await;
    let server = TestServer::new(repo).await;

    let resp = server.get("/patients/999/alerts/active").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["alerts"], serde_json::Value::Array(vec![]));

    server.cleanup();
}

#[tokio::test]
async fn active_alerts_endpoint_returns_triggered_alerts() {
    let repo = create_test_repo().await;
    let patient_id = repo.create_patient("Bertil").await.unwrap();
    let alert_id = repo
        .create_alert(
            &AlertBuilder::new(patient_id)
                .name("Missade doser")
                .medication("missed_dose")
                .operator(">")
                .threshold("0")
                .build_new(),
        )
        .await
        .unwrap();
    repo.create_alert(
        &AlertBuilder::new(patient_id)
            .medication("missed_dose")
            .operator(">")
            .threshold("5")
            .build_new(),
    )
    .await
    .unwrap();
    repo.add_check_in(patient_id, Some(3), CheckInStatus::Missed, Utc::now()).await.unwrap();

    let server = TestServer::new(repo).await;
    let resp = server.get(&format!("/patients/{patient_id}/alerts/active")).await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert"]["id"], alert_id);
    assert_eq!(alerts[0]["alert"]["name"], "Missade doser");
    assert_eq!(alerts[0]["currentValue"], 1.0);
    assert!(alerts[0]["triggeredAt"].is_string());

    server.cleanup();
}

#[tokio::test]
async fn active_alerts_endpoint_rejects_non_numeric_patient() {
    let repo = create_test_repo().await;
    let server = TestServer::new(repo).await;

    let resp = server.get("/patients/abc/alerts/active").await;
    assert_eq!(resp.status(), 400);

    server.cleanup();
}
