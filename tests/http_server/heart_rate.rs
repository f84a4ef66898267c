use carewatch::test_helpers::AlertBuilder;
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn heart_rate_endpoint_records_and_broadcasts() {
    let repo = create_test_repo().await;
    let patient_id = repo.create_patient("Cecilia").await.unwrap();
    let alert_id = repo
        .create_alert(&AlertBuilder::new(patient_id).whoop("heart_rate").operator(">").threshold("120").build_new())
        .await
        .unwrap();

    let server = TestServer::new(repo).await;
    let mut live = server.services.live.subscribe();

    let resp = server
        .post_json(
            &format!("/patients/{patient_id}/heart-rate"),
            json!({ "heartRate": 135, "source": "bluetooth" }),
        )
        .await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);
    assert_eq!(body["heartRate"], 135);
    assert!(body["timestamp"].as_i64().is_some());
    assert_eq!(body["newlyTriggered"], json!([alert_id]));

    let broadcast = live.recv().await.unwrap();
    assert_eq!(broadcast.patient_id, patient_id);
    assert_eq!(broadcast.heart_rate, 135);

    assert_eq!(server.services.tracker.query(patient_id), vec![alert_id]);

    server.cleanup();
}

#[tokio::test]
async fn heart_rate_endpoint_validates_input() {
    let repo = create_test_repo().await;
    let patient_id = repo.create_patient("Dagny").await.unwrap();
    let server = TestServer::new(repo).await;
    let path = format!("/patients/{patient_id}/heart-rate");

    let resp = server.post_json(&path, json!({ "heartRate": 0, "source": "bluetooth" })).await;
    assert_eq!(resp.status(), 400);

    let resp = server.post_json(&path, json!({ "heartRate": 301, "source": "api" })).await;
    assert_eq!(resp.status(), 400);

    let resp = server.post_json(&path, json!({ "heartRate": 80, "source": "manual" })).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Invalid source 'manual'. Must be 'bluetooth' or 'api'");

    server.cleanup();
}
