//! Ingest, dedup, and recall through the full MCP tool surface (§8 "dedup"
//! and general recall scenarios).

use athena_e2e_tests::harness::TestHarness;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn duplicate_content_is_reported_as_duplicate_not_reingested() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let content = "the deploy pipeline failed at midnight";

    let first = harness.call_tool("ingest-event", json!({ "project_id": project_id, "content": content })).await.unwrap();
    assert_eq!(first["outcome"], "created");
    let event_id = first["event"]["id"].clone();

    let second = harness.call_tool("ingest-event", json!({ "project_id": project_id, "content": content })).await.unwrap();
    assert_eq!(second["outcome"], "duplicate");
    assert_eq!(second["existing_event_id"], event_id);
}

#[tokio::test]
async fn recall_after_ingest_surfaces_the_event() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    harness
        .call_tool("ingest-event", json!({ "project_id": project_id, "content": "the staging database ran out of disk space" }))
        .await
        .unwrap();

    let result = harness.call_tool("recall", json!({ "project_id": project_id, "query": "staging database disk space" })).await.unwrap();
    let items = result["items"].as_array().unwrap();
    assert!(!items.is_empty(), "expected recall to surface the ingested event");
}

#[tokio::test]
async fn recall_scopes_results_to_the_requested_project() {
    let mut harness = TestHarness::new().await;
    let project_a = Uuid::new_v4();
    let project_b = Uuid::new_v4();

    harness.call_tool("ingest-event", json!({ "project_id": project_a, "content": "unique marker sentence alpha" })).await.unwrap();

    let result = harness.call_tool("recall", json!({ "project_id": project_b, "query": "unique marker sentence alpha" })).await.unwrap();
    assert!(result["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tool_name_is_rejected() {
    let mut harness = TestHarness::new().await;
    let err = harness.call_tool("not-a-real-tool", json!({})).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn ingest_without_content_is_rejected() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let err = harness.call_tool("ingest-event", json!({ "project_id": project_id })).await;
    assert!(err.is_err());
}
