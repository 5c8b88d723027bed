//! Verification gateway and decision feedback through the
//! `verify-decision-feedback` tool (§4.9).

use athena_e2e_tests::harness::TestHarness;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn ungrounded_candidate_is_rejected() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    let decision = harness
        .call_tool(
            "verify-decision-feedback",
            json!({
                "project_id": project_id,
                "action": "verify",
                "items": [{ "statement": "the build failed overnight", "confidence": 0.95 }],
            }),
        )
        .await
        .unwrap();

    assert_eq!(decision["outcome"], "reject");
    let grounding = decision["gates"].as_array().unwrap().iter().find(|g| g["gate"] == "grounding").unwrap();
    assert_eq!(grounding["passed"], false);
}

#[tokio::test]
async fn grounded_confident_candidate_is_accepted() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    let ingested = harness
        .call_tool("ingest-event", json!({ "project_id": project_id, "content": "the build failed overnight" }))
        .await
        .unwrap();
    let event_id = ingested["event"]["id"].clone();

    let decision = harness
        .call_tool(
            "verify-decision-feedback",
            json!({
                "project_id": project_id,
                "action": "verify",
                "items": [{ "statement": "the build failed overnight", "confidence": 0.9, "source_event_ids": [event_id] }],
            }),
        )
        .await
        .unwrap();

    assert_eq!(decision["outcome"], "accept");
}

#[tokio::test]
async fn feedback_records_a_judgment_against_an_existing_memory() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    let ingested = harness
        .call_tool("ingest-event", json!({ "project_id": project_id, "content": "the cache eviction policy changed to LRU" }))
        .await
        .unwrap();
    let event_id = ingested["event"]["id"].clone();

    let result = harness
        .call_tool(
            "verify-decision-feedback",
            json!({
                "project_id": project_id,
                "action": "feedback",
                "subject_id": event_id,
                "subject_layer": "episodic",
                "judgment": "confirmed",
                "note": "verified against the deploy log",
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["entry"]["judgment"], "confirmed");
}
