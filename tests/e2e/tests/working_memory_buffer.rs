//! Bounded working-memory buffer through the `working-memory-push` tool
//! (§8 "working-memory trigger" scenario).

use athena_e2e_tests::harness::TestHarness;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn pushing_past_capacity_evicts_the_weakest_resident() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();

    // default capacity is 7; fill it with low-importance items.
    for i in 0..7 {
        let outcome = harness
            .call_tool(
                "working-memory-push",
                json!({
                    "project_id": project_id,
                    "session_id": session_id,
                    "subject_id": Uuid::new_v4(),
                    "subject_layer": "episodic",
                    "summary": format!("low priority item {i}"),
                    "importance": 0.1,
                    "distinctiveness": 0.1,
                }),
            )
            .await
            .unwrap();
        assert_eq!(outcome["outcome"], "admitted");
    }

    let outcome = harness
        .call_tool(
            "working-memory-push",
            json!({
                "project_id": project_id,
                "session_id": session_id,
                "subject_id": Uuid::new_v4(),
                "subject_layer": "episodic",
                "summary": "urgent high priority item",
                "importance": 0.99,
                "distinctiveness": 0.99,
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome["outcome"], "admitted_with_eviction");

    let listed = harness.call_tool("working-memory-push", json!({ "project_id": project_id, "session_id": session_id, "action": "list" })).await.unwrap();
    assert_eq!(listed["items"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn listing_an_empty_session_returns_no_items() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();

    let listed = harness.call_tool("working-memory-push", json!({ "project_id": project_id, "session_id": session_id, "action": "list" })).await.unwrap();
    assert!(listed["items"].as_array().unwrap().is_empty());
}
