//! Episodic events promoted into semantic memory via the `consolidate`
//! tool (§4.6), then found again through `recall`.

use athena_e2e_tests::harness::TestHarness;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn consolidate_promotes_an_episodic_event_into_semantic_memory() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    harness
        .call_tool("ingest-event", json!({ "project_id": project_id, "content": "the build server ran out of memory during the nightly job" }))
        .await
        .unwrap();

    let run = harness.call_tool("consolidate", json!({ "project_id": project_id })).await.unwrap();
    assert_eq!(run["status"], "completed");
    assert_eq!(run["events_considered"], 1);
    assert_eq!(run["memories_created"], 1);
}

#[tokio::test]
async fn consolidate_with_no_events_still_completes_cleanly() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    let run = harness.call_tool("consolidate", json!({ "project_id": project_id })).await.unwrap();
    assert_eq!(run["status"], "completed");
    assert_eq!(run["events_considered"], 0);
    assert_eq!(run["memories_created"], 0);
}

#[tokio::test]
async fn recall_after_consolidation_can_surface_semantic_memory() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    harness
        .call_tool("ingest-event", json!({ "project_id": project_id, "content": "the checkout service returns 500s under heavy load" }))
        .await
        .unwrap();
    harness.call_tool("consolidate", json!({ "project_id": project_id })).await.unwrap();

    let result = harness
        .call_tool("recall", json!({ "project_id": project_id, "query": "checkout service load errors", "namespaces": ["semantic"] }))
        .await
        .unwrap();
    assert!(result["items"].is_array());
}
