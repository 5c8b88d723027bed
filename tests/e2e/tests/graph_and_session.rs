//! Entity/relation graph traversal and session lifecycle over MCP.

use athena_e2e_tests::harness::TestHarness;
use athena_e2e_tests::mocks::fixtures::seed_related_entities;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn related_entities_show_up_as_neighbors() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let (source_id, target_id) = seed_related_entities(&mut harness, project_id).await;

    let neighbors = harness.call_tool("graph", json!({ "project_id": project_id, "action": "neighbors", "entity_id": source_id })).await.unwrap();
    let ids: Vec<String> = neighbors["neighbors"].as_array().unwrap().iter().map(|n| n["id"].as_str().unwrap().to_string()).collect();
    assert_eq!(ids, vec![target_id.to_string()]);
}

#[tokio::test]
async fn list_entities_and_relations_reflect_what_was_created() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    seed_related_entities(&mut harness, project_id).await;

    let entities = harness.call_tool("graph", json!({ "project_id": project_id, "action": "list-entities" })).await.unwrap();
    assert_eq!(entities["entities"].as_array().unwrap().len(), 2);

    let relations = harness.call_tool("graph", json!({ "project_id": project_id, "action": "list-relations" })).await.unwrap();
    assert_eq!(relations["relations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn session_open_touch_close_lifecycle() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    let opened = harness.call_tool("session", json!({ "project_id": project_id, "action": "open", "label": "debugging session" })).await.unwrap();
    let session_id = opened["session"]["id"].clone();

    let touched = harness.call_tool("session", json!({ "project_id": project_id, "action": "touch", "id": session_id })).await.unwrap();
    assert_eq!(touched["session"]["id"], session_id);

    let closed = harness.call_tool("session", json!({ "project_id": project_id, "action": "close", "id": session_id })).await.unwrap();
    assert_eq!(closed["session"]["id"], session_id);
}

#[tokio::test]
async fn touching_an_unknown_session_is_an_error() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let result = harness.call_tool("session", json!({ "project_id": project_id, "action": "touch", "id": Uuid::new_v4() })).await;
    assert!(result.is_err());
}
