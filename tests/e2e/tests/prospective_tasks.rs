//! Deferred-task dependency graph through the `task` tool (§8 "dependency
//! cycle" scenario).

use athena_e2e_tests::harness::TestHarness;
use athena_e2e_tests::mocks::fixtures::seed_task_chain;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn completing_the_prerequisite_unblocks_the_dependent_task() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let (prereq_id, dependent_id) = seed_task_chain(&mut harness, project_id).await;

    let ready = harness.call_tool("task", json!({ "project_id": project_id, "action": "ready" })).await.unwrap();
    let ready_ids: Vec<String> = ready["tasks"].as_array().unwrap().iter().map(|t| t["id"].as_str().unwrap().to_string()).collect();
    assert!(ready_ids.contains(&prereq_id.to_string()));
    assert!(!ready_ids.contains(&dependent_id.to_string()));

    harness.call_tool("task", json!({ "project_id": project_id, "action": "set-status", "id": prereq_id, "status": "completed" })).await.unwrap();

    let ready_after = harness.call_tool("task", json!({ "project_id": project_id, "action": "ready" })).await.unwrap();
    let ready_ids_after: Vec<String> = ready_after["tasks"].as_array().unwrap().iter().map(|t| t["id"].as_str().unwrap().to_string()).collect();
    assert!(ready_ids_after.contains(&dependent_id.to_string()));
}

#[tokio::test]
async fn adding_a_dependency_that_closes_a_cycle_is_rejected_over_mcp() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    let a = harness.call_tool("task", json!({ "project_id": project_id, "action": "create", "title": "task a" })).await.unwrap();
    let a_id = a["task"]["id"].clone();

    let b = harness
        .call_tool("task", json!({ "project_id": project_id, "action": "create", "title": "task b", "dependencies": [a_id] }))
        .await
        .unwrap();
    let b_id = b["task"]["id"].clone();

    // b already depends on a; making a depend on b would close the cycle.
    let result = harness
        .call_tool("task", json!({ "project_id": project_id, "action": "add-dependency", "id": a_id, "depends_on_id": b_id }))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn getting_an_unknown_task_id_is_an_error() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let result = harness.call_tool("task", json!({ "project_id": project_id, "action": "get", "id": Uuid::new_v4() })).await;
    // get returns Ok(null) for a missing task rather than an explicit error.
    assert!(result.unwrap()["task"].is_null());
}
