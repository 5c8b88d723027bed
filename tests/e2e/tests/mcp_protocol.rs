//! Protocol-level behavior: tool discovery, `ping`, `resources/list`, and
//! rejecting calls before initialization is complete.

use athena_e2e_tests::harness::TestHarness;
use serde_json::json;

#[tokio::test]
async fn tools_list_advertises_every_registered_tool_with_a_schema() {
    let mut harness = TestHarness::new().await;
    let response = harness.request("tools/list", None).await.unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();

    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    for expected in ["recall", "ingest-event", "consolidate", "working-memory-push", "task", "procedure", "graph", "session", "verify-decision-feedback", "system-status", "backup"] {
        assert!(names.contains(&expected), "missing tool '{expected}' in tools/list");
    }

    for tool in &tools {
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[tokio::test]
async fn ping_succeeds_once_initialized() {
    let mut harness = TestHarness::new().await;
    let response = harness.request("ping", None).await.unwrap();
    assert!(response.error.is_none());
}

#[tokio::test]
async fn resources_list_is_empty() {
    let mut harness = TestHarness::new().await;
    let response = harness.request("resources/list", None).await.unwrap();
    assert_eq!(response.result.unwrap()["resources"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn calling_an_unknown_tool_returns_method_not_found() {
    let mut harness = TestHarness::new().await;
    let response = harness.request("tools/call", Some(json!({ "name": "does-not-exist", "arguments": {} }))).await.unwrap();
    assert_eq!(response.error.unwrap().code, -32601);
}

#[tokio::test]
async fn system_status_reports_healthy_on_a_fresh_store() {
    let mut harness = TestHarness::new().await;
    let status = harness.call_tool("system-status", json!({})).await.unwrap();
    assert_eq!(status["healthy"], true);
}
