//! Procedural memory success tracking, and the SQLite online backup tool.

use athena_e2e_tests::harness::TestHarness;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn recording_outcomes_updates_the_success_rate() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();

    let created = harness
        .call_tool(
            "procedure",
            json!({
                "project_id": project_id,
                "action": "create",
                "name": "restart the ingest worker",
                "steps": [
                    { "ordinal": 1, "instruction": "drain the queue" },
                    { "ordinal": 2, "instruction": "stop the process" },
                    { "ordinal": 3, "instruction": "start the process" },
                ],
            }),
        )
        .await
        .unwrap();
    let id = created["procedure"]["id"].clone();
    assert_eq!(created["procedure"]["success_count"], 0);

    let updated = harness.call_tool("procedure", json!({ "project_id": project_id, "action": "record-outcome", "id": id, "succeeded": true })).await.unwrap();
    assert_eq!(updated["procedure"]["success_count"], 1);
    assert_eq!(updated["procedure"]["failure_count"], 0);
}

#[tokio::test]
async fn recording_outcome_for_unknown_procedure_is_an_error() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    let result = harness.call_tool("procedure", json!({ "project_id": project_id, "action": "record-outcome", "id": Uuid::new_v4(), "succeeded": false })).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn backup_writes_a_restorable_sqlite_file() {
    let mut harness = TestHarness::new().await;
    let project_id = Uuid::new_v4();
    harness.call_tool("ingest-event", json!({ "project_id": project_id, "content": "pre-backup marker event" })).await.unwrap();

    let dest_dir = tempfile::tempdir().unwrap();
    let dest = dest_dir.path().join("backup.db");

    let result = harness.call_tool("backup", json!({ "destination_path": dest.to_string_lossy() })).await.unwrap();
    assert_eq!(result["outcome"], "backed_up");
    assert!(dest.exists());
}
