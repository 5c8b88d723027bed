//! Fixture builders
//!
//! Seed a [`TestHarness`] with realistic memories through the tool
//! surface, the same way a real agent session would populate it. Kept
//! thin on purpose: each builder returns the ids callers need for
//! assertions rather than a pile of config knobs.

use serde_json::json;
use uuid::Uuid;

use crate::harness::TestHarness;

/// Ingest a handful of episodic events with distinct content, returning
/// their event ids in insertion order.
pub async fn seed_episodic_events(harness: &mut TestHarness, project_id: Uuid, contents: &[&str]) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(contents.len());
    for content in contents {
        let result = harness
            .call_tool("ingest-event", json!({ "project_id": project_id, "content": content }))
            .await
            .expect("ingest-event should succeed");
        let id = result["event"]["id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("created event carries an id");
        ids.push(id);
    }
    ids
}

/// Three topical clusters (programming, science, cooking), useful for
/// asserting that `recall` returns on-topic results rather than everything.
pub async fn seed_search_scenario(harness: &mut TestHarness, project_id: Uuid) {
    seed_episodic_events(
        harness,
        project_id,
        &[
            "Rust uses ownership and borrowing to guarantee memory safety without a garbage collector",
            "Python's dynamic typing makes it popular for data science and rapid prototyping",
            "JavaScript runs in the browser and on the server via Node.js",
        ],
    )
    .await;
    seed_episodic_events(
        harness,
        project_id,
        &[
            "Mitochondria generate most of a cell's ATP supply",
            "DNA encodes genetic information as a sequence of nucleotide bases",
            "Gravity is the attractive force between any two masses",
        ],
    )
    .await;
    seed_episodic_events(
        harness,
        project_id,
        &["Boil salted water before adding pasta so it cooks evenly", "Chocolate cake needs cocoa powder, eggs, and a leavening agent"],
    )
    .await;
}

/// A two-task chain: `prereq` must be `done` before `dependent` shows up
/// in `ready`. Returns `(prereq_id, dependent_id)`.
pub async fn seed_task_chain(harness: &mut TestHarness, project_id: Uuid) -> (Uuid, Uuid) {
    let prereq = harness
        .call_tool("task", json!({ "project_id": project_id, "action": "create", "title": "draft the migration plan" }))
        .await
        .expect("create prereq task");
    let prereq_id = Uuid::parse_str(prereq["task"]["id"].as_str().unwrap()).unwrap();

    let dependent = harness
        .call_tool(
            "task",
            json!({
                "project_id": project_id,
                "action": "create",
                "title": "execute the migration",
                "dependencies": [prereq_id],
            }),
        )
        .await
        .expect("create dependent task");
    let dependent_id = Uuid::parse_str(dependent["task"]["id"].as_str().unwrap()).unwrap();

    (prereq_id, dependent_id)
}

/// Two entities related by a single edge. Returns `(source_id, target_id)`.
pub async fn seed_related_entities(harness: &mut TestHarness, project_id: Uuid) -> (Uuid, Uuid) {
    let source = harness
        .call_tool("graph", json!({ "project_id": project_id, "action": "upsert-entity", "name": "athena-core", "entity_type": "crate" }))
        .await
        .expect("upsert source entity");
    let source_id = Uuid::parse_str(source["entity"]["id"].as_str().unwrap()).unwrap();

    let target = harness
        .call_tool("graph", json!({ "project_id": project_id, "action": "upsert-entity", "name": "athena-mcp", "entity_type": "crate" }))
        .await
        .expect("upsert target entity");
    let target_id = Uuid::parse_str(target["entity"]["id"].as_str().unwrap()).unwrap();

    harness
        .call_tool(
            "graph",
            json!({
                "project_id": project_id,
                "action": "relate",
                "source_entity_id": source_id,
                "target_entity_id": target_id,
                "relation_type": "depends_on",
            }),
        )
        .await
        .expect("relate entities");

    (source_id, target_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_episodic_events_returns_one_id_per_content() {
        let mut harness = TestHarness::new().await;
        let project_id = Uuid::new_v4();
        let ids = seed_episodic_events(&mut harness, project_id, &["first event", "second event"]).await;
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn seed_task_chain_links_dependent_to_prereq() {
        let mut harness = TestHarness::new().await;
        let project_id = Uuid::new_v4();
        let (prereq_id, dependent_id) = seed_task_chain(&mut harness, project_id).await;

        let ready = harness.call_tool("task", json!({ "project_id": project_id, "action": "ready" })).await.unwrap();
        let ready_ids: Vec<String> = ready["tasks"].as_array().unwrap().iter().map(|t| t["id"].as_str().unwrap().to_string()).collect();
        assert!(ready_ids.contains(&prereq_id.to_string()));
        assert!(!ready_ids.contains(&dependent_id.to_string()));
    }
}
