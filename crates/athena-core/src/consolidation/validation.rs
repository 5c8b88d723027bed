//! System 2: slow LLM validation
//!
//! Takes System 1's candidate clusters and asks the LLM collaborator to
//! phrase each as a single grounded statement, then checks the result
//! against the project's existing semantic memories for contradictions.

use std::sync::Arc;

use crate::collaborators::LlmCollaborator;
use crate::error::Result;
use crate::layers::semantic::SemanticStore;
use crate::model::{ProjectId, SemanticMemory};

use super::clustering::EventCluster;

pub struct ValidatedCandidate {
    pub statement: String,
    pub source_event_ids: Vec<uuid::Uuid>,
    pub contradicts: Vec<uuid::Uuid>,
}

pub async fn validate_cluster(
    llm: &Arc<dyn LlmCollaborator>,
    semantic_store: &SemanticStore,
    project_id: ProjectId,
    cluster: &EventCluster,
) -> Result<ValidatedCandidate> {
    let joined: String = cluster.events.iter().map(|e| e.content.as_str()).collect::<Vec<_>>().join("\n");
    let prompt = format!(
        "Summarize the following related observations as one concise factual statement:\n{joined}"
    );
    let statement = llm.complete(&prompt).await?;

    let existing = semantic_store.list(project_id, 10_000).await?;
    let contradicts = find_contradictions(&statement, &existing);

    Ok(ValidatedCandidate {
        statement,
        source_event_ids: cluster.events.iter().map(|e| e.id).collect(),
        contradicts,
    })
}

/// Heuristic contradiction check: a naive negation-word overlap test.
/// Good enough to flag candidates for a verification gate pass, not a
/// substitute for one.
fn find_contradictions(statement: &str, existing: &[SemanticMemory]) -> Vec<uuid::Uuid> {
    let negations = ["not", "never", "no longer", "isn't", "doesn't"];
    let statement_has_negation = negations.iter().any(|n| statement.to_lowercase().contains(n));

    existing
        .iter()
        .filter(|m| {
            let shares_subject = shares_significant_words(&m.statement, statement);
            let other_has_negation = negations.iter().any(|n| m.statement.to_lowercase().contains(n));
            shares_subject && statement_has_negation != other_has_negation
        })
        .map(|m| m.id)
        .collect()
}

fn shares_significant_words(a: &str, b: &str) -> bool {
    let a_words: std::collections::HashSet<&str> = a.split_whitespace().filter(|w| w.len() > 4).collect();
    let b_words: std::collections::HashSet<&str> = b.split_whitespace().filter(|w| w.len() > 4).collect();
    a_words.intersection(&b_words).count() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn memory(statement: &str) -> SemanticMemory {
        let now = Utc::now();
        SemanticMemory {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            statement: statement.into(),
            memory_type: crate::model::MemoryType::Fact,
            embedding: None,
            confidence: 0.8,
            source_event_ids: vec![],
            contradicted_by: vec![],
            tags: vec![],
            lexical_index_token: String::new(),
            access_count: 0,
            last_accessed: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn opposite_claims_about_the_same_subject_are_flagged() {
        let existing = vec![memory("the deployment pipeline succeeded overnight")];
        let contradictions = find_contradictions("the deployment pipeline did not succeed overnight", &existing);
        assert_eq!(contradictions.len(), 1);
    }

    #[test]
    fn unrelated_statements_are_not_flagged() {
        let existing = vec![memory("the deployment pipeline succeeded overnight")];
        let contradictions = find_contradictions("lunch was served at noon", &existing);
        assert!(contradictions.is_empty());
    }
}
