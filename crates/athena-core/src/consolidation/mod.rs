//! Two-stage consolidation pipeline
//!
//! System 1 clusters a batch of episodic events by similarity (cheap,
//! always runs). System 2 asks the LLM collaborator to phrase each
//! cluster as a semantic memory and checks it against existing memories
//! for contradictions (§4.6). Every run is recorded as a
//! [`crate::model::ConsolidationRun`] regardless of outcome.
//!
//! Idempotency (§4.6) comes from two places at once: the batch is
//! filtered to events still `Pending` before clustering, so a second run
//! over the same window has nothing left to consider; and
//! `SemanticStore::upsert` itself re-hashes the proposed statement and
//! skips the write if it already exists. Either guard alone would do —
//! both together mean a re-run can never double-create a memory even if
//! the status transition is interrupted mid-batch.

pub mod clustering;
pub mod validation;

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::collaborators::LlmCollaborator;
use crate::error::Result;
use crate::layers::episodic::EpisodicStore;
use crate::layers::semantic::{SemanticStore, UpsertOutcome};
use crate::model::{ConsolidationRun, ConsolidationStatus, EventConsolidationStatus, MemoryType, ProjectId, SemanticMemory};
use crate::storage::{Namespace, Record, StorageBackend};

pub struct ConsolidationPipeline {
    backend: Arc<dyn StorageBackend>,
    episodic: Arc<EpisodicStore>,
    semantic: Arc<SemanticStore>,
    llm: Arc<dyn LlmCollaborator>,
}

impl ConsolidationPipeline {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        episodic: Arc<EpisodicStore>,
        semantic: Arc<SemanticStore>,
        llm: Arc<dyn LlmCollaborator>,
    ) -> Self {
        Self { backend, episodic, semantic, llm }
    }

    pub async fn run(&self, project_id: ProjectId, batch_size: usize) -> Result<ConsolidationRun> {
        let started_at = Utc::now();
        let mut run = ConsolidationRun {
            id: Uuid::new_v4(),
            project_id,
            status: ConsolidationStatus::Running,
            trigger: Default::default(),
            strategy: Default::default(),
            events_considered: 0,
            clusters_formed: 0,
            memories_created: 0,
            memories_updated: 0,
            procedures_created: 0,
            contradictions_found: 0,
            validation_calls: 0,
            quality_score: 0.0,
            created_memory_ids: vec![],
            started_at,
            finished_at: None,
        };
        self.persist(&run).await?;

        let mut events = self.episodic.list_recent(project_id, batch_size).await?;
        events.retain(|e| e.consolidation_status == EventConsolidationStatus::Pending);
        run.events_considered = events.len() as u32;

        for event in &events {
            self.episodic.set_consolidation_status(project_id, event.id, EventConsolidationStatus::InProgress).await?;
        }

        let clusters = clustering::cluster_events(events);

        for cluster in &clusters {
            let event_ids: Vec<Uuid> = cluster.events.iter().map(|e| e.id).collect();

            let validated = match validation::validate_cluster(&self.llm, &self.semantic, project_id, cluster).await {
                Ok(v) => v,
                Err(_) => {
                    for id in &event_ids {
                        self.episodic.set_consolidation_status(project_id, *id, EventConsolidationStatus::Pending).await?;
                    }
                    continue;
                }
            };

            let now = Utc::now();
            let contradicts_count = validated.contradicts.len() as u32;
            let memory = SemanticMemory {
                id: Uuid::new_v4(),
                project_id,
                statement: validated.statement,
                memory_type: MemoryType::Fact,
                embedding: cluster.events.first().and_then(|e| e.embedding.clone()),
                confidence: 0.6,
                source_event_ids: validated.source_event_ids,
                contradicted_by: validated.contradicts,
                tags: vec![],
                lexical_index_token: String::new(),
                access_count: 0,
                last_accessed: now,
                created_at: now,
                updated_at: now,
            };

            match self.semantic.upsert(memory).await? {
                UpsertOutcome::Created(id) => {
                    run.memories_created += 1;
                    run.created_memory_ids.push(id);
                }
                UpsertOutcome::Duplicate(_) => {
                    run.memories_updated += 1;
                }
            }
            run.contradictions_found += contradicts_count;

            for id in &event_ids {
                self.episodic.set_consolidation_status(project_id, *id, EventConsolidationStatus::Consolidated).await?;
            }
        }

        run.status = ConsolidationStatus::Completed;
        run.finished_at = Some(Utc::now());
        self.persist(&run).await?;
        Ok(run)
    }

    async fn persist(&self, run: &ConsolidationRun) -> Result<()> {
        let body = serde_json::to_value(run).unwrap_or(json!({}));
        self.backend
            .put(Record { id: run.id, project_id: run.project_id, namespace: Namespace::Consolidation.as_str(), body, embedding: None, lexical_text: None })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FakeEmbeddingCollaborator, FakeLlmCollaborator};
    use crate::layers::episodic::NewEpisodicEvent;
    use crate::pii::PiiPolicy;
    use crate::storage::SqliteBackend;

    async fn pipeline() -> (ConsolidationPipeline, Arc<EpisodicStore>, Arc<SemanticStore>, ProjectId) {
        let backend: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let embedder = Arc::new(FakeEmbeddingCollaborator::new(16));
        let episodic = Arc::new(EpisodicStore::new(backend.clone(), embedder.clone(), PiiPolicy::balanced()));
        let semantic = Arc::new(SemanticStore::new(backend.clone()));
        let llm: Arc<dyn LlmCollaborator> = Arc::new(FakeLlmCollaborator);
        let project = Uuid::new_v4();

        episodic
            .create_event(project, NewEpisodicEvent { content: "the staging database ran out of disk space".into(), ..Default::default() })
            .await
            .unwrap();

        let pipeline = ConsolidationPipeline::new(backend, episodic.clone(), semantic.clone(), llm);
        (pipeline, episodic, semantic, project)
    }

    #[tokio::test]
    async fn consolidation_run_promotes_events_into_a_semantic_memory() {
        let (pipeline, _episodic, semantic, project) = pipeline().await;
        let run = pipeline.run(project, 100).await.unwrap();

        assert_eq!(run.status, ConsolidationStatus::Completed);
        assert_eq!(run.events_considered, 1);
        assert_eq!(run.memories_created, 1);
        assert_eq!(run.created_memory_ids.len(), 1);

        let memories = semantic.list(project, 10).await.unwrap();
        assert_eq!(memories.len(), 1);
    }

    #[tokio::test]
    async fn consolidation_run_with_no_events_still_completes() {
        let backend: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let embedder = Arc::new(FakeEmbeddingCollaborator::new(16));
        let episodic = Arc::new(EpisodicStore::new(backend.clone(), embedder, PiiPolicy::balanced()));
        let semantic = Arc::new(SemanticStore::new(backend.clone()));
        let llm: Arc<dyn LlmCollaborator> = Arc::new(FakeLlmCollaborator);

        let pipeline = ConsolidationPipeline::new(backend, episodic, semantic, llm);
        let run = pipeline.run(Uuid::new_v4(), 100).await.unwrap();
        assert_eq!(run.status, ConsolidationStatus::Completed);
        assert_eq!(run.events_considered, 0);
        assert_eq!(run.memories_created, 0);
    }

    #[tokio::test]
    async fn running_twice_over_the_same_batch_creates_nothing_new() {
        let (pipeline, _episodic, semantic, project) = pipeline().await;
        let first = pipeline.run(project, 100).await.unwrap();
        assert_eq!(first.memories_created, 1);

        let second = pipeline.run(project, 100).await.unwrap();
        assert_eq!(second.events_considered, 0);
        assert_eq!(second.memories_created, 0);
        assert!(second.created_memory_ids.is_empty());

        assert_eq!(semantic.list(project, 10).await.unwrap().len(), 1);
    }
}
