//! Working-memory controller
//!
//! A bounded per-session buffer (capacity 7±2, §4.7). Admitting an item
//! past capacity evicts the lowest-scoring resident rather than growing
//! unbounded — but eviction is a routing decision, not a discard: the
//! §4.7 content heuristics decide which durable layer the evicted item's
//! summary belongs in, and it is promoted there before the slot is
//! freed. An item routed to episodic is already at home and needs no
//! promotion; everything else gets a low-fidelity stub record (no
//! embedding — this controller has no embedder dependency, the full
//! consolidation pipeline is what upgrades a promoted stub into a
//! properly grounded memory on its next pass).

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;
use crate::layers::procedural::ProceduralStore;
use crate::layers::prospective::ProspectiveStore;
use crate::layers::semantic::{SemanticStore, UpsertOutcome};
use crate::model::{MemoryType, ProcedureSource, ProcedureStep, ProjectId, SemanticMemory, TaskPriority, WorkingMemoryItem};
use crate::storage::{Namespace, Record, ScanFilter, StorageBackend};

const WEIGHT_RECENCY: f64 = 0.4;
const WEIGHT_IMPORTANCE: f64 = 0.35;
const WEIGHT_DISTINCTIVENESS: f64 = 0.25;

/// Composite admission/eviction score for a working-memory item.
pub fn composite_score(item: &WorkingMemoryItem, now: chrono::DateTime<Utc>) -> f64 {
    let age_ms = (now - item.last_touched_at).num_milliseconds().max(0) as f64;
    let recency = 0.5_f64.powf(age_ms / (60.0 * 60.0 * 1000.0)); // 1-hour half-life
    WEIGHT_RECENCY * recency + WEIGHT_IMPORTANCE * item.importance.clamp(0.0, 1.0) + WEIGHT_DISTINCTIVENESS * item.distinctiveness.clamp(0.0, 1.0)
}

/// Future-time markers route a summary to prospective.
const FUTURE_MARKERS: [&str; 8] = ["will ", "tomorrow", "next week", "next sprint", "plan to", "going to", "upcoming", "later today"];
/// Temporal-past markers keep a summary in episodic.
const PAST_MARKERS: [&str; 7] = ["yesterday", "last week", "earlier", "previously", " ago", "was ", "had "];
/// Leading imperative/action verbs route a summary to procedural.
const IMPERATIVE_VERBS: [&str; 10] = ["run", "fix", "deploy", "check", "add", "remove", "update", "investigate", "review", "restart"];
/// Leading interrogatives mark question-form content.
const QUESTION_LEADS: [&str; 9] = ["who ", "what ", "when ", "where ", "why ", "how ", "should ", "can ", "could "];

/// Which durable layer a working-memory summary should be routed to on
/// eviction, per §4.7's content heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingTarget {
    Episodic,
    Semantic,
    Procedural,
    Prospective,
}

/// Classify a summary's destination layer. Order matters: question-form
/// content that is also imperative ("should we restart the service?")
/// reads as an open task, not a procedure to run unattended, so
/// question-form is checked before imperative.
pub fn route(summary: &str) -> RoutingTarget {
    let lower = summary.trim().to_lowercase();
    let is_question = lower.ends_with('?') || QUESTION_LEADS.iter().any(|lead| lower.starts_with(lead));
    if is_question {
        return RoutingTarget::Prospective;
    }
    if FUTURE_MARKERS.iter().any(|m| lower.contains(m)) {
        return RoutingTarget::Prospective;
    }
    let first_word = lower.split_whitespace().next().unwrap_or("");
    if IMPERATIVE_VERBS.contains(&first_word) {
        return RoutingTarget::Procedural;
    }
    if PAST_MARKERS.iter().any(|m| lower.contains(m)) {
        return RoutingTarget::Episodic;
    }
    RoutingTarget::Semantic
}

/// Where an evicted item ended up. `Episodic` means no promotion was
/// needed; the other variants carry the id of the stub record created in
/// that layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotedTo {
    Episodic,
    Semantic(Uuid),
    Procedural(Uuid),
    Prospective(Uuid),
}

pub struct WorkingMemoryController {
    backend: Arc<dyn StorageBackend>,
    semantic: Arc<SemanticStore>,
    procedural: Arc<ProceduralStore>,
    prospective: Arc<ProspectiveStore>,
    capacity: usize,
}

/// What happened to the buffer when an item was admitted.
pub enum AdmitOutcome {
    Admitted,
    AdmittedWithEviction(WorkingMemoryItem, PromotedTo),
    Rejected,
}

impl WorkingMemoryController {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        semantic: Arc<SemanticStore>,
        procedural: Arc<ProceduralStore>,
        prospective: Arc<ProspectiveStore>,
        capacity: usize,
    ) -> Self {
        Self { backend, semantic, procedural, prospective, capacity }
    }

    pub async fn admit(
        &self,
        project_id: ProjectId,
        session_id: Uuid,
        subject_id: Uuid,
        subject_layer: String,
        summary: String,
        importance: f64,
        distinctiveness: f64,
    ) -> Result<AdmitOutcome> {
        let now = Utc::now();
        let candidate = WorkingMemoryItem {
            id: Uuid::new_v4(),
            project_id,
            session_id,
            subject_id,
            subject_layer,
            summary,
            importance,
            distinctiveness,
            entered_at: now,
            last_touched_at: now,
        };

        let mut resident = self.for_session(project_id, session_id).await?;
        if resident.len() < self.capacity {
            self.put(&candidate).await?;
            return Ok(AdmitOutcome::Admitted);
        }

        resident.sort_by(|a, b| composite_score(a, now).partial_cmp(&composite_score(b, now)).unwrap_or(std::cmp::Ordering::Equal));
        let weakest = &resident[0];
        let weakest_score = composite_score(weakest, now);
        let candidate_score = composite_score(&candidate, now);

        if candidate_score <= weakest_score {
            return Ok(AdmitOutcome::Rejected);
        }

        let evicted = resident.remove(0);
        let promoted_to = self.promote(project_id, &evicted).await?;
        self.backend.delete(Namespace::WorkingMemory.as_str(), project_id, evicted.id).await?;
        self.put(&candidate).await?;
        Ok(AdmitOutcome::AdmittedWithEviction(evicted, promoted_to))
    }

    /// Route an evicted item's summary to its durable layer and create a
    /// stub record there. Episodic routing is a no-op: the item's
    /// subject already lives in episodic.
    async fn promote(&self, project_id: ProjectId, item: &WorkingMemoryItem) -> Result<PromotedTo> {
        match route(&item.summary) {
            RoutingTarget::Episodic => Ok(PromotedTo::Episodic),
            RoutingTarget::Semantic => {
                let now = Utc::now();
                let memory = SemanticMemory {
                    id: Uuid::new_v4(),
                    project_id,
                    statement: item.summary.clone(),
                    memory_type: MemoryType::Fact,
                    embedding: None,
                    confidence: 0.4,
                    source_event_ids: vec![item.subject_id],
                    contradicted_by: vec![],
                    tags: vec!["promoted_from_working_memory".into()],
                    lexical_index_token: String::new(),
                    access_count: 0,
                    last_accessed: now,
                    created_at: now,
                    updated_at: now,
                };
                let id = match self.semantic.upsert(memory).await? {
                    UpsertOutcome::Created(id) | UpsertOutcome::Duplicate(id) => id,
                };
                Ok(PromotedTo::Semantic(id))
            }
            RoutingTarget::Procedural => {
                let procedure = self
                    .procedural
                    .create(
                        project_id,
                        item.summary.clone(),
                        "promoted_from_working_memory".into(),
                        ProcedureSource::Learned,
                        vec![ProcedureStep { ordinal: 1, instruction: item.summary.clone() }],
                        vec![],
                        None,
                        None,
                    )
                    .await?;
                Ok(PromotedTo::Procedural(procedure.id))
            }
            RoutingTarget::Prospective => {
                let task = self
                    .prospective
                    .create(project_id, item.summary.clone(), TaskPriority::Medium, None, None, None, vec![])
                    .await?;
                Ok(PromotedTo::Prospective(task.id))
            }
        }
    }

    pub async fn touch(&self, project_id: ProjectId, id: Uuid) -> Result<Option<WorkingMemoryItem>> {
        let Some(record) = self.backend.get(Namespace::WorkingMemory.as_str(), project_id, id).await? else {
            return Ok(None);
        };
        let Some(mut item) = serde_json::from_value::<WorkingMemoryItem>(record.body).ok() else {
            return Ok(None);
        };
        item.last_touched_at = Utc::now();
        self.put(&item).await?;
        Ok(Some(item))
    }

    pub async fn for_session(&self, project_id: ProjectId, session_id: Uuid) -> Result<Vec<WorkingMemoryItem>> {
        let records = self.backend.scan(Namespace::WorkingMemory.as_str(), project_id, ScanFilter { tag: None, limit: Some(10_000) }).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| serde_json::from_value::<WorkingMemoryItem>(r.body).ok())
            .filter(|i| i.session_id == session_id)
            .collect())
    }

    async fn put(&self, item: &WorkingMemoryItem) -> Result<()> {
        let body = serde_json::to_value(item).unwrap_or(json!({}));
        self.backend
            .put(Record { id: item.id, project_id: item.project_id, namespace: Namespace::WorkingMemory.as_str(), body, embedding: None, lexical_text: Some(item.summary.clone()) })
            .await
    }

    /// Evict resident items whose composite score has decayed past
    /// `threshold`, promoting each per §4.7 just like a capacity-driven
    /// eviction.
    pub async fn sweep_decayed(&self, project_id: ProjectId, threshold: f64) -> Result<usize> {
        let records = self.backend.scan(Namespace::WorkingMemory.as_str(), project_id, ScanFilter { tag: None, limit: Some(10_000) }).await?;
        let now = Utc::now();
        let mut evicted = 0;
        for record in records {
            let Some(item) = serde_json::from_value::<WorkingMemoryItem>(record.body).ok() else { continue };
            if composite_score(&item, now) < threshold {
                self.promote(project_id, &item).await?;
                self.backend.delete(Namespace::WorkingMemory.as_str(), project_id, item.id).await?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteBackend;

    fn controller(capacity: usize) -> WorkingMemoryController {
        let backend: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::open_in_memory().unwrap());
        WorkingMemoryController::new(
            backend.clone(),
            Arc::new(SemanticStore::new(backend.clone())),
            Arc::new(ProceduralStore::new(backend.clone())),
            Arc::new(ProspectiveStore::new(backend.clone())),
            capacity,
        )
    }

    #[test]
    fn routes_by_content_heuristics() {
        assert_eq!(route("the deploy finished yesterday"), RoutingTarget::Episodic);
        assert_eq!(route("will roll out the fix next week"), RoutingTarget::Prospective);
        assert_eq!(route("restart the ingestion worker"), RoutingTarget::Procedural);
        assert_eq!(route("should we restart the service?"), RoutingTarget::Prospective);
        assert_eq!(route("the service uses exponential backoff"), RoutingTarget::Semantic);
    }

    #[tokio::test]
    async fn admitting_past_capacity_evicts_the_weakest_item() {
        let controller = controller(3);
        let project = Uuid::new_v4();
        let session = Uuid::new_v4();

        for i in 0..3 {
            let outcome = controller
                .admit(project, session, Uuid::new_v4(), "episodic".into(), format!("item {i}"), 0.1, 0.1)
                .await
                .unwrap();
            assert!(matches!(outcome, AdmitOutcome::Admitted));
        }

        let outcome = controller
            .admit(project, session, Uuid::new_v4(), "episodic".into(), "high importance item".into(), 0.99, 0.99)
            .await
            .unwrap();
        assert!(matches!(outcome, AdmitOutcome::AdmittedWithEviction(_, _)));

        let resident = controller.for_session(project, session).await.unwrap();
        assert_eq!(resident.len(), 3);
    }

    #[tokio::test]
    async fn eviction_of_a_procedural_sounding_summary_promotes_into_procedural() {
        let controller = controller(1);
        let project = Uuid::new_v4();
        let session = Uuid::new_v4();

        controller.admit(project, session, Uuid::new_v4(), "episodic".into(), "noted an issue yesterday".into(), 0.01, 0.01).await.unwrap();
        let outcome = controller
            .admit(project, session, Uuid::new_v4(), "episodic".into(), "restart the ingestion worker".into(), 0.9, 0.9)
            .await
            .unwrap();
        let AdmitOutcome::AdmittedWithEviction(_, promoted) = outcome else { panic!("expected an eviction") };
        assert!(matches!(promoted, PromotedTo::Episodic));

        // Evict the just-admitted procedural-sounding item in turn.
        let outcome = controller
            .admit(project, session, Uuid::new_v4(), "episodic".into(), "check the disk usage".into(), 0.95, 0.95)
            .await
            .unwrap();
        let AdmitOutcome::AdmittedWithEviction(evicted, promoted) = outcome else { panic!("expected an eviction") };
        assert_eq!(evicted.summary, "restart the ingestion worker");
        assert!(matches!(promoted, PromotedTo::Procedural(_)));
    }

    #[tokio::test]
    async fn low_importance_candidate_is_rejected_when_buffer_is_full_of_strong_items() {
        let controller = controller(2);
        let project = Uuid::new_v4();
        let session = Uuid::new_v4();

        for _ in 0..2 {
            controller
                .admit(project, session, Uuid::new_v4(), "episodic".into(), "strong".into(), 0.99, 0.99)
                .await
                .unwrap();
        }

        let outcome = controller
            .admit(project, session, Uuid::new_v4(), "episodic".into(), "weak".into(), 0.01, 0.01)
            .await
            .unwrap();
        assert!(matches!(outcome, AdmitOutcome::Rejected));
    }
}
