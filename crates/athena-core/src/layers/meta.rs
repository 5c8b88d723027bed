//! Meta-memory layer store
//!
//! Judgments recorded about other memories — produced by the verification
//! gateway and by explicit feedback tool calls. Tier 2 of the cascading
//! recall orchestrator reads this layer to weight candidates by past
//! judgments on the same subject.
//!
//! `detect_gaps` reads the semantic layer directly (cosine similarity over
//! embeddings) rather than going through retrieval — it is itself one of
//! the things retrieval's confidence scoring draws on, so it can't depend
//! on the pipeline it feeds.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;
use crate::layers::episodic::EpisodicStore;
use crate::layers::semantic::SemanticStore;
use crate::model::{MetaMemoryEntry, ProjectId};
use crate::retrieval::confidence::layer_baseline;
use crate::storage::{Namespace, Record, ScanFilter, StorageBackend};

/// A pair of semantic memories judged to contradict each other.
#[derive(Debug, Clone)]
pub struct Contradiction {
    pub a: Uuid,
    pub b: Uuid,
    pub detail: String,
}

/// Result of scanning a project's semantic memories for quality gaps.
#[derive(Debug, Clone, Default)]
pub struct GapReport {
    pub contradictions: Vec<Contradiction>,
    pub uncertainties: Vec<String>,
    pub ambiguities: Vec<String>,
    pub coverage_score: f64,
}

/// Markers whose presence on exactly one side of an otherwise-similar pair
/// of statements flags a contradiction rather than a paraphrase.
const NEGATION_MARKERS: [&str; 7] = ["not ", "no longer", "never", "isn't", "doesn't", "cannot", "won't"];

const CONTRADICTION_SIMILARITY_MIN: f32 = 0.85;
const AMBIGUITY_SIMILARITY_RANGE: (f32, f32) = (0.55, 0.85);
const UNCERTAINTY_CONFIDENCE_MAX: f64 = 0.5;

pub struct MetaStore {
    backend: Arc<dyn StorageBackend>,
    semantic: Arc<SemanticStore>,
    episodic: Arc<EpisodicStore>,
}

impl MetaStore {
    pub fn new(backend: Arc<dyn StorageBackend>, semantic: Arc<SemanticStore>, episodic: Arc<EpisodicStore>) -> Self {
        Self { backend, semantic, episodic }
    }

    pub async fn record(&self, project_id: ProjectId, subject_id: Uuid, subject_layer: String, judgment: String, note: Option<String>) -> Result<MetaMemoryEntry> {
        let quality_baseline = layer_baseline(&subject_layer);
        let entry = MetaMemoryEntry {
            id: Uuid::new_v4(),
            project_id,
            subject_id,
            subject_layer,
            judgment,
            note,
            quality_baseline,
            observed_quality: quality_baseline,
            contradictions: vec![],
            uncertainties: vec![],
            expertise_score: 1.0,
            created_at: Utc::now(),
        };
        self.put(&entry).await?;
        Ok(entry)
    }

    /// Record an observed quality score for a subject against its layer's
    /// static baseline, deriving an expertise score of how that subject
    /// performs relative to its layer's norm.
    pub async fn record_quality(
        &self,
        project_id: ProjectId,
        subject_id: Uuid,
        subject_layer: String,
        observed_quality: f64,
    ) -> Result<MetaMemoryEntry> {
        let quality_baseline = layer_baseline(&subject_layer);
        let expertise_score = if quality_baseline > 0.0 { (observed_quality / quality_baseline).min(1.0) } else { 0.0 };
        let entry = MetaMemoryEntry {
            id: Uuid::new_v4(),
            project_id,
            subject_id,
            subject_layer,
            judgment: "quality_observation".into(),
            note: None,
            quality_baseline,
            observed_quality,
            contradictions: vec![],
            uncertainties: vec![],
            expertise_score,
            created_at: Utc::now(),
        };
        self.put(&entry).await?;
        Ok(entry)
    }

    pub async fn for_subject(&self, project_id: ProjectId, subject_id: Uuid) -> Result<Vec<MetaMemoryEntry>> {
        let records = self.backend.scan(Namespace::Meta.as_str(), project_id, ScanFilter { tag: None, limit: Some(10_000) }).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| serde_json::from_value::<MetaMemoryEntry>(r.body).ok())
            .filter(|e| e.subject_id == subject_id)
            .collect())
    }

    /// Scan a project's semantic memories for contradictions, ambiguous
    /// near-duplicates, low-confidence uncertainties, and overall episodic
    /// → semantic coverage.
    pub async fn detect_gaps(&self, project_id: ProjectId) -> Result<GapReport> {
        let memories = self.semantic.list(project_id, 10_000).await?;
        let episodic_count = self.episodic.list_recent(project_id, 100_000).await?.len();

        let mut report = GapReport::default();
        for memory in &memories {
            if memory.confidence < UNCERTAINTY_CONFIDENCE_MAX {
                report.uncertainties.push(memory.statement.clone());
            }
        }

        for i in 0..memories.len() {
            for j in (i + 1)..memories.len() {
                let (a, b) = (&memories[i], &memories[j]);
                let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) else { continue };
                let similarity = cosine_similarity(ea, eb);

                if similarity >= CONTRADICTION_SIMILARITY_MIN {
                    let a_negated = contains_negation(&a.statement);
                    let b_negated = contains_negation(&b.statement);
                    if a_negated != b_negated {
                        report.contradictions.push(Contradiction {
                            a: a.id,
                            b: b.id,
                            detail: format!("'{}' vs '{}'", a.statement, b.statement),
                        });
                        continue;
                    }
                }

                if similarity >= AMBIGUITY_SIMILARITY_RANGE.0 && similarity < AMBIGUITY_SIMILARITY_RANGE.1 {
                    report.ambiguities.push(format!("'{}' closely overlaps '{}'", a.statement, b.statement));
                }
            }
        }

        report.coverage_score =
            if episodic_count == 0 { 1.0 } else { (memories.len() as f64 / episodic_count as f64).min(1.0) };

        Ok(report)
    }

    async fn put(&self, entry: &MetaMemoryEntry) -> Result<()> {
        let body = serde_json::to_value(entry).unwrap_or(json!({}));
        self.backend
            .put(Record { id: entry.id, project_id: entry.project_id, namespace: Namespace::Meta.as_str(), body, embedding: None, lexical_text: entry.note.clone() })
            .await
    }
}

fn contains_negation(statement: &str) -> bool {
    let lower = statement.to_lowercase();
    NEGATION_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FakeEmbeddingCollaborator;
    use crate::model::MemoryType;
    use crate::pii::PiiPolicy;
    use crate::storage::SqliteBackend;

    fn store() -> MetaStore {
        let backend: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let semantic = Arc::new(SemanticStore::new(backend.clone()));
        let episodic = Arc::new(EpisodicStore::new(backend.clone(), Arc::new(FakeEmbeddingCollaborator::new(8)), PiiPolicy::balanced()));
        MetaStore::new(backend, semantic, episodic)
    }

    #[tokio::test]
    async fn record_quality_derives_expertise_relative_to_baseline() {
        let store = store();
        let project = Uuid::new_v4();
        let entry = store.record_quality(project, Uuid::new_v4(), "episodic".into(), 0.85).await.unwrap();
        assert!((entry.quality_baseline - 0.85).abs() < 1e-9);
        assert!((entry.expertise_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn detect_gaps_flags_low_confidence_as_uncertain() {
        let store = store();
        let project = Uuid::new_v4();
        let now = Utc::now();
        store
            .semantic
            .upsert(crate::model::SemanticMemory {
                id: Uuid::new_v4(),
                project_id: project,
                statement: "the cache might be stale".into(),
                memory_type: MemoryType::Fact,
                embedding: None,
                confidence: 0.2,
                source_event_ids: vec![],
                contradicted_by: vec![],
                tags: vec![],
                lexical_index_token: String::new(),
                access_count: 0,
                last_accessed: now,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let report = store.detect_gaps(project).await.unwrap();
        assert_eq!(report.uncertainties.len(), 1);
    }

    #[tokio::test]
    async fn detect_gaps_flags_contradicting_similar_statements() {
        let store = store();
        let project = Uuid::new_v4();
        let now = Utc::now();
        let shared_embedding = Some(vec![1.0, 0.0, 0.0]);

        store
            .semantic
            .upsert(crate::model::SemanticMemory {
                id: Uuid::new_v4(),
                project_id: project,
                statement: "the service supports retries".into(),
                memory_type: MemoryType::Fact,
                embedding: shared_embedding.clone(),
                confidence: 0.9,
                source_event_ids: vec![],
                contradicted_by: vec![],
                tags: vec![],
                lexical_index_token: String::new(),
                access_count: 0,
                last_accessed: now,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        store
            .semantic
            .upsert(crate::model::SemanticMemory {
                id: Uuid::new_v4(),
                project_id: project,
                statement: "the service does not support retries".into(),
                memory_type: MemoryType::Fact,
                embedding: shared_embedding,
                confidence: 0.9,
                source_event_ids: vec![],
                contradicted_by: vec![],
                tags: vec![],
                lexical_index_token: String::new(),
                access_count: 0,
                last_accessed: now,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let report = store.detect_gaps(project).await.unwrap();
        assert_eq!(report.contradictions.len(), 1);
    }
}
