//! Hybrid retrieval engine and cascading recall
//!
//! `RetrievalEngine` runs the core embed → vector search → lexical search
//! → RRF fusion → confidence scoring pipeline (§4.4) against a single
//! layer namespace. `cascade` builds the 3-tier orchestrator on top of it
//! (§4.5): tier 1 is cheap per-layer heuristics, tier 2 adds hybrid search
//! plus meta-memory and session enrichment, tier 3 falls back to an LLM
//! synthesis pass when confidence is still low.

pub mod cascade;
pub mod confidence;
pub mod expansion;
pub mod fusion;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::collaborators::EmbeddingCollaborator;
use crate::config::Config;
use crate::error::Result;
use crate::model::ProjectId;
use crate::storage::StorageBackend;

use confidence::{confidence_score, ConfidenceInputs};
use fusion::{reciprocal_rank_fusion, FusedHit};

/// A single scored result returned from the retrieval engine.
#[derive(Debug, Clone)]
pub struct RetrievedItem {
    pub id: Uuid,
    pub namespace: &'static str,
    pub body: serde_json::Value,
    pub confidence: f64,
    pub rrf_score: f64,
}

/// Runs the hybrid search pipeline against one layer namespace at a time.
pub struct RetrievalEngine {
    backend: Arc<dyn StorageBackend>,
    embedder: Arc<dyn EmbeddingCollaborator>,
    config: Config,
}

impl RetrievalEngine {
    pub fn new(backend: Arc<dyn StorageBackend>, embedder: Arc<dyn EmbeddingCollaborator>, config: Config) -> Self {
        Self { backend, embedder, config }
    }

    /// Embed the query, run vector + lexical search against `namespace`,
    /// fuse with RRF, and attach a confidence score to each hit.
    pub async fn search(
        &self,
        namespace: &'static str,
        project_id: ProjectId,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedItem>> {
        let query_embedding = if self.config.query_expansion_enabled {
            self.expanded_embedding(query).await?
        } else {
            self.embedder.embed(query).await?
        };

        let (vector, lexical) = self
            .backend
            .hybrid_search(namespace, project_id, query, &query_embedding, top_k.max(20))
            .await?;

        let fused = reciprocal_rank_fusion(&vector, &lexical);
        let now = Utc::now();

        let items = fused
            .into_iter()
            .take(top_k)
            .map(|hit| self.score(hit, now))
            .collect();

        Ok(items)
    }

    async fn expanded_embedding(&self, query: &str) -> Result<Vec<f32>> {
        let variants = expansion::expand_query(query, self.config.query_expansion_variants);
        let embeddings = self.embedder.embed_batch(&variants).await?;
        Ok(expansion::centroid_embedding(&embeddings).unwrap_or_else(|| vec![0.0; self.embedder.dimension()]))
    }

    fn score(&self, hit: FusedHit, now: chrono::DateTime<Utc>) -> RetrievedItem {
        let occurred_at = hit
            .body
            .get("occurred_at")
            .or_else(|| hit.body.get("created_at"))
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);

        let content_len = hit
            .body
            .get("content")
            .or_else(|| hit.body.get("statement"))
            .and_then(|v| v.as_str())
            .map(|s| s.len())
            .unwrap_or(0);

        // A hit present in both vector and lexical rankings is internally
        // consistent with itself across retrieval modes.
        let consistency = if hit.vector_rank.is_some() && hit.lexical_rank.is_some() { 1.0 } else { 0.5 };

        let semantic_relevance = hit.vector_rank.map(|r| 1.0 / (1.0 + r as f64)).unwrap_or(0.3);

        let inputs = ConfidenceInputs {
            semantic_relevance,
            source_layer: hit.namespace,
            occurred_at,
            consistency,
            content_len_chars: content_len,
        };

        RetrievedItem {
            id: hit.id,
            namespace: hit.namespace,
            body: hit.body,
            confidence: confidence_score(&inputs, now),
            rrf_score: hit.rrf_score,
        }
    }
}
