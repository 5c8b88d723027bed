//! Semantic layer store
//!
//! Consolidated facts and beliefs. Writes here normally come from the
//! consolidation pipeline rather than direct ingest, but the store itself
//! is agnostic to the caller.
//!
//! `upsert` re-hashes the proposed statement and skips insertion if the
//! hash already exists (§4.6) — consolidation must be idempotent, and this
//! is the single choke point that guarantees it regardless of how many
//! times a caller re-proposes the same content.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{ProjectId, SemanticMemory};
use crate::storage::{Namespace, Record, ScanFilter, StorageBackend};

/// SHA-256 of the trimmed, lowercased statement. Doubles as the lexical
/// index key and the consolidation dedup key.
pub fn lexical_index_token(statement: &str) -> String {
    let normalized = statement.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Outcome of a dedup-aware upsert.
pub enum UpsertOutcome {
    Created(Uuid),
    Duplicate(Uuid),
}

pub struct SemanticStore {
    backend: Arc<dyn StorageBackend>,
}

impl SemanticStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Insert `memory` unless a memory with the same normalized statement
    /// already exists for this project, in which case the existing id is
    /// returned and nothing is written.
    pub async fn upsert(&self, mut memory: SemanticMemory) -> Result<UpsertOutcome> {
        memory.lexical_index_token = lexical_index_token(&memory.statement);

        if let Some(existing) = self.find_by_token(memory.project_id, &memory.lexical_index_token).await? {
            return Ok(UpsertOutcome::Duplicate(existing.id));
        }

        let id = memory.id;
        self.put(&memory).await?;
        Ok(UpsertOutcome::Created(id))
    }

    async fn find_by_token(&self, project_id: ProjectId, token: &str) -> Result<Option<SemanticMemory>> {
        let memories = self.list(project_id, 10_000).await?;
        Ok(memories.into_iter().find(|m| m.lexical_index_token == token))
    }

    pub async fn get(&self, project_id: ProjectId, id: Uuid) -> Result<Option<SemanticMemory>> {
        let record = self.backend.get(Namespace::Semantic.as_str(), project_id, id).await?;
        Ok(record.and_then(|r| serde_json::from_value(r.body).ok()))
    }

    pub async fn list(&self, project_id: ProjectId, limit: usize) -> Result<Vec<SemanticMemory>> {
        let records = self
            .backend
            .scan(Namespace::Semantic.as_str(), project_id, ScanFilter { tag: None, limit: Some(limit) })
            .await?;
        Ok(records.into_iter().filter_map(|r| serde_json::from_value(r.body).ok()).collect())
    }

    /// Bump `access_count`/`last_accessed` on a memory surfaced by recall.
    pub async fn record_access(&self, project_id: ProjectId, id: Uuid) -> Result<Option<SemanticMemory>> {
        let Some(mut memory) = self.get(project_id, id).await? else {
            return Ok(None);
        };
        memory.access_count += 1;
        memory.last_accessed = Utc::now();
        self.put(&memory).await?;
        Ok(Some(memory))
    }

    /// Mark `contradicted` as contradicted by `contradicting`, bumping
    /// `updated_at`. Used by the consolidation pipeline's contradiction
    /// detection pass.
    pub async fn mark_contradiction(&self, mut contradicted: SemanticMemory, contradicting: Uuid) -> Result<()> {
        contradicted.contradicted_by.push(contradicting);
        contradicted.updated_at = Utc::now();
        self.put(&contradicted).await
    }

    async fn put(&self, memory: &SemanticMemory) -> Result<()> {
        let body = serde_json::to_value(memory).unwrap_or(json!({}));
        self.backend
            .put(Record {
                id: memory.id,
                project_id: memory.project_id,
                namespace: Namespace::Semantic.as_str(),
                body,
                embedding: memory.embedding.clone(),
                lexical_text: Some(memory.statement.clone()),
            })
            .await
    }
}
