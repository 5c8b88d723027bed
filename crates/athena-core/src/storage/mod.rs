//! Storage backend abstraction
//!
//! A single contract both the embedded SQLite backend and the optional
//! clustered backend satisfy, so every layer store above this module is
//! backend-agnostic. Records are opaque JSON blobs keyed by `(namespace,
//! project_id, id)`; layer stores own the typed (de)serialization.

mod migrations;
mod sqlite;

#[cfg(feature = "clustered")]
mod clustered;

pub use sqlite::SqliteBackend;

#[cfg(feature = "clustered")]
pub use clustered::ClusteredBackend;

use crate::error::Result;
use crate::model::ProjectId;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// One of the eight memory layers, used to namespace records and indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Episodic,
    Semantic,
    Procedural,
    Prospective,
    GraphEntity,
    GraphRelation,
    Meta,
    WorkingMemory,
    Session,
    Consolidation,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Episodic => "episodic",
            Namespace::Semantic => "semantic",
            Namespace::Procedural => "procedural",
            Namespace::Prospective => "prospective",
            Namespace::GraphEntity => "graph_entity",
            Namespace::GraphRelation => "graph_relation",
            Namespace::Meta => "meta",
            Namespace::WorkingMemory => "working_memory",
            Namespace::Session => "session",
            Namespace::Consolidation => "consolidation",
        }
    }
}

/// A stored record: an opaque JSON document plus the metadata the storage
/// backend itself needs (embedding for vector search, text for lexical
/// search).
#[derive(Debug, Clone)]
pub struct Record {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub namespace: &'static str,
    pub body: Value,
    pub embedding: Option<Vec<f32>>,
    pub lexical_text: Option<String>,
}

/// A scored hit returned from a vector, lexical, or hybrid search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub namespace: &'static str,
    pub score: f64,
    pub body: Value,
}

/// A predicate over scanned records, evaluated backend-side where possible.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

/// A unit of work run atomically against the backend. Mutations queued
/// here either all apply or none do.
pub enum WriteOp {
    Put(Record),
    Delete { namespace: &'static str, project_id: ProjectId, id: Uuid },
}

/// Storage backend contract. Implemented by the embedded SQLite backend
/// and, behind the `clustered` feature, a networked backend — both expose
/// identical put/get/delete/scan/search semantics so layer stores never
/// branch on which one is active.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, record: Record) -> Result<()>;

    async fn get(&self, namespace: &'static str, project_id: ProjectId, id: Uuid) -> Result<Option<Record>>;

    async fn delete(&self, namespace: &'static str, project_id: ProjectId, id: Uuid) -> Result<bool>;

    async fn scan(&self, namespace: &'static str, project_id: ProjectId, filter: ScanFilter) -> Result<Vec<Record>>;

    async fn vector_search(
        &self,
        namespace: &'static str,
        project_id: ProjectId,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;

    async fn lexical_search(
        &self,
        namespace: &'static str,
        project_id: ProjectId,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;

    async fn hybrid_search(
        &self,
        namespace: &'static str,
        project_id: ProjectId,
        query: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<(Vec<SearchHit>, Vec<SearchHit>)> {
        let vector = self.vector_search(namespace, project_id, query_embedding, top_k).await?;
        let lexical = self.lexical_search(namespace, project_id, query, top_k).await?;
        Ok((vector, lexical))
    }

    /// Apply every op atomically, or none.
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()>;

    /// Lightweight liveness + schema check used by the health probe.
    async fn health_check(&self) -> Result<()>;

    /// Distinct project ids with at least one record in `namespace`, used
    /// by the background maintenance loops to discover active projects
    /// without a dedicated project registry.
    async fn list_project_ids(&self, namespace: &'static str) -> Result<Vec<ProjectId>>;
}
