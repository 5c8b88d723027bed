//! Episodic layer store
//!
//! Owns ingest of raw observations: PII policy, content hashing, and
//! dedup against the project's existing events (§4.2, §8 "dedup"
//! scenario). Dedup is a precondition check, not an error surfaced to the
//! caller — a duplicate ingest returns the existing event's id.
//!
//! Recall operations (`recall_by_time`, `recall_by_session`, `timeline`)
//! sort and filter client-side after a broad scan rather than pushing a
//! time predicate into `StorageBackend::scan` — the storage trait's
//! contract is deliberately opaque-JSON-blob, and `ScanFilter` carries no
//! time-range field, so ordering by `(occurred_at, id)` happens here.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::collaborators::EmbeddingCollaborator;
use crate::error::Result;
use crate::hash::{content_hash, HashableEvent};
use crate::model::{
    CodeEventType, CodeFields, EpisodicEvent, EventConsolidationStatus, EventContext, EventMetrics, EventOutcome,
    EventQuality, EventType, ProjectId, TestFields, VcFields,
};
use crate::pii::PiiPolicy;
use crate::storage::{Namespace, Record, ScanFilter, StorageBackend};

/// A broad enough scan to treat as "everything" for client-side
/// filter/sort. Matches the dedup scan's existing style.
const FULL_SCAN_LIMIT: usize = 100_000;

/// Draft input for `create_event`/`batch_create`. Carries everything a
/// caller may supply; the store fills in id, hash, embedding, and
/// timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewEpisodicEvent {
    pub session_id: Option<Uuid>,
    pub event_type: EventType,
    pub code_event_type: Option<CodeEventType>,
    pub content: String,
    pub outcome: EventOutcome,
    pub context: EventContext,
    pub code: CodeFields,
    pub vc: VcFields,
    pub metrics: EventMetrics,
    pub test: TestFields,
    pub quality: EventQuality,
    pub tags: Vec<String>,
}

/// Outcome of an ingest call: either a freshly created event or a pointer
/// to the pre-existing duplicate.
pub enum IngestOutcome {
    Created(EpisodicEvent),
    Duplicate(Uuid),
}

pub struct EpisodicStore {
    backend: Arc<dyn StorageBackend>,
    embedder: Arc<dyn EmbeddingCollaborator>,
    pii: PiiPolicy,
}

impl EpisodicStore {
    pub fn new(backend: Arc<dyn StorageBackend>, embedder: Arc<dyn EmbeddingCollaborator>, pii: PiiPolicy) -> Self {
        Self { backend, embedder, pii }
    }

    /// Convenience wrapper over `create_event` for the common case of a
    /// plain observation with no code/vc/test detail.
    pub async fn ingest(
        &self,
        project_id: ProjectId,
        session_id: Option<Uuid>,
        raw_content: &str,
        tags: Vec<String>,
    ) -> Result<IngestOutcome> {
        self.create_event(
            project_id,
            NewEpisodicEvent { session_id, content: raw_content.to_string(), tags, ..Default::default() },
        )
        .await
    }

    /// Redact, hash, dedup, embed, and persist one draft event.
    pub async fn create_event(&self, project_id: ProjectId, draft: NewEpisodicEvent) -> Result<IngestOutcome> {
        let (content, _redactions) = self.pii.apply(&draft.content);
        let hash = content_hash(&HashableEvent {
            project_id,
            session_id: draft.session_id,
            event_type: draft.event_type,
            code_event_type: draft.code_event_type,
            content: &content,
            outcome: draft.outcome,
            context: &draft.context,
            code: &draft.code,
            vc: &draft.vc,
            metrics: &draft.metrics,
            test: &draft.test,
            quality: &draft.quality,
            tags: &draft.tags,
        });

        let existing = self.backend.scan(Namespace::Episodic.as_str(), project_id, ScanFilter::default()).await?;
        for record in &existing {
            if record.body.get("content_hash").and_then(|v| v.as_str()) == Some(hash.as_str()) {
                return Ok(IngestOutcome::Duplicate(record.id));
            }
        }

        let embedding = self.embedder.embed(&content).await.ok();
        let now = Utc::now();
        let event = EpisodicEvent {
            id: Uuid::new_v4(),
            project_id,
            session_id: draft.session_id,
            event_type: draft.event_type,
            code_event_type: draft.code_event_type,
            content,
            outcome: draft.outcome,
            context: draft.context,
            code: draft.code,
            vc: draft.vc,
            metrics: draft.metrics,
            test: draft.test,
            quality: draft.quality,
            tags: draft.tags,
            content_hash: hash,
            consolidation_status: EventConsolidationStatus::Pending,
            consolidated_at: None,
            embedding,
            occurred_at: now,
            created_at: now,
        };

        self.put(&event).await?;
        Ok(IngestOutcome::Created(event))
    }

    /// Create several events, each deduplicated independently. Not
    /// transactional across events — a duplicate among the batch does not
    /// abort the rest, matching `create_event`'s own dedup-is-not-an-error
    /// policy.
    pub async fn batch_create(&self, project_id: ProjectId, drafts: Vec<NewEpisodicEvent>) -> Result<Vec<IngestOutcome>> {
        let mut outcomes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            outcomes.push(self.create_event(project_id, draft).await?);
        }
        Ok(outcomes)
    }

    pub async fn get(&self, project_id: ProjectId, id: Uuid) -> Result<Option<EpisodicEvent>> {
        let record = self.backend.get(Namespace::Episodic.as_str(), project_id, id).await?;
        Ok(record.and_then(|r| serde_json::from_value(r.body).ok()))
    }

    pub async fn list_recent(&self, project_id: ProjectId, limit: usize) -> Result<Vec<EpisodicEvent>> {
        let records = self
            .backend
            .scan(Namespace::Episodic.as_str(), project_id, ScanFilter { tag: None, limit: Some(limit) })
            .await?;
        Ok(records.into_iter().filter_map(|r| serde_json::from_value(r.body).ok()).collect())
    }

    /// All events in `[start, end]`, optionally filtered to one
    /// `event_type`, ordered `(occurred_at ASC, id ASC)` per §4.3.
    pub async fn recall_by_time(
        &self,
        project_id: ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type: Option<EventType>,
    ) -> Result<Vec<EpisodicEvent>> {
        let mut events = self.all(project_id).await?;
        events.retain(|e| e.occurred_at >= start && e.occurred_at <= end);
        if let Some(wanted) = event_type {
            events.retain(|e| e.event_type == wanted);
        }
        sort_by_time_then_id(&mut events);
        Ok(events)
    }

    /// All events in one session, ordered `(occurred_at ASC, id ASC)`.
    pub async fn recall_by_session(&self, project_id: ProjectId, session_id: Uuid) -> Result<Vec<EpisodicEvent>> {
        let mut events = self.all(project_id).await?;
        events.retain(|e| e.session_id == Some(session_id));
        sort_by_time_then_id(&mut events);
        Ok(events)
    }

    /// All events in the trailing `window`, ordered `(occurred_at ASC, id
    /// ASC)`.
    pub async fn timeline(&self, project_id: ProjectId, window: Duration) -> Result<Vec<EpisodicEvent>> {
        let now = Utc::now();
        self.recall_by_time(project_id, now - window, now, None).await
    }

    /// Advance (or revert) an event's place in the consolidation pipeline.
    /// Stamps `consolidated_at` when the terminal states are reached.
    pub async fn set_consolidation_status(
        &self,
        project_id: ProjectId,
        id: Uuid,
        status: EventConsolidationStatus,
    ) -> Result<Option<EpisodicEvent>> {
        let Some(mut event) = self.get(project_id, id).await? else {
            return Ok(None);
        };
        event.consolidation_status = status;
        if matches!(status, EventConsolidationStatus::Consolidated | EventConsolidationStatus::Discarded) {
            event.consolidated_at = Some(Utc::now());
        } else {
            event.consolidated_at = None;
        }
        self.put(&event).await?;
        Ok(Some(event))
    }

    async fn all(&self, project_id: ProjectId) -> Result<Vec<EpisodicEvent>> {
        self.list_recent(project_id, FULL_SCAN_LIMIT).await
    }

    async fn put(&self, event: &EpisodicEvent) -> Result<()> {
        let body = serde_json::to_value(event).unwrap_or(json!({}));
        self.backend
            .put(Record {
                id: event.id,
                project_id: event.project_id,
                namespace: Namespace::Episodic.as_str(),
                body,
                embedding: event.embedding.clone(),
                lexical_text: Some(event.content.clone()),
            })
            .await
    }
}

fn sort_by_time_then_id(events: &mut [EpisodicEvent]) {
    events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then_with(|| a.id.cmp(&b.id)));
}
