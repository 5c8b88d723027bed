//! Event content hashing
//!
//! Deduplication (§4.2, §8 scenario "dedup") hinges on a deterministic
//! digest of an event's meaningful content, excluding `id`,
//! `consolidation_status`, `consolidated_at`, and the embedding vector —
//! volatile or derived fields that must not affect identity — so that
//! re-ingesting the same observation twice, even seconds apart and even
//! after it has been consolidated, collides on the same hash.
//!
//! Fields are hashed via their canonical JSON serialization rather than a
//! hand-rolled byte concatenation: `serde_json`'s `Map` is `BTreeMap`-backed
//! (the workspace never enables `preserve_order`), so `to_value` on a
//! struct already yields keys sorted alphabetically at every nesting
//! level, which is exactly §4.2's "included fields sorted by name"
//! requirement.

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::model::{CodeFields, EventContext, EventMetrics, EventOutcome, EventQuality, EventType, TestFields, VcFields};

/// Canonical fields that participate in an event's identity hash. Mirrors
/// every included `EpisodicEvent` field by reference so callers don't need
/// to clone the event to hash it.
#[derive(Serialize)]
pub struct HashableEvent<'a> {
    pub project_id: Uuid,
    pub session_id: Option<Uuid>,
    pub event_type: EventType,
    pub code_event_type: Option<crate::model::CodeEventType>,
    pub content: &'a str,
    pub outcome: EventOutcome,
    pub context: &'a EventContext,
    pub code: &'a CodeFields,
    pub vc: &'a VcFields,
    pub metrics: &'a EventMetrics,
    pub test: &'a TestFields,
    pub quality: &'a EventQuality,
    pub tags: &'a [String],
}

/// Hex-encoded SHA-256 digest over the canonical, order-independent
/// serialization of the event's identity fields.
pub fn content_hash(event: &HashableEvent) -> String {
    let mut tags = event.tags.to_vec();
    tags.sort();
    let normalized_content = event.content.trim();

    let canonical = serde_json::json!({
        "project_id": event.project_id,
        "session_id": event.session_id,
        "event_type": event.event_type,
        "code_event_type": event.code_event_type,
        "content": normalized_content,
        "outcome": event.outcome,
        "context": event.context,
        "code": event.code,
        "vc": event.vc,
        "metrics": event.metrics,
        "test": event.test,
        "quality": event.quality,
        "tags": tags,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
