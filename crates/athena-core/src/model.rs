//! Data model
//!
//! The eight memory entities and their shared value types, per §3. Every
//! entity carries `project_id` for multi-tenant isolation; nothing here
//! talks to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque tenant boundary. Every entity and every query is scoped to one.
pub type ProjectId = Uuid;

/// A workspace an agent operates in. The top-level tenancy unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// What kind of thing happened. Drives which optional field groups on an
/// [`EpisodicEvent`] are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Action,
    Observation,
    Decision,
    Error,
    Test,
    Commit,
    Conversation,
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Observation
    }
}

/// Finer-grained classification for code-touching events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeEventType {
    Edit,
    Review,
    Run,
    Diff,
}

/// How an event resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Success,
    Failure,
    Partial,
    Blocked,
    Unknown,
}

impl Default for EventOutcome {
    fn default() -> Self {
        EventOutcome::Unknown
    }
}

/// Where and under what task an event took place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Fields relevant to a code-touching event (`code_event_type` set).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeFields {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub symbol_name: Option<String>,
    #[serde(default)]
    pub symbol_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
}

/// Version-control provenance for a commit-type event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VcFields {
    #[serde(default)]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub git_author: Option<String>,
}

/// Quantitative measurements attached to an event (build/test durations,
/// diff size).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetrics {
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub files_changed: Option<u32>,
    #[serde(default)]
    pub lines_added: Option<u32>,
    #[serde(default)]
    pub lines_deleted: Option<u32>,
}

/// Fields relevant to a `Test`-type event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestFields {
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub test_passed: Option<bool>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

/// Judgments about the event itself, independent of its outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventQuality {
    #[serde(default)]
    pub performance_metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub code_quality_score: Option<f64>,
    #[serde(default)]
    pub confidence: f64,
}

/// Where an event stands in the consolidation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventConsolidationStatus {
    Pending,
    InProgress,
    Consolidated,
    Discarded,
}

impl Default for EventConsolidationStatus {
    fn default() -> Self {
        EventConsolidationStatus::Pending
    }
}

/// A single, immutable observation: something that happened. Raw substrate
/// that semantic memories and procedures are consolidated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicEvent {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub session_id: Option<Uuid>,
    pub event_type: EventType,
    pub code_event_type: Option<CodeEventType>,
    pub content: String,
    pub outcome: EventOutcome,
    #[serde(default)]
    pub context: EventContext,
    #[serde(default)]
    pub code: CodeFields,
    #[serde(default)]
    pub vc: VcFields,
    #[serde(default)]
    pub metrics: EventMetrics,
    #[serde(default)]
    pub test: TestFields,
    #[serde(default)]
    pub quality: EventQuality,
    pub tags: Vec<String>,
    pub content_hash: String,
    pub consolidation_status: EventConsolidationStatus,
    pub consolidated_at: Option<DateTime<Utc>>,
    pub embedding: Option<Vec<f32>>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// What kind of thing a consolidated memory represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Concept,
    Relation,
    Constraint,
}

impl Default for MemoryType {
    fn default() -> Self {
        MemoryType::Fact
    }
}

/// A consolidated fact or belief, derived from one or more episodic events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMemory {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub statement: String,
    pub memory_type: MemoryType,
    pub embedding: Option<Vec<f32>>,
    pub confidence: f64,
    pub source_event_ids: Vec<Uuid>,
    pub contradicted_by: Vec<Uuid>,
    pub tags: Vec<String>,
    /// SHA-256 of the normalized statement, used both as a lexical index
    /// key and as the dedup key on re-consolidation. Derived, never set by
    /// a caller.
    #[serde(default)]
    pub lexical_index_token: String,
    pub access_count: u32,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single step in a procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureStep {
    pub ordinal: u32,
    pub instruction: String,
}

/// How a procedure came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureSource {
    Learned,
    Authored,
}

/// A snapshot of a procedure's steps at a prior version, kept so
/// `rollback_to` has something to roll back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureVersion {
    pub version: u32,
    pub steps: Vec<ProcedureStep>,
    pub recorded_at: DateTime<Utc>,
}

/// A learned sequence of steps for accomplishing a recurring task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub name: String,
    /// Extensible classification (e.g. "deployment", "debugging") — a
    /// project-defined string rather than a closed enum, matching how
    /// [`Entity::entity_type`] and [`Relation::relation_type`] stay open.
    pub category: String,
    pub description: String,
    pub source: ProcedureSource,
    pub steps: Vec<ProcedureStep>,
    /// Tags a caller's context must overlap with for `find_applicable` to
    /// surface this procedure.
    pub tags: Vec<String>,
    pub version: u32,
    pub previous_versions: Vec<ProcedureVersion>,
    pub git_hash: Option<String>,
    pub executions: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub avg_duration_ms: Option<f64>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Procedure {
    /// Empirical success rate, 1.0 when the procedure has never run.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }
}

/// Task status lifecycle for a `ProspectiveTask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Active,
    InProgress,
    Blocked,
    Completed,
    Failed,
    Suspended,
}

/// Task priority band. The numeric `level()` is used to break ties in
/// conflict detection and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn level(self) -> u8 {
        match self {
            TaskPriority::Critical => 9,
            TaskPriority::High => 7,
            TaskPriority::Medium => 5,
            TaskPriority::Low => 3,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// A checkpoint within a task's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub done: bool,
    pub reached_at: Option<DateTime<Utc>>,
}

/// Health telemetry rolled up for a task, read by `detect_conflicts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub errors: u32,
    pub blockers: u32,
    pub health_score: f64,
    pub velocity: f64,
}

/// A deferred intention: something to do later, optionally gated on other
/// tasks and optionally nested under a parent goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectiveTask {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub owner: Option<String>,
    pub progress: u8,
    pub milestones: Vec<Milestone>,
    pub parent_id: Option<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
    pub dependencies: Vec<Uuid>,
    pub metrics: TaskMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A node in the entity/relation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub name: String,
    pub entity_type: String,
    pub attributes: serde_json::Value,
    /// Timestamped free-text observations accumulated about this entity.
    /// Kept small — this is context, not a second episodic log.
    pub observations: Vec<EntityObservation>,
    pub created_at: DateTime<Utc>,
}

/// A single timestamped note about an [`Entity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityObservation {
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

/// A directed edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub source_entity_id: Uuid,
    pub target_entity_id: Uuid,
    pub relation_type: String,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// A reference to a memory in a specific layer, used by meta-memory to
/// track which subject a judgment is about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRef {
    pub layer: String,
    pub id: Uuid,
}

/// A judgment about another memory's quality, recorded by the verification
/// gateway or by explicit feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaMemoryEntry {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub subject_id: Uuid,
    pub subject_layer: String,
    pub judgment: String,
    pub note: Option<String>,
    /// The layer's static baseline at the time this judgment was recorded
    /// (§4.4's per-layer source_quality constant).
    pub quality_baseline: f64,
    /// The quality actually observed for this subject.
    pub observed_quality: f64,
    pub contradictions: Vec<String>,
    pub uncertainties: Vec<String>,
    /// How much better or worse than baseline this subject has performed,
    /// clamped to `[0, 1]`.
    pub expertise_score: f64,
    pub created_at: DateTime<Utc>,
}

/// An item currently held in the bounded working-memory buffer (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemoryItem {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub session_id: Uuid,
    pub subject_id: Uuid,
    pub subject_layer: String,
    pub summary: String,
    pub importance: f64,
    pub distinctiveness: f64,
    pub entered_at: DateTime<Utc>,
    pub last_touched_at: DateTime<Utc>,
}

/// A live agent session: the thread of short-term continuity a working
/// memory buffer and recall calls are scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub label: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// What triggered a consolidation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationTrigger {
    Capacity,
    Scheduled,
    Manual,
    WorkingMemory,
}

impl Default for ConsolidationTrigger {
    fn default() -> Self {
        ConsolidationTrigger::Manual
    }
}

/// Which quality/cost tradeoff a consolidation run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStrategy {
    Speed,
    Balanced,
    Quality,
}

impl Default for ConsolidationStrategy {
    fn default() -> Self {
        ConsolidationStrategy::Balanced
    }
}

/// Run-level status, distinct from a single event's `consolidation_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    Running,
    Completed,
    Failed,
}

/// A record of one consolidation pass: what went in, what came out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationRun {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub status: ConsolidationStatus,
    pub trigger: ConsolidationTrigger,
    pub strategy: ConsolidationStrategy,
    pub events_considered: u32,
    pub clusters_formed: u32,
    pub memories_created: u32,
    pub memories_updated: u32,
    pub procedures_created: u32,
    pub contradictions_found: u32,
    pub validation_calls: u32,
    pub quality_score: f64,
    pub created_memory_ids: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_success_rate_defaults_to_one() {
        let p = Procedure {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "noop".into(),
            category: "generic".into(),
            description: String::new(),
            source: ProcedureSource::Authored,
            steps: vec![],
            tags: vec![],
            version: 1,
            previous_versions: vec![],
            git_hash: None,
            executions: 0,
            success_count: 0,
            failure_count: 0,
            avg_duration_ms: None,
            embedding: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(p.success_rate(), 1.0);
    }

    #[test]
    fn task_priority_orders_by_urgency() {
        assert!(TaskPriority::Critical.level() > TaskPriority::High.level());
        assert!(TaskPriority::High.level() > TaskPriority::Medium.level());
        assert!(TaskPriority::Medium.level() > TaskPriority::Low.level());
    }
}
