//! Prospective memory layer store
//!
//! Deferred tasks, optionally gated on other tasks via `dependencies` and
//! optionally nested under a `parent_id` goal. `create`/`add_dependency`
//! reject an edge that would close a cycle (§8 "dependency cycle"
//! scenario) with a structured `PreconditionFailed` carrying the cycle
//! path, not a bare string.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::error::{AthenaError, Result};
use crate::model::{ProjectId, ProspectiveTask, TaskMetrics, TaskPriority, TaskStatus};
use crate::storage::{Namespace, Record, ScanFilter, StorageBackend};

/// A task plus its nested children, built by `get_hierarchy`.
#[derive(Debug, Clone)]
pub struct TaskHierarchyNode {
    pub task: ProspectiveTask,
    pub children: Vec<TaskHierarchyNode>,
}

/// Kinds of conflict `detect_conflicts` can surface, per §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ResourceContention,
    DependencyCycle,
    TimingConflict,
    PriorityConflict,
    CapacityOverload,
}

/// One detected conflict among a project's tasks.
#[derive(Debug, Clone)]
pub struct TaskConflict {
    pub kind: ConflictKind,
    pub task_ids: Vec<Uuid>,
    pub detail: String,
}

const ACTIVE_STATUSES: [TaskStatus; 2] = [TaskStatus::Active, TaskStatus::InProgress];
/// Owners with more than this many simultaneously active/in-progress tasks
/// are flagged as overloaded. Not spec-mandated as an exact number — an
/// engineering default logged in DESIGN.md.
const CAPACITY_THRESHOLD: usize = 3;
/// Deadlines within this many hours of each other, for the same owner,
/// while both tasks are active, are flagged as a timing conflict.
const TIMING_CONFLICT_WINDOW_HOURS: i64 = 4;

pub struct ProspectiveStore {
    backend: Arc<dyn StorageBackend>,
}

impl ProspectiveStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub async fn create(
        &self,
        project_id: ProjectId,
        title: String,
        priority: TaskPriority,
        owner: Option<String>,
        parent_id: Option<Uuid>,
        deadline: Option<DateTime<Utc>>,
        dependencies: Vec<Uuid>,
    ) -> Result<ProspectiveTask> {
        let id = Uuid::new_v4();
        if !dependencies.is_empty() {
            self.reject_if_cycle(project_id, id, &dependencies).await?;
        }
        let now = Utc::now();
        let task = ProspectiveTask {
            id,
            project_id,
            title,
            status: TaskStatus::Pending,
            priority,
            owner,
            progress: 0,
            milestones: vec![],
            parent_id,
            deadline,
            dependencies,
            metrics: TaskMetrics::default(),
            created_at: now,
            updated_at: now,
        };
        self.put(&task).await?;
        Ok(task)
    }

    /// Reject `new_id` depending on `proposed_deps` if doing so would close
    /// a cycle, reporting the offending path.
    async fn reject_if_cycle(&self, project_id: ProjectId, new_id: Uuid, proposed_deps: &[Uuid]) -> Result<()> {
        let all = self.list(project_id, 10_000).await?;
        let mut adjacency: HashMap<Uuid, Vec<Uuid>> = all.into_iter().map(|t| (t.id, t.dependencies)).collect();
        adjacency.entry(new_id).or_default().extend(proposed_deps.iter().copied());

        if let Some(path) = find_cycle_path(&adjacency, new_id) {
            let detail = path.iter().map(Uuid::to_string).collect::<Vec<_>>().join(" -> ");
            return Err(AthenaError::PreconditionFailed { reason: "DEPENDENCY_CYCLE".into(), detail });
        }
        Ok(())
    }

    /// Add a dependency edge to an existing task, rejecting it if it would
    /// close a cycle.
    pub async fn add_dependency(&self, project_id: ProjectId, id: Uuid, depends_on_id: Uuid) -> Result<Option<ProspectiveTask>> {
        let Some(mut task) = self.get(project_id, id).await? else {
            return Ok(None);
        };
        self.reject_if_cycle(project_id, id, &[depends_on_id]).await?;
        task.dependencies.push(depends_on_id);
        task.updated_at = Utc::now();
        self.put(&task).await?;
        Ok(Some(task))
    }

    pub async fn set_status(&self, project_id: ProjectId, id: Uuid, status: TaskStatus) -> Result<Option<ProspectiveTask>> {
        let Some(mut task) = self.get(project_id, id).await? else {
            return Ok(None);
        };
        task.status = status;
        task.updated_at = Utc::now();
        self.put(&task).await?;
        Ok(Some(task))
    }

    /// Move a task to `Active`, failing `PreconditionFailed` if any of its
    /// dependencies have not reached `Completed`.
    pub async fn activate(&self, project_id: ProjectId, id: Uuid) -> Result<Option<ProspectiveTask>> {
        let Some(mut task) = self.get(project_id, id).await? else {
            return Ok(None);
        };

        let mut unsatisfied = Vec::new();
        for dep_id in &task.dependencies {
            match self.get(project_id, *dep_id).await? {
                Some(dep) if dep.status == TaskStatus::Completed => {}
                _ => unsatisfied.push(*dep_id),
            }
        }
        if !unsatisfied.is_empty() {
            let detail = unsatisfied.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ");
            return Err(AthenaError::PreconditionFailed { reason: "UNSATISFIED_DEPENDENCY".into(), detail });
        }

        task.status = TaskStatus::Active;
        task.updated_at = Utc::now();
        self.put(&task).await?;
        Ok(Some(task))
    }

    /// Mark a task finished, `Completed` on success or `Failed` otherwise.
    pub async fn complete(&self, project_id: ProjectId, id: Uuid, succeeded: bool) -> Result<Option<ProspectiveTask>> {
        let Some(mut task) = self.get(project_id, id).await? else {
            return Ok(None);
        };
        task.status = if succeeded { TaskStatus::Completed } else { TaskStatus::Failed };
        task.progress = if succeeded { 100 } else { task.progress };
        task.updated_at = Utc::now();
        self.put(&task).await?;
        Ok(Some(task))
    }

    pub async fn get(&self, project_id: ProjectId, id: Uuid) -> Result<Option<ProspectiveTask>> {
        let record = self.backend.get(Namespace::Prospective.as_str(), project_id, id).await?;
        Ok(record.and_then(|r| serde_json::from_value(r.body).ok()))
    }

    pub async fn list(&self, project_id: ProjectId, limit: usize) -> Result<Vec<ProspectiveTask>> {
        let records = self
            .backend
            .scan(Namespace::Prospective.as_str(), project_id, ScanFilter { tag: None, limit: Some(limit) })
            .await?;
        Ok(records.into_iter().filter_map(|r| serde_json::from_value(r.body).ok()).collect())
    }

    /// Tasks whose dependencies are all `Completed` and are themselves
    /// still `Pending` — ready to be `activate`d.
    pub async fn ready(&self, project_id: ProjectId) -> Result<Vec<ProspectiveTask>> {
        let all = self.list(project_id, 10_000).await?;
        let completed: HashSet<Uuid> = all.iter().filter(|t| t.status == TaskStatus::Completed).map(|t| t.id).collect();
        Ok(all
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending && t.dependencies.iter().all(|d| completed.contains(d)))
            .collect())
    }

    /// Top-level tasks (no `parent_id`) with their descendants nested
    /// beneath them.
    pub async fn get_hierarchy(&self, project_id: ProjectId) -> Result<Vec<TaskHierarchyNode>> {
        let all = self.list(project_id, 10_000).await?;
        let mut children_of: HashMap<Uuid, Vec<ProspectiveTask>> = HashMap::new();
        let mut roots = Vec::new();
        for task in all {
            match task.parent_id {
                Some(parent) => children_of.entry(parent).or_default().push(task),
                None => roots.push(task),
            }
        }
        Ok(roots.into_iter().map(|task| build_node(task, &children_of)).collect())
    }

    /// Heuristic, deterministic conflict detection across a project's
    /// tasks per §3/§4.3.
    pub async fn detect_conflicts(&self, project_id: ProjectId) -> Result<Vec<TaskConflict>> {
        let all = self.list(project_id, 10_000).await?;
        let mut conflicts = Vec::new();

        let adjacency: HashMap<Uuid, Vec<Uuid>> = all.iter().map(|t| (t.id, t.dependencies.clone())).collect();
        let mut seen_cycle_members: HashSet<Uuid> = HashSet::new();
        for task in &all {
            if seen_cycle_members.contains(&task.id) {
                continue;
            }
            if let Some(path) = find_cycle_path(&adjacency, task.id) {
                seen_cycle_members.extend(path.iter().copied());
                conflicts.push(TaskConflict {
                    kind: ConflictKind::DependencyCycle,
                    task_ids: path.clone(),
                    detail: path.iter().map(Uuid::to_string).collect::<Vec<_>>().join(" -> "),
                });
            }
        }

        let mut active_by_owner: HashMap<String, Vec<Uuid>> = HashMap::new();
        for task in &all {
            if let Some(owner) = &task.owner {
                if ACTIVE_STATUSES.contains(&task.status) {
                    active_by_owner.entry(owner.clone()).or_default().push(task.id);
                }
            }
        }
        for (owner, ids) in &active_by_owner {
            if ids.len() >= 2 {
                conflicts.push(TaskConflict {
                    kind: ConflictKind::ResourceContention,
                    task_ids: ids.clone(),
                    detail: format!("owner {owner} has {} simultaneously active tasks", ids.len()),
                });
            }
            if ids.len() > CAPACITY_THRESHOLD {
                conflicts.push(TaskConflict {
                    kind: ConflictKind::CapacityOverload,
                    task_ids: ids.clone(),
                    detail: format!("owner {owner} exceeds capacity threshold of {CAPACITY_THRESHOLD}"),
                });
            }
        }

        for (owner, ids) in &active_by_owner {
            let deadlined: Vec<&ProspectiveTask> =
                all.iter().filter(|t| ids.contains(&t.id) && t.deadline.is_some()).collect();
            for i in 0..deadlined.len() {
                for j in (i + 1)..deadlined.len() {
                    let a = deadlined[i].deadline.unwrap();
                    let b = deadlined[j].deadline.unwrap();
                    if (a - b).num_hours().abs() <= TIMING_CONFLICT_WINDOW_HOURS {
                        conflicts.push(TaskConflict {
                            kind: ConflictKind::TimingConflict,
                            task_ids: vec![deadlined[i].id, deadlined[j].id],
                            detail: format!("owner {owner} has overlapping deadlines within {TIMING_CONFLICT_WINDOW_HOURS}h"),
                        });
                    }
                }
            }
        }

        let by_id: HashMap<Uuid, &ProspectiveTask> = all.iter().map(|t| (t.id, t)).collect();
        for task in &all {
            if !ACTIVE_STATUSES.contains(&task.status) {
                continue;
            }
            for dep_id in &task.dependencies {
                if let Some(dep) = by_id.get(dep_id) {
                    if dep.status != TaskStatus::Completed && dep.priority < task.priority {
                        conflicts.push(TaskConflict {
                            kind: ConflictKind::PriorityConflict,
                            task_ids: vec![task.id, dep.id],
                            detail: format!("higher-priority task {} is blocked by lower-priority task {}", task.id, dep.id),
                        });
                    }
                }
            }
        }

        Ok(conflicts)
    }

    async fn put(&self, task: &ProspectiveTask) -> Result<()> {
        let body = serde_json::to_value(task).unwrap_or(json!({}));
        self.backend
            .put(Record {
                id: task.id,
                project_id: task.project_id,
                namespace: Namespace::Prospective.as_str(),
                body,
                embedding: None,
                lexical_text: Some(task.title.clone()),
            })
            .await
    }
}

fn build_node(task: ProspectiveTask, children_of: &HashMap<Uuid, Vec<ProspectiveTask>>) -> TaskHierarchyNode {
    let children = children_of
        .get(&task.id)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|child| build_node(child, children_of))
        .collect();
    TaskHierarchyNode { task, children }
}

/// DFS from `start` looking for a path back to `start`. Returns the cycle
/// as the sequence of ids traversed, `start` included at both ends'
/// implicit closure (the last id in the returned path depends on `start`).
fn find_cycle_path(adjacency: &HashMap<Uuid, Vec<Uuid>>, start: Uuid) -> Option<Vec<Uuid>> {
    let mut path = vec![start];
    let mut visited: HashSet<Uuid> = HashSet::new();
    if dfs_for_cycle(adjacency, start, start, &mut path, &mut visited) {
        Some(path)
    } else {
        None
    }
}

fn dfs_for_cycle(
    adjacency: &HashMap<Uuid, Vec<Uuid>>,
    current: Uuid,
    start: Uuid,
    path: &mut Vec<Uuid>,
    visited: &mut HashSet<Uuid>,
) -> bool {
    let Some(deps) = adjacency.get(&current) else {
        return false;
    };
    for &next in deps {
        if next == start {
            path.push(next);
            return true;
        }
        if visited.insert(next) {
            path.push(next);
            if dfs_for_cycle(adjacency, next, start, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}
