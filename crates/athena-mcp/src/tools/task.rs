//! `task-*` — prospective memory: deferred tasks gated on dependencies
//! (§8 "dependency cycle" scenario). Actions: create, add-dependency,
//! set-status, activate, complete, get, list, ready, hierarchy,
//! conflicts.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use athena_core::layers::ConflictKind;
use athena_core::model::{TaskPriority, TaskStatus};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, optional_usize, require_project_id, require_str, require_uuid, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "action": {
                "type": "string",
                "enum": [
                    "create", "add-dependency", "set-status", "activate", "complete",
                    "get", "list", "ready", "hierarchy", "conflicts"
                ],
                "default": "list"
            },
            "id": { "type": "string", "format": "uuid" },
            "title": { "type": "string" },
            "priority": { "type": "string", "enum": ["low", "medium", "high", "critical"], "default": "medium" },
            "owner": { "type": "string" },
            "parent_id": { "type": "string", "format": "uuid" },
            "deadline": { "type": "string", "format": "date-time" },
            "dependencies": { "type": "array", "items": { "type": "string", "format": "uuid" } },
            "depends_on_id": { "type": "string", "format": "uuid" },
            "status": {
                "type": "string",
                "enum": ["pending", "active", "in_progress", "blocked", "completed", "failed", "suspended"]
            },
            "succeeded": { "type": "boolean", "default": true },
            "limit": { "type": "integer", "minimum": 1, "default": 50 }
        },
        "required": ["project_id", "action"]
    })
}

fn parse_status(s: &str) -> Result<TaskStatus, String> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "active" => Ok(TaskStatus::Active),
        "in_progress" => Ok(TaskStatus::InProgress),
        "blocked" => Ok(TaskStatus::Blocked),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        "suspended" => Ok(TaskStatus::Suspended),
        other => Err(format!("unknown status '{other}'")),
    }
}

fn parse_priority(s: &str) -> Result<TaskPriority, String> {
    match s {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        "critical" => Ok(TaskPriority::Critical),
        other => Err(format!("unknown priority '{other}'")),
    }
}

fn conflict_kind_str(kind: ConflictKind) -> &'static str {
    match kind {
        ConflictKind::ResourceContention => "resource_contention",
        ConflictKind::DependencyCycle => "dependency_cycle",
        ConflictKind::TimingConflict => "timing_conflict",
        ConflictKind::PriorityConflict => "priority_conflict",
        ConflictKind::CapacityOverload => "capacity_overload",
    }
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("list");

    match action {
        "create" => {
            let title = require_str(&args, "title")?.to_string();
            let priority = match args.get("priority").and_then(|v| v.as_str()) {
                Some(s) => parse_priority(s)?,
                None => TaskPriority::Medium,
            };
            let owner = args.get("owner").and_then(|v| v.as_str()).map(String::from);
            let parent_id = match args.get("parent_id").and_then(|v| v.as_str()) {
                Some(s) => Some(uuid::Uuid::parse_str(s).map_err(|e| e.to_string())?),
                None => None,
            };
            let deadline = match args.get("deadline").and_then(|v| v.as_str()) {
                Some(s) => Some(DateTime::parse_from_rfc3339(s).map_err(|e| e.to_string())?.with_timezone(&Utc)),
                None => None,
            };
            let dependencies: Vec<uuid::Uuid> = args
                .get("dependencies")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().and_then(|s| uuid::Uuid::parse_str(s).ok()))
                        .collect()
                })
                .unwrap_or_default();

            let task = ctx
                .prospective
                .create(project_id, title, priority, owner, parent_id, deadline, dependencies)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({ "task": task }))
        }
        "add-dependency" => {
            let id = require_uuid(&args, "id")?;
            let depends_on_id = require_uuid(&args, "depends_on_id")?;
            let task = ctx.prospective.add_dependency(project_id, id, depends_on_id).await.map_err(|e| e.to_string())?;
            match task {
                Some(task) => Ok(json!({ "task": task })),
                None => Err(format!("task '{id}' not found")),
            }
        }
        "set-status" => {
            let id = require_uuid(&args, "id")?;
            let status = parse_status(require_str(&args, "status")?)?;
            let task = ctx.prospective.set_status(project_id, id, status).await.map_err(|e| e.to_string())?;
            match task {
                Some(task) => Ok(json!({ "task": task })),
                None => Err(format!("task '{id}' not found")),
            }
        }
        "activate" => {
            let id = require_uuid(&args, "id")?;
            let task = ctx.prospective.activate(project_id, id).await.map_err(|e| e.to_string())?;
            match task {
                Some(task) => Ok(json!({ "task": task })),
                None => Err(format!("task '{id}' not found")),
            }
        }
        "complete" => {
            let id = require_uuid(&args, "id")?;
            let succeeded = args.get("succeeded").and_then(|v| v.as_bool()).unwrap_or(true);
            let task = ctx.prospective.complete(project_id, id, succeeded).await.map_err(|e| e.to_string())?;
            match task {
                Some(task) => Ok(json!({ "task": task })),
                None => Err(format!("task '{id}' not found")),
            }
        }
        "get" => {
            let id = require_uuid(&args, "id")?;
            let task = ctx.prospective.get(project_id, id).await.map_err(|e| e.to_string())?;
            Ok(json!({ "task": task }))
        }
        "ready" => {
            let tasks = ctx.prospective.ready(project_id).await.map_err(|e| e.to_string())?;
            Ok(json!({ "tasks": tasks }))
        }
        "list" => {
            let limit = optional_usize(&args, "limit", 50);
            let tasks = ctx.prospective.list(project_id, limit).await.map_err(|e| e.to_string())?;
            Ok(json!({ "tasks": tasks }))
        }
        "hierarchy" => {
            let hierarchy = ctx.prospective.get_hierarchy(project_id).await.map_err(|e| e.to_string())?;
            Ok(json!({ "hierarchy": hierarchy_to_json(&hierarchy) }))
        }
        "conflicts" => {
            let conflicts = ctx.prospective.detect_conflicts(project_id).await.map_err(|e| e.to_string())?;
            let conflicts: Vec<Value> = conflicts
                .iter()
                .map(|c| json!({ "kind": conflict_kind_str(c.kind), "task_ids": c.task_ids, "detail": c.detail }))
                .collect();
            Ok(json!({ "conflicts": conflicts }))
        }
        other => Err(format!("unknown action '{other}'")),
    }
}

fn hierarchy_to_json(nodes: &[athena_core::layers::TaskHierarchyNode]) -> Vec<Value> {
    nodes
        .iter()
        .map(|node| json!({ "task": node.task, "children": hierarchy_to_json(&node.children) }))
        .collect()
}
