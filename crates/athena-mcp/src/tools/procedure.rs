//! `procedure-*` — learned step sequences with a running success/failure
//! tally. Actions: create, record-outcome, find-applicable, execute,
//! rollback, get, list.

use serde_json::{json, Value};

use athena_core::model::{ProcedureSource, ProcedureStep};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, optional_usize, require_project_id, require_str, require_uuid, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "action": {
                "type": "string",
                "enum": ["create", "record-outcome", "find-applicable", "execute", "rollback", "get", "list"],
                "default": "list"
            },
            "id": { "type": "string", "format": "uuid" },
            "name": { "type": "string" },
            "category": { "type": "string" },
            "source": { "type": "string", "enum": ["learned", "authored"], "default": "learned" },
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "ordinal": { "type": "integer" },
                        "instruction": { "type": "string" }
                    },
                    "required": ["ordinal", "instruction"]
                }
            },
            "tags": { "type": "array", "items": { "type": "string" } },
            "git_hash": { "type": "string" },
            "context_tags": { "type": "array", "items": { "type": "string" } },
            "kwargs": { "type": "object" },
            "target_version": { "type": "integer" },
            "succeeded": { "type": "boolean" },
            "duration_ms": { "type": "integer" },
            "limit": { "type": "integer", "minimum": 1, "default": 50 }
        },
        "required": ["project_id", "action"]
    })
}

fn parse_source(s: &str) -> Result<ProcedureSource, String> {
    match s {
        "learned" => Ok(ProcedureSource::Learned),
        "authored" => Ok(ProcedureSource::Authored),
        other => Err(format!("unknown source '{other}'")),
    }
}

fn parse_steps(args: &Value) -> Vec<ProcedureStep> {
    args.get("steps")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| {
                    let ordinal = s.get("ordinal")?.as_u64()? as u32;
                    let instruction = s.get("instruction")?.as_str()?.to_string();
                    Some(ProcedureStep { ordinal, instruction })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_tags(args: &Value, field: &str) -> Vec<String> {
    args.get(field)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|t| t.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("list");

    match action {
        "create" => {
            let name = require_str(&args, "name")?.to_string();
            let category = args.get("category").and_then(|v| v.as_str()).unwrap_or("general").to_string();
            let source = match args.get("source").and_then(|v| v.as_str()) {
                Some(s) => parse_source(s)?,
                None => ProcedureSource::Learned,
            };
            let steps = parse_steps(&args);
            let tags = parse_tags(&args, "tags");
            let git_hash = args.get("git_hash").and_then(|v| v.as_str()).map(String::from);

            let embedding = ctx.embedder.embed(&name).await.ok();
            let procedure = ctx
                .procedural
                .create(project_id, name, category, source, steps, tags, git_hash, embedding)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({ "procedure": procedure }))
        }
        "record-outcome" => {
            let id = require_uuid(&args, "id")?;
            let succeeded = args.get("succeeded").and_then(|v| v.as_bool()).ok_or("missing required field 'succeeded'")?;
            let duration_ms = args.get("duration_ms").and_then(|v| v.as_i64());
            let procedure = ctx.procedural.record_outcome(project_id, id, succeeded, duration_ms).await.map_err(|e| e.to_string())?;
            match procedure {
                Some(procedure) => Ok(json!({ "procedure": procedure })),
                None => Err(format!("procedure '{id}' not found")),
            }
        }
        "find-applicable" => {
            let context_tags = parse_tags(&args, "context_tags");
            let procedures = ctx.procedural.find_applicable(project_id, &context_tags).await.map_err(|e| e.to_string())?;
            Ok(json!({ "procedures": procedures }))
        }
        "execute" => {
            let id = require_uuid(&args, "id")?;
            let kwargs = args.get("kwargs").cloned().unwrap_or_else(|| json!({}));
            let result = ctx.procedural.execute(project_id, id, kwargs).await.map_err(|e| e.to_string())?;
            Ok(json!({ "succeeded": result.succeeded, "detail": result.detail }))
        }
        "rollback" => {
            let id = require_uuid(&args, "id")?;
            let target_version = args.get("target_version").and_then(|v| v.as_u64()).ok_or("missing required field 'target_version'")? as u32;
            let procedure = ctx.procedural.rollback_to(project_id, id, target_version).await.map_err(|e| e.to_string())?;
            match procedure {
                Some(procedure) => Ok(json!({ "procedure": procedure })),
                None => Err(format!("procedure '{id}' not found")),
            }
        }
        "get" => {
            let id = require_uuid(&args, "id")?;
            let procedure = ctx.procedural.get(project_id, id).await.map_err(|e| e.to_string())?;
            Ok(json!({ "procedure": procedure }))
        }
        "list" => {
            let limit = optional_usize(&args, "limit", 50);
            let procedures = ctx.procedural.list(project_id, limit).await.map_err(|e| e.to_string())?;
            Ok(json!({ "procedures": procedures }))
        }
        other => Err(format!("unknown action '{other}'")),
    }
}
