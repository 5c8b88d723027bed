//! `working-memory-push` — admit an item into a session's bounded
//! working-memory buffer (§4.7, §8 "working-memory trigger" scenario).
//! `action: "list"` returns the current resident set instead.

use serde_json::{json, Value};

use athena_core::layers::{AdmitOutcome, PromotedTo};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, require_project_id, require_str, require_uuid, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "action": { "type": "string", "enum": ["push", "list"], "default": "push" },
            "session_id": { "type": "string", "format": "uuid" },
            "subject_id": { "type": "string", "format": "uuid" },
            "subject_layer": { "type": "string" },
            "summary": { "type": "string" },
            "importance": { "type": "number", "minimum": 0, "maximum": 1, "default": 0.5 },
            "distinctiveness": { "type": "number", "minimum": 0, "maximum": 1, "default": 0.5 }
        },
        "required": ["project_id", "session_id"]
    })
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let session_id = require_uuid(&args, "session_id")?;
    let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("push");

    if action == "list" {
        let items = ctx.working_memory.for_session(project_id, session_id).await.map_err(|e| e.to_string())?;
        return Ok(json!({ "items": items }));
    }

    let subject_id = require_uuid(&args, "subject_id")?;
    let subject_layer = require_str(&args, "subject_layer")?.to_string();
    let summary = require_str(&args, "summary")?.to_string();
    let importance = args.get("importance").and_then(|v| v.as_f64()).unwrap_or(0.5);
    let distinctiveness = args.get("distinctiveness").and_then(|v| v.as_f64()).unwrap_or(0.5);

    let resource_key = format!("working_memory:{session_id}");
    let lock = ctx.locks.lock_for(project_id, &resource_key).await;
    let _guard = lock.lock().await;

    let outcome = ctx
        .working_memory
        .admit(project_id, session_id, subject_id, subject_layer, summary, importance, distinctiveness)
        .await
        .map_err(|e| e.to_string())?;

    Ok(match outcome {
        AdmitOutcome::Admitted => json!({ "outcome": "admitted" }),
        AdmitOutcome::AdmittedWithEviction(evicted, promoted_to) => {
            json!({ "outcome": "admitted_with_eviction", "evicted": evicted, "promoted_to": promoted_to_json(&promoted_to) })
        }
        AdmitOutcome::Rejected => json!({ "outcome": "rejected" }),
    })
}

fn promoted_to_json(promoted: &PromotedTo) -> Value {
    match promoted {
        PromotedTo::Episodic => json!({ "layer": "episodic" }),
        PromotedTo::Semantic(id) => json!({ "layer": "semantic", "id": id }),
        PromotedTo::Procedural(id) => json!({ "layer": "procedural", "id": id }),
        PromotedTo::Prospective(id) => json!({ "layer": "prospective", "id": id }),
    }
}
