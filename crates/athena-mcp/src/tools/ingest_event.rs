//! `ingest-event` — record a raw episodic observation, with PII
//! redaction and content-hash dedup (§4.2, §8 "dedup" scenario).

use serde_json::{json, Value};

use athena_core::layers::{IngestOutcome, NewEpisodicEvent};
use athena_core::model::{CodeEventType, EventOutcome, EventType};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, require_project_id, require_str, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "session_id": { "type": "string", "format": "uuid" },
            "content": { "type": "string" },
            "event_type": {
                "type": "string",
                "enum": ["action", "observation", "decision", "error", "test", "commit", "conversation"],
                "default": "observation"
            },
            "code_event_type": { "type": "string", "enum": ["edit", "review", "run", "diff"] },
            "outcome": {
                "type": "string",
                "enum": ["success", "failure", "partial", "blocked", "unknown"],
                "default": "unknown"
            },
            "context": { "type": "object" },
            "code": { "type": "object" },
            "vc": { "type": "object" },
            "metrics": { "type": "object" },
            "test": { "type": "object" },
            "quality": { "type": "object" },
            "tags": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["project_id", "content"]
    })
}

fn parse_event_type(s: &str) -> Result<EventType, String> {
    match s {
        "action" => Ok(EventType::Action),
        "observation" => Ok(EventType::Observation),
        "decision" => Ok(EventType::Decision),
        "error" => Ok(EventType::Error),
        "test" => Ok(EventType::Test),
        "commit" => Ok(EventType::Commit),
        "conversation" => Ok(EventType::Conversation),
        other => Err(format!("unknown event_type '{other}'")),
    }
}

fn parse_code_event_type(s: &str) -> Result<CodeEventType, String> {
    match s {
        "edit" => Ok(CodeEventType::Edit),
        "review" => Ok(CodeEventType::Review),
        "run" => Ok(CodeEventType::Run),
        "diff" => Ok(CodeEventType::Diff),
        other => Err(format!("unknown code_event_type '{other}'")),
    }
}

fn parse_outcome(s: &str) -> Result<EventOutcome, String> {
    match s {
        "success" => Ok(EventOutcome::Success),
        "failure" => Ok(EventOutcome::Failure),
        "partial" => Ok(EventOutcome::Partial),
        "blocked" => Ok(EventOutcome::Blocked),
        "unknown" => Ok(EventOutcome::Unknown),
        other => Err(format!("unknown outcome '{other}'")),
    }
}

fn parse_nested<T: Default + serde::de::DeserializeOwned>(args: &Value, key: &str) -> Result<T, String> {
    match args.get(key) {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| format!("invalid {key}: {e}")),
        None => Ok(T::default()),
    }
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let content = require_str(&args, "content")?;
    let session_id = match args.get("session_id").and_then(|v| v.as_str()) {
        Some(s) => Some(uuid::Uuid::parse_str(s).map_err(|e| e.to_string())?),
        None => None,
    };
    let event_type = match args.get("event_type").and_then(|v| v.as_str()) {
        Some(s) => parse_event_type(s)?,
        None => EventType::Observation,
    };
    let code_event_type = match args.get("code_event_type").and_then(|v| v.as_str()) {
        Some(s) => Some(parse_code_event_type(s)?),
        None => None,
    };
    let outcome = match args.get("outcome").and_then(|v| v.as_str()) {
        Some(s) => parse_outcome(s)?,
        None => EventOutcome::Unknown,
    };
    let tags: Vec<String> = args
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|t| t.as_str().map(String::from)).collect())
        .unwrap_or_default();

    let draft = NewEpisodicEvent {
        session_id,
        event_type,
        code_event_type,
        content: content.to_string(),
        outcome,
        context: parse_nested(&args, "context")?,
        code: parse_nested(&args, "code")?,
        vc: parse_nested(&args, "vc")?,
        metrics: parse_nested(&args, "metrics")?,
        test: parse_nested(&args, "test")?,
        quality: parse_nested(&args, "quality")?,
        tags,
    };

    let resource_key = format!("episodic:{project_id}");
    let lock = ctx.locks.lock_for(project_id, &resource_key).await;
    let _guard = lock.lock().await;

    let outcome = ctx.episodic.create_event(project_id, draft).await.map_err(|e| e.to_string())?;

    match outcome {
        IngestOutcome::Created(event) => {
            ctx.metrics.incr(athena_core::observability::METRIC_EVENTS_INGESTED);
            Ok(json!({ "outcome": "created", "event": event }))
        }
        IngestOutcome::Duplicate(id) => {
            ctx.metrics.incr(athena_core::observability::METRIC_EVENTS_DEDUPLICATED);
            Ok(json!({ "outcome": "duplicate", "existing_event_id": id }))
        }
    }
}
