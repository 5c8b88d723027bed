//! Tool modules
//!
//! One Rust module per MCP tool, each exporting `schema()` and
//! `execute()`, collected by the registry into a single dispatch table.

pub mod backup;
pub mod consolidate;
pub mod feedback;
pub mod graph;
pub mod ingest_event;
pub mod procedure;
pub mod recall;
pub mod session;
pub mod system_status;
pub mod task;
pub mod working_memory;

use serde_json::Value;

/// A tool handler's outcome: JSON on success, a human-readable message on
/// failure. The server wraps either side into the JSON-RPC envelope.
pub type ToolResult = Result<Value, String>;

/// Pull a required string field out of the arguments object.
pub fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, String> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing required field '{field}'"))
}

/// Pull a required UUID field out of the arguments object.
pub fn require_uuid(args: &Value, field: &str) -> Result<uuid::Uuid, String> {
    let raw = require_str(args, field)?;
    uuid::Uuid::parse_str(raw).map_err(|e| format!("field '{field}' is not a valid UUID: {e}"))
}

/// Pull the always-required `project_id` field.
pub fn require_project_id(args: &Value) -> Result<uuid::Uuid, String> {
    require_uuid(args, "project_id")
}

pub fn optional_usize(args: &Value, field: &str, default: usize) -> usize {
    args.get(field).and_then(|v| v.as_u64()).map(|v| v as usize).unwrap_or(default)
}

pub fn args_or_empty(args: Option<Value>) -> Value {
    args.unwrap_or_else(|| serde_json::json!({}))
}
