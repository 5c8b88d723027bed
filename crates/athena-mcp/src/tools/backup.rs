//! `backup` — online SQLite backup of the embedded store. Only
//! meaningful for the embedded, file-backed storage backend.

use std::time::Duration;

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "destination_path": { "type": "string", "description": "Where to write the backup file." }
        },
        "required": ["destination_path"]
    })
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let destination = args
        .get("destination_path")
        .and_then(|v| v.as_str())
        .ok_or("missing required field 'destination_path'")?
        .to_string();

    let source = ctx
        .config
        .database_path
        .clone()
        .ok_or("backup requires a file-backed embedded database (set database_path)")?;

    let destination_for_task = destination.clone();
    tokio::task::spawn_blocking(move || -> Result<(), String> {
        let src = rusqlite::Connection::open(&source).map_err(|e| e.to_string())?;
        let mut dst = rusqlite::Connection::open(&destination_for_task).map_err(|e| e.to_string())?;
        let backup = rusqlite::backup::Backup::new(&src, &mut dst).map_err(|e| e.to_string())?;
        backup
            .run_to_completion(5, Duration::from_millis(250), None)
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())??;

    Ok(json!({ "outcome": "backed_up", "destination_path": destination }))
}
