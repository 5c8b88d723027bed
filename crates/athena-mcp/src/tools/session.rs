//! `session-*` — live agent session lifecycle (§4.8). Actions: open,
//! touch, close.

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, require_project_id, require_uuid, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "action": { "type": "string", "enum": ["open", "touch", "close"], "default": "open" },
            "id": { "type": "string", "format": "uuid" },
            "label": { "type": "string" }
        },
        "required": ["project_id", "action"]
    })
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("open");

    match action {
        "open" => {
            let label = args.get("label").and_then(|v| v.as_str()).map(String::from);
            let session = ctx.session.open(project_id, label).await.map_err(|e| e.to_string())?;
            Ok(json!({ "session": session }))
        }
        "touch" => {
            let id = require_uuid(&args, "id")?;
            let session = ctx.session.touch(project_id, id).await.map_err(|e| e.to_string())?;
            match session {
                Some(session) => Ok(json!({ "session": session })),
                None => Err(format!("session '{id}' not found")),
            }
        }
        "close" => {
            let id = require_uuid(&args, "id")?;
            let session = ctx.session.close(project_id, id).await.map_err(|e| e.to_string())?;
            match session {
                Some(session) => Ok(json!({ "session": session })),
                None => Err(format!("session '{id}' not found")),
            }
        }
        other => Err(format!("unknown action '{other}'")),
    }
}
