//! `graph-*` — entity/relation graph. Actions: upsert-entity, relate,
//! list-entities, list-relations, neighbors, path, communities.

use serde_json::{json, Value};

use athena_core::layers::GraphDirection;

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
                    "upsert-entity", "relate", "list-entities", "list-relations",
                    "neighbors", "path", "communities"
                ],
                "default": "list-entities"
            },
            "name": { "type": "string" },
            "entity_type": { "type": "string" },
            "attributes": { "type": "object" },
            "source_entity_id": { "type": "string", "format": "uuid" },
            "target_entity_id": { "type": "string", "format": "uuid" },
            "relation_type": { "type": "string" },
            "weight": { "type": "number", "default": 1.0 },
            "entity_id": { "type": "string", "format": "uuid" },
            "from_id": { "type": "string", "format": "uuid" },
            "to_id": { "type": "string", "format": "uuid" },
            "direction": { "type": "string", "enum": ["outgoing", "incoming", "both"], "default": "both" },
            "depth": { "type": "integer", "minimum": 1, "default": 2 },
            "max_depth": { "type": "integer", "minimum": 1, "default": 6 },
            "limit": { "type": "integer", "minimum": 1, "default": 100 }
        },
        "required": ["project_id", "action"]
    })
}

fn parse_direction(s: &str) -> Result<GraphDirection, String> {
    match s {
        "outgoing" => Ok(GraphDirection::Outgoing),
        "incoming" => Ok(GraphDirection::Incoming),
        "both" => Ok(GraphDirection::Both),
        other => Err(format!("unknown direction '{other}'")),
    }
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("list-entities");

    match action {
        "upsert-entity" => {
            let name = require_str(&args, "name")?.to_string();
            let entity_type = require_str(&args, "entity_type")?.to_string();
            let attributes = args.get("attributes").cloned().unwrap_or_else(|| json!({}));
            let entity = ctx.graph.upsert_entity(project_id, name, entity_type, attributes).await.map_err(|e| e.to_string())?;
            Ok(json!({ "entity": entity }))
        }
        "relate" => {
            let source_entity_id = require_uuid(&args, "source_entity_id")?;
            let target_entity_id = require_uuid(&args, "target_entity_id")?;
            let relation_type = require_str(&args, "relation_type")?.to_string();
            let weight = args.get("weight").and_then(|v| v.as_f64()).unwrap_or(1.0);
            let relation = ctx
                .graph
                .relate(project_id, source_entity_id, target_entity_id, relation_type, weight)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({ "relation": relation }))
        }
        "list-entities" => {
            let limit = optional_usize(&args, "limit", 100);
            let entities = ctx.graph.list_entities(project_id, limit).await.map_err(|e| e.to_string())?;
            Ok(json!({ "entities": entities }))
        }
        "list-relations" => {
            let limit = optional_usize(&args, "limit", 100);
            let relations = ctx.graph.list_relations(project_id, limit).await.map_err(|e| e.to_string())?;
            Ok(json!({ "relations": relations }))
        }
        "neighbors" => {
            let entity_id = require_uuid(&args, "entity_id")?;
            let direction = match args.get("direction").and_then(|v| v.as_str()) {
                Some(s) => parse_direction(s)?,
                None => GraphDirection::Both,
            };
            let depth = optional_usize(&args, "depth", 2);
            let neighbors = ctx.graph.neighbors(project_id, entity_id, direction, depth).await.map_err(|e| e.to_string())?;
            Ok(json!({ "neighbors": neighbors }))
        }
        "path" => {
            let from_id = require_uuid(&args, "from_id")?;
            let to_id = require_uuid(&args, "to_id")?;
            let max_depth = optional_usize(&args, "max_depth", 6);
            let path = ctx.graph.path(project_id, from_id, to_id, max_depth).await.map_err(|e| e.to_string())?;
            Ok(json!({ "path": path }))
        }
        "communities" => {
            let communities = ctx.graph.communities(project_id).await.map_err(|e| e.to_string())?;
            Ok(json!({ "communities": communities }))
        }
        other => Err(format!("unknown action '{other}'")),
    }
}
