//! Tool registry
//!
//! One static table mapping a tool name to its schema and dispatch
//! function, built once and consulted by both `tools/list` and
//! `tools/call`.

use serde_json::Value;

use crate::context::ServerContext;
use crate::tools::{self, ToolResult};

pub struct ToolEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: fn() -> Value,
    pub execute: for<'a> fn(&'a ServerContext, Option<Value>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ToolResult> + Send + 'a>>,
}

macro_rules! entry {
    ($name:literal, $description:literal, $schema:expr, $execute:expr) => {
        ToolEntry {
            name: $name,
            description: $description,
            schema: $schema,
            execute: |ctx, args| Box::pin($execute(ctx, args)),
        }
    };
}

pub fn registry() -> Vec<ToolEntry> {
    vec![
        entry!("recall", "Cascading, confidence-scored search across episodic, semantic, and procedural memory.", tools::recall::schema, tools::recall::execute),
        entry!("ingest-event", "Record a raw episodic observation; deduplicates by content hash.", tools::ingest_event::schema, tools::ingest_event::execute),
        entry!("consolidate", "Run one System 1 + System 2 consolidation pass over recent episodic events.", tools::consolidate::schema, tools::consolidate::execute),
        entry!("working-memory-push", "Admit or list items in a session's bounded working-memory buffer.", tools::working_memory::schema, tools::working_memory::execute),
        entry!("task", "Prospective memory: create, link, update, and query deferred tasks.", tools::task::schema, tools::task::execute),
        entry!("procedure", "Procedural memory: create, update outcomes for, and list learned procedures.", tools::procedure::schema, tools::procedure::execute),
        entry!("graph", "Entity/relation graph: upsert entities, relate them, and traverse neighbors.", tools::graph::schema, tools::graph::execute),
        entry!("session", "Open, touch, or close a live agent session.", tools::session::schema, tools::session::execute),
        entry!("verify-decision-feedback", "Run the verification gateway on a candidate, or record feedback on an existing memory.", tools::feedback::schema, tools::feedback::execute),
        entry!("system-status", "Health probe and metrics snapshot.", tools::system_status::schema, tools::system_status::execute),
        entry!("backup", "Trigger an online SQLite backup of the embedded store.", tools::backup::schema, tools::backup::execute),
    ]
}
