//! `system-status` — health probe + metrics snapshot through the same
//! tool-dispatch surface as every other operation.

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let _ = args_or_empty(args);

    let status = ctx.health.check().await;
    let checks: Vec<Value> = status
        .checks
        .iter()
        .map(|(name, ok, detail)| json!({ "name": name, "ok": ok, "detail": detail }))
        .collect();

    Ok(json!({
        "healthy": status.healthy,
        "checks": checks,
        "metrics": ctx.metrics.snapshot(),
        "embedding_cache_hit_rate": ctx.embedding_cache.hit_rate(),
        "embedding_cache_hits": ctx.embedding_cache.hits(),
        "embedding_cache_misses": ctx.embedding_cache.misses(),
        "storage_backend": ctx.config.storage_backend,
        "embedding_dim": ctx.config.embedding_dim,
    }))
}
