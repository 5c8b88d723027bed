//! `recall` — cascading, confidence-scored search across one or more
//! memory layers (§4.4, §4.5), gated through the verification pipeline
//! before anything is returned (§4.9).

use std::collections::HashSet;

use serde_json::{json, Value};
use uuid::Uuid;

use athena_core::retrieval::RetrievedItem;
use athena_core::storage::Namespace;
use athena_core::verification::VerifiableItem;

use crate::context::ServerContext;
use crate::tools::{args_or_empty, optional_usize, require_project_id, require_str, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "query": { "type": "string" },
            "namespaces": {
                "type": "array",
                "items": { "type": "string", "enum": ["episodic", "semantic", "procedural"] },
                "description": "Defaults to all three content layers."
            },
            "top_k": { "type": "integer", "minimum": 1, "default": 10 }
        },
        "required": ["project_id", "query"]
    })
}

fn namespace_from_str(s: &str) -> Option<&'static str> {
    match s {
        "episodic" => Some(Namespace::Episodic.as_str()),
        "semantic" => Some(Namespace::Semantic.as_str()),
        "procedural" => Some(Namespace::Procedural.as_str()),
        _ => None,
    }
}

/// Build a verifiable item for one recall hit. Raw episodic hits are
/// self-grounding (the event is its own source); everything else must
/// cite `source_event_ids` in its body to be considered grounded.
async fn verifiable_item(ctx: &ServerContext, project_id: athena_core::model::ProjectId, item: &RetrievedItem, known: &mut HashSet<Uuid>) -> VerifiableItem {
    let content = item
        .body
        .get("content")
        .or_else(|| item.body.get("statement"))
        .or_else(|| item.body.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let source_ids = if item.namespace == Namespace::Episodic.as_str() {
        if ctx.episodic.get(project_id, item.id).await.ok().flatten().is_some() {
            known.insert(item.id);
        }
        vec![item.id]
    } else {
        let cited: Vec<Uuid> = item
            .body
            .get("source_event_ids")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok())).collect())
            .unwrap_or_default();
        for id in &cited {
            if ctx.episodic.get(project_id, *id).await.ok().flatten().is_some() {
                known.insert(*id);
            }
        }
        cited
    };

    let embedding = ctx.embedder.embed(&content).await.ok();
    VerifiableItem { id: item.id, content, confidence: item.confidence, source_ids, embedding, score: item.confidence }
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let query = require_str(&args, "query")?;
    let top_k = optional_usize(&args, "top_k", 10);

    let namespaces: Vec<&'static str> = match args.get("namespaces").and_then(|v| v.as_array()) {
        Some(list) => {
            let mut out = Vec::new();
            for entry in list {
                let s = entry.as_str().ok_or_else(|| "namespaces entries must be strings".to_string())?;
                out.push(namespace_from_str(s).ok_or_else(|| format!("unknown namespace '{s}'"))?);
            }
            out
        }
        None => vec![Namespace::Episodic.as_str(), Namespace::Semantic.as_str(), Namespace::Procedural.as_str()],
    };

    let result = ctx.cascade.recall(&namespaces, project_id, query, top_k).await.map_err(|e| e.to_string())?;
    ctx.metrics.incr(athena_core::observability::METRIC_RECALL_CALLS);

    let tier = match result.tier {
        athena_core::retrieval::cascade::RecallTier::Tier1Heuristic => "tier1_heuristic",
        athena_core::retrieval::cascade::RecallTier::Tier2Hybrid => "tier2_hybrid",
        athena_core::retrieval::cascade::RecallTier::Tier3Synthesis => "tier3_synthesis",
    };

    let mut known_source_ids = HashSet::new();
    let mut verifiable = Vec::with_capacity(result.items.len());
    for item in &result.items {
        verifiable.push(verifiable_item(ctx, project_id, item, &mut known_source_ids).await);
    }
    let decision = ctx.verification.verify(&verifiable, &known_source_ids);
    let surviving: HashSet<Uuid> = decision.surviving_ids.iter().copied().collect();

    let by_id: std::collections::HashMap<Uuid, &RetrievedItem> = result.items.iter().map(|i| (i.id, i)).collect();
    let items: Vec<Value> = decision
        .surviving_ids
        .iter()
        .filter_map(|id| by_id.get(id))
        .map(|item| {
            json!({
                "id": item.id,
                "namespace": item.namespace,
                "confidence": item.confidence,
                "rrf_score": item.rrf_score,
                "body": item.body,
            })
        })
        .collect();
    let dropped = result.items.iter().filter(|i| !surviving.contains(&i.id)).count();
    if dropped > 0 {
        ctx.metrics.incr(athena_core::observability::METRIC_VERIFICATION_REJECTIONS);
    }

    Ok(json!({
        "tier": tier,
        "synthesis": result.synthesis,
        "items": items,
        "decision_id": decision.id,
    }))
}
