//! `consolidate` — run one System 1 + System 2 consolidation pass over a
//! project's recent episodic events (§4.6), then verify whatever it
//! created before calling the run final (§4.9).

use std::collections::HashSet;

use serde_json::{json, Value};
use uuid::Uuid;

use athena_core::verification::{DecisionOutcome, GateName, VerifiableItem};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, optional_usize, require_project_id, ToolResult};

fn gate_name_str(name: GateName) -> &'static str {
    match name {
        GateName::Grounding => "grounding",
        GateName::Confidence => "confidence",
        GateName::Consistency => "consistency",
        GateName::Soundness => "soundness",
        GateName::Minimality => "minimality",
        GateName::Coherence => "coherence",
        GateName::Efficiency => "efficiency",
    }
}

fn outcome_str(outcome: DecisionOutcome) -> &'static str {
    match outcome {
        DecisionOutcome::Accept => "accept",
        DecisionOutcome::AcceptWithRemediation => "accept_with_remediation",
        DecisionOutcome::Reject => "reject",
    }
}

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "batch_size": { "type": "integer", "minimum": 1, "default": 200 }
        },
        "required": ["project_id"]
    })
}

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let batch_size = optional_usize(&args, "batch_size", 200);

    let resource_key = format!("consolidation:{project_id}");
    let lock = ctx.locks.lock_for(project_id, &resource_key).await;
    let _guard = lock.lock().await;

    let run = ctx.consolidation.run(project_id, batch_size).await.map_err(|e| e.to_string())?;
    ctx.metrics.incr(athena_core::observability::METRIC_CONSOLIDATION_RUNS);

    let mut known_source_ids: HashSet<Uuid> = HashSet::new();
    let mut items = Vec::with_capacity(run.created_memory_ids.len());
    for id in &run.created_memory_ids {
        let Some(memory) = ctx.semantic.get(project_id, *id).await.map_err(|e| e.to_string())? else { continue };
        for source_id in &memory.source_event_ids {
            if ctx.episodic.get(project_id, *source_id).await.map_err(|e| e.to_string())?.is_some() {
                known_source_ids.insert(*source_id);
            }
        }
        items.push(VerifiableItem {
            id: memory.id,
            content: memory.statement.clone(),
            confidence: memory.confidence,
            source_ids: memory.source_event_ids.clone(),
            embedding: memory.embedding.clone(),
            score: memory.confidence,
        });
    }

    let verification = if items.is_empty() {
        None
    } else {
        let decision = ctx.verification.verify(&items, &known_source_ids);
        let gates: Vec<Value> = decision
            .gate_results
            .iter()
            .map(|r| json!({ "gate": gate_name_str(r.gate), "passed": r.passed, "violations": r.violations, "remediation": r.remediation }))
            .collect();
        Some(json!({
            "decision_id": decision.id,
            "outcome": outcome_str(decision.outcome),
            "surviving_ids": decision.surviving_ids,
            "gates": gates,
        }))
    };

    let mut body = serde_json::to_value(run).map_err(|e| e.to_string())?;
    body["verification"] = verification.unwrap_or(Value::Null);
    Ok(body)
}
