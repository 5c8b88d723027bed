//! `verify-decision-feedback` — run the verification gateway over a set
//! of candidate items, or record an explicit human/agent judgment against
//! an existing memory (§4.9).

use std::collections::HashSet;

use serde_json::{json, Value};
use uuid::Uuid;

use athena_core::verification::{DecisionOutcome, GateName, VerifiableItem};

use crate::context::ServerContext;
use crate::tools::{args_or_empty, require_project_id, require_str, require_uuid, ToolResult};

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": { "type": "string", "format": "uuid" },
            "action": { "type": "string", "enum": ["verify", "feedback"], "default": "feedback" },

            "items": {
                "type": "array",
                "description": "verify: candidate items to check as one working set",
                "items": {
                    "type": "object",
                    "properties": {
                        "statement": { "type": "string" },
                        "confidence": { "type": "number" },
                        "source_event_ids": { "type": "array", "items": { "type": "string", "format": "uuid" } }
                    },
                    "required": ["statement"]
                }
            },

            "subject_id": { "type": "string", "format": "uuid", "description": "feedback: memory this judgment is about" },
            "subject_layer": { "type": "string" },
            "judgment": { "type": "string" },
            "note": { "type": "string" }
        },
        "required": ["project_id", "action"]
    })
}

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

pub async fn execute(ctx: &ServerContext, args: Option<Value>) -> ToolResult {
    let args = args_or_empty(args);
    let project_id = require_project_id(&args)?;
    let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("feedback");

    match action {
        "verify" => {
            let raw_items = args.get("items").and_then(|v| v.as_array()).cloned().unwrap_or_default();
            if raw_items.is_empty() {
                return Err("verify requires a non-empty 'items' array".into());
            }

            let mut items = Vec::with_capacity(raw_items.len());
            let mut cited_source_ids: HashSet<Uuid> = HashSet::new();
            for raw in &raw_items {
                let statement = raw.get("statement").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let confidence = raw.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let source_ids: Vec<Uuid> = raw
                    .get("source_event_ids")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok())).collect())
                    .unwrap_or_default();
                cited_source_ids.extend(&source_ids);

                let embedding = ctx.embedder.embed(&statement).await.ok();
                items.push(VerifiableItem { id: Uuid::new_v4(), content: statement, confidence, source_ids, embedding, score: confidence });
            }

            let mut known_source_ids = HashSet::new();
            for id in cited_source_ids {
                if ctx.episodic.get(project_id, id).await.map_err(|e| e.to_string())?.is_some() {
                    known_source_ids.insert(id);
                }
            }

            let decision = ctx.verification.verify(&items, &known_source_ids);
            let gates: Vec<Value> = decision
                .gate_results
                .iter()
                .map(|r| json!({ "gate": gate_name_str(r.gate), "passed": r.passed, "violations": r.violations, "remediation": r.remediation }))
                .collect();

            if decision.outcome == DecisionOutcome::Reject {
                ctx.metrics.incr(athena_core::observability::METRIC_VERIFICATION_REJECTIONS);
            }

            Ok(json!({
                "decision_id": decision.id,
                "outcome": outcome_str(decision.outcome),
                "surviving_ids": decision.surviving_ids,
                "gates": gates,
                "decided_at": decision.decided_at,
            }))
        }
        "feedback" => {
            let subject_id = require_uuid(&args, "subject_id")?;
            let subject_layer = require_str(&args, "subject_layer")?.to_string();
            let judgment = require_str(&args, "judgment")?.to_string();
            let note = args.get("note").and_then(|v| v.as_str()).map(String::from);

            let entry = ctx.meta.record(project_id, subject_id, subject_layer, judgment, note).await.map_err(|e| e.to_string())?;
            Ok(json!({ "entry": entry }))
        }
        other => Err(format!("unknown action '{other}'")),
    }
}
