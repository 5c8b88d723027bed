//! Verification gateway
//!
//! Runs a fixed pipeline of quality gates over a *set* of candidate items
//! before they are returned or persisted, per §4.9. Every gate sees the
//! whole working set — contradiction and redundancy are pairwise
//! properties, and coherence is an ordering property, so no single-item
//! check can catch them. A hard-failure gate (grounding, soundness) drops
//! the offending items from the working set rather than aborting the
//! whole pass; the decision only becomes `Reject` if that leaves nothing
//! standing.
//!
//! Efficiency isn't a gate object — the gateway times every other gate's
//! `check()` call itself and synthesizes the efficiency verdict from
//! those timings, since "how long the pipeline took" isn't something a
//! gate can honestly measure about itself.

pub mod gates;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

pub use gates::{GateName, GateOutcome, VerifiableItem};

/// A single gate's verdict, as recorded in the decision log.
#[derive(Debug, Clone)]
pub struct GateResult {
    pub gate: GateName,
    pub passed: bool,
    pub violations: Vec<String>,
    pub remediation: Option<String>,
}

/// The gateway's overall call on a working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Accept,
    AcceptWithRemediation,
    Reject,
}

/// A full record of one verification pass, suitable for audit.
#[derive(Debug, Clone)]
pub struct VerificationDecision {
    pub id: Uuid,
    pub outcome: DecisionOutcome,
    pub gate_results: Vec<GateResult>,
    /// Ids that survived every gate, in final order.
    pub surviving_ids: Vec<Uuid>,
    pub decided_at: chrono::DateTime<Utc>,
}

/// Per-gate latency budget. A gate that runs longer than this on a given
/// pass fails the synthesized efficiency check for that pass.
const GATE_LATENCY_BUDGET: Duration = Duration::from_millis(50);

/// Runs the fixed gate pipeline and renders a decision over a working
/// set of items.
pub struct VerificationGateway {
    gates: Vec<Box<dyn gates::Gate>>,
}

impl VerificationGateway {
    /// The standard pipeline: grounding, confidence, consistency,
    /// soundness, minimality, coherence — efficiency is measured by the
    /// gateway itself, not run as a gate.
    pub fn standard(confidence_min: f64, minimality_cosine: f64) -> Self {
        Self {
            gates: vec![
                Box::new(gates::GroundingGate),
                Box::new(gates::ConfidenceGate { min_confidence: confidence_min }),
                Box::new(gates::ConsistencyGate { contradiction_cosine_min: 0.85 }),
                Box::new(gates::SoundnessGate),
                Box::new(gates::MinimalityGate { max_cosine_within_set: minimality_cosine }),
                Box::new(gates::CoherenceGate),
            ],
        }
    }

    pub fn verify(&self, items: &[VerifiableItem], known_source_ids: &HashSet<Uuid>) -> VerificationDecision {
        let mut working: Vec<VerifiableItem> = items.to_vec();
        let mut gate_results = Vec::with_capacity(self.gates.len() + 1);
        let mut hard_failure = false;
        let mut slow_gates = Vec::new();

        for gate in &self.gates {
            let started = Instant::now();
            let outcome = gate.check(&working, known_source_ids);
            let elapsed = started.elapsed();
            if elapsed > GATE_LATENCY_BUDGET {
                slow_gates.push(format!("{:?} took {:?}", gate.name(), elapsed));
            }

            if !outcome.drop_ids.is_empty() {
                working.retain(|item| !outcome.drop_ids.contains(&item.id));
            }
            if gate.name() == GateName::Coherence && !outcome.passed {
                working.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            }
            if !outcome.passed && matches!(gate.name(), GateName::Grounding | GateName::Soundness) {
                hard_failure = true;
            }

            gate_results.push(GateResult { gate: gate.name(), passed: outcome.passed, violations: outcome.violations, remediation: outcome.remediation });
        }

        gate_results.push(GateResult {
            gate: GateName::Efficiency,
            passed: slow_gates.is_empty(),
            violations: slow_gates.clone(),
            remediation: (!slow_gates.is_empty()).then(|| "narrow the working set before re-running verification".into()),
        });

        let surviving_ids: Vec<Uuid> = working.iter().map(|i| i.id).collect();
        let outcome = if !items.is_empty() && surviving_ids.is_empty() {
            DecisionOutcome::Reject
        } else if hard_failure || gate_results.iter().any(|r| !r.passed) {
            DecisionOutcome::AcceptWithRemediation
        } else {
            DecisionOutcome::Accept
        };

        VerificationDecision { id: Uuid::new_v4(), outcome, gate_results, surviving_ids, decided_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(content: &str, confidence: f64, score: f64, source: Option<Uuid>) -> VerifiableItem {
        VerifiableItem { id: Uuid::new_v4(), content: content.into(), confidence, source_ids: source.into_iter().collect(), embedding: Some(vec![1.0, 0.0]), score }
    }

    #[test]
    fn fully_grounded_confident_set_is_accepted() {
        let source = Uuid::new_v4();
        let gateway = VerificationGateway::standard(0.5, 0.98);
        let known: HashSet<Uuid> = [source].into_iter().collect();
        let decision = gateway.verify(&[item("the build failed overnight", 0.9, 0.9, Some(source))], &known);
        assert_eq!(decision.outcome, DecisionOutcome::Accept);
        assert_eq!(decision.surviving_ids.len(), 1);
    }

    #[test]
    fn five_hits_one_ungrounded_drops_to_four_with_remediation() {
        let known_source = Uuid::new_v4();
        let gateway = VerificationGateway::standard(0.5, 0.98);
        let known: HashSet<Uuid> = [known_source].into_iter().collect();

        let mut items = Vec::new();
        for i in 0..4 {
            items.push(item(&format!("grounded fact number {i}"), 0.9, 0.9 - i as f64 * 0.1, Some(known_source)));
        }
        items.push(item("an ungrounded claim with no source", 0.95, 0.95, Some(Uuid::new_v4())));

        let decision = gateway.verify(&items, &known);
        assert_eq!(decision.surviving_ids.len(), 4);
        assert_eq!(decision.outcome, DecisionOutcome::AcceptWithRemediation);
        let grounding = decision.gate_results.iter().find(|r| r.gate == GateName::Grounding).unwrap();
        assert!(!grounding.passed);
    }

    #[test]
    fn rejecting_every_item_yields_reject() {
        let gateway = VerificationGateway::standard(0.5, 0.98);
        let decision = gateway.verify(&[item("no sources at all here", 0.9, 0.9, None)], &HashSet::new());
        assert_eq!(decision.outcome, DecisionOutcome::Reject);
        assert!(decision.surviving_ids.is_empty());
    }

    #[test]
    fn empty_input_is_accepted_trivially() {
        let gateway = VerificationGateway::standard(0.5, 0.98);
        let decision = gateway.verify(&[], &HashSet::new());
        assert_eq!(decision.outcome, DecisionOutcome::Accept);
    }
}
