//! The quality gates
//!
//! Each gate inspects the *whole* working set of items under
//! verification, not one item in isolation — contradictions, redundancy,
//! and ordering are properties of a set, and checking them one item at a
//! time would miss exactly the cases they exist to catch. A gate that
//! wants an item removed reports its id in `drop_ids`; the gateway is the
//! only thing that actually mutates the working set.

use std::collections::HashSet;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateName {
    Grounding,
    Confidence,
    Consistency,
    Soundness,
    Minimality,
    Coherence,
    Efficiency,
}

/// One piece of content under verification — a raw recall hit, a proposed
/// consolidation output, or a feedback statement. `score` is the ranking
/// score it was retrieved/proposed with; `source_ids` are the event or
/// memory ids it claims to be grounded in.
#[derive(Debug, Clone)]
pub struct VerifiableItem {
    pub id: Uuid,
    pub content: String,
    pub confidence: f64,
    pub source_ids: Vec<Uuid>,
    pub embedding: Option<Vec<f32>>,
    pub score: f64,
}

/// A gate's verdict on the whole working set.
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    pub passed: bool,
    pub violations: Vec<String>,
    pub remediation: Option<String>,
    /// Ids the gate wants removed from the working set. Applied by the
    /// gateway regardless of which gate asked — only `Grounding` and
    /// `Soundness` failures count toward a full `Reject`.
    pub drop_ids: Vec<Uuid>,
}

pub trait Gate: Send + Sync {
    fn name(&self) -> GateName;
    fn check(&self, items: &[VerifiableItem], known_source_ids: &HashSet<Uuid>) -> GateOutcome;
}

/// Negation markers used by the consistency gate's contradiction
/// heuristic — mirrors the one in `layers::meta`.
const NEGATION_MARKERS: [&str; 7] = ["not ", "no longer", "never", "isn't", "doesn't", "cannot", "won't"];

/// Hard failure gate: every item must trace back to at least one source
/// this project actually has on record.
pub struct GroundingGate;

impl Gate for GroundingGate {
    fn name(&self) -> GateName {
        GateName::Grounding
    }
    fn check(&self, items: &[VerifiableItem], known_source_ids: &HashSet<Uuid>) -> GateOutcome {
        let mut violations = Vec::new();
        let mut drop_ids = Vec::new();
        for item in items {
            let grounded = !item.source_ids.is_empty() && item.source_ids.iter().any(|s| known_source_ids.contains(s));
            if !grounded {
                violations.push(format!("{} cites no known source", item.id));
                drop_ids.push(item.id);
            }
        }
        GateOutcome { passed: drop_ids.is_empty(), violations, remediation: (!drop_ids.is_empty()).then(|| "dropped ungrounded items".into()), drop_ids }
    }
}

/// Confidence must clear the configured floor, or it gets remediated
/// rather than dropped — a low-confidence item may still be the best
/// answer available.
pub struct ConfidenceGate {
    pub min_confidence: f64,
}

impl Gate for ConfidenceGate {
    fn name(&self) -> GateName {
        GateName::Confidence
    }
    fn check(&self, items: &[VerifiableItem], _known_source_ids: &HashSet<Uuid>) -> GateOutcome {
        let below: Vec<&VerifiableItem> = items.iter().filter(|i| i.confidence < self.min_confidence).collect();
        let passed = below.is_empty();
        GateOutcome {
            passed,
            violations: below.iter().map(|i| format!("{} confidence {:.2} below floor {:.2}", i.id, i.confidence, self.min_confidence)).collect(),
            remediation: (!passed).then(|| "flag as low-confidence; request a corroborating source".into()),
            drop_ids: vec![],
        }
    }
}

/// No two surviving items may contradict each other: near-identical
/// content (cosine similarity) where exactly one side carries a negation
/// marker. The lower-scored item of each contradicting pair is dropped.
pub struct ConsistencyGate {
    pub contradiction_cosine_min: f32,
}

impl Gate for ConsistencyGate {
    fn name(&self) -> GateName {
        GateName::Consistency
    }
    fn check(&self, items: &[VerifiableItem], _known_source_ids: &HashSet<Uuid>) -> GateOutcome {
        let mut violations = Vec::new();
        let mut drop_ids = Vec::new();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let (a, b) = (&items[i], &items[j]);
                let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) else { continue };
                if cosine_similarity(ea, eb) < self.contradiction_cosine_min {
                    continue;
                }
                if contains_negation(&a.content) == contains_negation(&b.content) {
                    continue;
                }
                violations.push(format!("{} contradicts {}", a.id, b.id));
                let loser = if a.score <= b.score { a.id } else { b.id };
                drop_ids.push(loser);
            }
        }
        drop_ids.sort_unstable();
        drop_ids.dedup();
        GateOutcome {
            passed: violations.is_empty(),
            remediation: (!violations.is_empty()).then(|| "dropped the lower-scored side of each contradicting pair".into()),
            violations,
            drop_ids,
        }
    }
}

/// Hard failure gate: an item must be non-trivial content with an
/// embedding, or it cannot participate in retrieval scoring at all.
pub struct SoundnessGate;

impl Gate for SoundnessGate {
    fn name(&self) -> GateName {
        GateName::Soundness
    }
    fn check(&self, items: &[VerifiableItem], _known_source_ids: &HashSet<Uuid>) -> GateOutcome {
        let mut violations = Vec::new();
        let mut drop_ids = Vec::new();
        for item in items {
            if item.content.trim().len() < 8 {
                violations.push(format!("{} too short to be meaningful", item.id));
                drop_ids.push(item.id);
            } else if item.embedding.is_none() {
                violations.push(format!("{} missing embedding", item.id));
                drop_ids.push(item.id);
            }
        }
        GateOutcome { passed: drop_ids.is_empty(), remediation: (!drop_ids.is_empty()).then(|| "dropped unsound items".into()), violations, drop_ids }
    }
}

/// Rejects pairwise redundancy within the returned set: two items that
/// are near-identical (cosine >= threshold) *and* share a source are a
/// duplicate; the same content corroborated by two distinct sources is
/// not.
pub struct MinimalityGate {
    pub max_cosine_within_set: f64,
}

impl Gate for MinimalityGate {
    fn name(&self) -> GateName {
        GateName::Minimality
    }
    fn check(&self, items: &[VerifiableItem], _known_source_ids: &HashSet<Uuid>) -> GateOutcome {
        let mut violations = Vec::new();
        let mut drop_ids = Vec::new();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let (a, b) = (&items[i], &items[j]);
                let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) else { continue };
                let similarity = cosine_similarity(ea, eb) as f64;
                let shares_source = a.source_ids.iter().any(|s| b.source_ids.contains(s));
                if similarity >= self.max_cosine_within_set && shares_source {
                    violations.push(format!("{} is redundant with {}", a.id, b.id));
                    let loser = if a.score <= b.score { a.id } else { b.id };
                    drop_ids.push(loser);
                }
            }
        }
        drop_ids.sort_unstable();
        drop_ids.dedup();
        GateOutcome {
            passed: violations.is_empty(),
            remediation: (!violations.is_empty()).then(|| "dropped the lower-scored side of each redundant pair".into()),
            violations,
            drop_ids,
        }
    }
}

/// Returned order must match the scoring function: monotonic
/// non-increasing `score`. The gateway re-sorts as remediation rather
/// than dropping anything.
pub struct CoherenceGate;

impl Gate for CoherenceGate {
    fn name(&self) -> GateName {
        GateName::Coherence
    }
    fn check(&self, items: &[VerifiableItem], _known_source_ids: &HashSet<Uuid>) -> GateOutcome {
        let ordered = items.windows(2).all(|pair| pair[0].score >= pair[1].score);
        GateOutcome {
            passed: ordered,
            violations: if ordered { vec![] } else { vec!["result order does not match scoring function".into()] },
            remediation: (!ordered).then(|| "re-sorted by score descending".into()),
            drop_ids: vec![],
        }
    }
}

fn contains_negation(content: &str) -> bool {
    let lower = content.to_lowercase();
    NEGATION_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(content: &str, confidence: f64, score: f64, source: Option<Uuid>, embedding: Vec<f32>) -> VerifiableItem {
        VerifiableItem {
            id: Uuid::new_v4(),
            content: content.into(),
            confidence,
            source_ids: source.into_iter().collect(),
            embedding: Some(embedding),
            score,
        }
    }

    #[test]
    fn grounding_gate_drops_items_with_unknown_sources() {
        let known_source = Uuid::new_v4();
        let grounded = item("the deploy finished", 0.9, 0.9, Some(known_source), vec![1.0, 0.0]);
        let ungrounded = item("the deploy failed", 0.9, 0.8, Some(Uuid::new_v4()), vec![0.0, 1.0]);
        let known: HashSet<Uuid> = [known_source].into_iter().collect();

        let outcome = GroundingGate.check(&[grounded.clone(), ungrounded.clone()], &known);
        assert_eq!(outcome.drop_ids, vec![ungrounded.id]);
        assert!(!outcome.passed);
    }

    #[test]
    fn minimality_gate_drops_lower_scored_of_redundant_pair_with_shared_source() {
        let source = Uuid::new_v4();
        let high = item("the build is green", 0.9, 0.9, Some(source), vec![1.0, 0.0]);
        let low = item("the build is green", 0.9, 0.4, Some(source), vec![1.0, 0.0]);

        let gate = MinimalityGate { max_cosine_within_set: 0.98 };
        let outcome = gate.check(&[high.clone(), low.clone()], &HashSet::new());
        assert_eq!(outcome.drop_ids, vec![low.id]);
    }

    #[test]
    fn minimality_gate_keeps_corroborating_items_from_distinct_sources() {
        let high = item("the build is green", 0.9, 0.9, Some(Uuid::new_v4()), vec![1.0, 0.0]);
        let low = item("the build is green", 0.9, 0.4, Some(Uuid::new_v4()), vec![1.0, 0.0]);

        let gate = MinimalityGate { max_cosine_within_set: 0.98 };
        let outcome = gate.check(&[high, low], &HashSet::new());
        assert!(outcome.drop_ids.is_empty());
    }

    #[test]
    fn consistency_gate_drops_lower_scored_side_of_contradicting_pair() {
        let asserts = item("the service supports retries", 0.9, 0.9, None, vec![1.0, 0.0]);
        let negates = item("the service does not support retries", 0.9, 0.2, None, vec![1.0, 0.0]);

        let gate = ConsistencyGate { contradiction_cosine_min: 0.85 };
        let outcome = gate.check(&[asserts.clone(), negates.clone()], &HashSet::new());
        assert_eq!(outcome.drop_ids, vec![negates.id]);
    }

    #[test]
    fn coherence_gate_fails_on_out_of_order_scores() {
        let a = item("a", 0.9, 0.3, None, vec![1.0]);
        let b = item("b", 0.9, 0.9, None, vec![1.0]);
        let outcome = CoherenceGate.check(&[a, b], &HashSet::new());
        assert!(!outcome.passed);
    }
}
