//! Multi-factor confidence scoring
//!
//! Combines five weighted terms into one confidence score in `[0, 1]` per
//! §4.4: how semantically close the hit is to the query, how trustworthy
//! its source layer is, how recent it is, how consistent it is with other
//! retrieved memories, and how complete its content is. Only the five
//! top-level weights are configurable — `source_quality`'s per-layer
//! baselines and `recency`'s decay curve are fixed by the spec, not knobs.

use chrono::{DateTime, Utc};

pub const WEIGHT_SEMANTIC_RELEVANCE: f64 = 0.35;
pub const WEIGHT_SOURCE_QUALITY: f64 = 0.25;
pub const WEIGHT_RECENCY: f64 = 0.15;
pub const WEIGHT_CONSISTENCY: f64 = 0.15;
pub const WEIGHT_COMPLETENESS: f64 = 0.10;

/// Expected content length used to normalize `completeness_score`. Not
/// spec-mandated (the formula is `min(1, len/expected)`, not the constant
/// itself) — 200 chars is an engineering default logged in DESIGN.md.
pub const EXPECTED_CONTENT_LENGTH: usize = 200;

/// Static trust baseline per memory layer, keyed by storage namespace.
/// Unknown namespaces fall back to a conservative midpoint.
pub fn layer_baseline(namespace: &str) -> f64 {
    match namespace {
        "episodic" => 0.85,
        "semantic" => 0.80,
        "procedural" => 0.75,
        "graph_entity" | "graph_relation" => 0.70,
        "prospective" => 0.65,
        "meta" => 0.70,
        _ => 0.5,
    }
}

/// Inputs to the confidence score for a single retrieved item.
pub struct ConfidenceInputs<'a> {
    pub semantic_relevance: f64,
    pub source_layer: &'a str,
    pub occurred_at: DateTime<Utc>,
    pub consistency: f64,
    pub content_len_chars: usize,
}

/// Piecewise-linear recency decay through the fixed breakpoints
/// `(0, 1.0) -> (1 day, 0.95) -> (7 days, 0.30) -> (30 days, 0.0)`. Ages
/// beyond 30 days floor at 0; ages at or before 0 (clock skew, future
/// timestamps) cap at 1.0.
pub fn recency_score(occurred_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - occurred_at).num_milliseconds() as f64 / 86_400_000.0;
    if age_days <= 0.0 {
        return 1.0;
    }
    if age_days >= 30.0 {
        return 0.0;
    }

    const BREAKPOINTS: [(f64, f64); 4] = [(0.0, 1.0), (1.0, 0.95), (7.0, 0.30), (30.0, 0.0)];
    for window in BREAKPOINTS.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if age_days >= x0 && age_days <= x1 {
            let t = (age_days - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    0.0
}

/// `min(1, content_length / expected_length)` per §4.4.
fn completeness_score(content_len_chars: usize) -> f64 {
    (content_len_chars as f64 / EXPECTED_CONTENT_LENGTH as f64).min(1.0)
}

/// Compute the composite confidence score for one retrieved item.
pub fn confidence_score(inputs: &ConfidenceInputs, now: DateTime<Utc>) -> f64 {
    let recency = recency_score(inputs.occurred_at, now);
    let completeness = completeness_score(inputs.content_len_chars);
    let source_quality = layer_baseline(inputs.source_layer);

    let score = WEIGHT_SEMANTIC_RELEVANCE * inputs.semantic_relevance.clamp(0.0, 1.0)
        + WEIGHT_SOURCE_QUALITY * source_quality
        + WEIGHT_RECENCY * recency
        + WEIGHT_CONSISTENCY * inputs.consistency.clamp(0.0, 1.0)
        + WEIGHT_COMPLETENESS * completeness;

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn weights_sum_to_one() {
        let total = WEIGHT_SEMANTIC_RELEVANCE
            + WEIGHT_SOURCE_QUALITY
            + WEIGHT_RECENCY
            + WEIGHT_CONSISTENCY
            + WEIGHT_COMPLETENESS;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recency_hits_the_spec_breakpoints() {
        let now = Utc::now();
        assert!((recency_score(now, now) - 1.0).abs() < 1e-6);
        assert!((recency_score(now - Duration::days(1), now) - 0.95).abs() < 1e-6);
        assert!((recency_score(now - Duration::days(7), now) - 0.30).abs() < 1e-6);
        assert_eq!(recency_score(now - Duration::days(30), now), 0.0);
        assert_eq!(recency_score(now - Duration::days(90), now), 0.0);
    }

    #[test]
    fn layer_baselines_match_spec_constants() {
        assert_eq!(layer_baseline("episodic"), 0.85);
        assert_eq!(layer_baseline("semantic"), 0.80);
        assert_eq!(layer_baseline("procedural"), 0.75);
        assert_eq!(layer_baseline("graph_entity"), 0.70);
        assert_eq!(layer_baseline("prospective"), 0.65);
        assert_eq!(layer_baseline("meta"), 0.70);
    }

    #[test]
    fn fresh_high_quality_relevant_item_scores_highly() {
        let now = Utc::now();
        let inputs = ConfidenceInputs {
            semantic_relevance: 0.95,
            source_layer: "episodic",
            occurred_at: now,
            consistency: 0.9,
            content_len_chars: 500,
        };
        let score = confidence_score(&inputs, now);
        assert!(score > 0.85);
    }

    #[test]
    fn stale_low_quality_item_scores_poorly() {
        let now = Utc::now();
        let inputs = ConfidenceInputs {
            semantic_relevance: 0.1,
            source_layer: "prospective",
            occurred_at: now - Duration::days(365),
            consistency: 0.1,
            content_len_chars: 5,
        };
        let score = confidence_score(&inputs, now);
        assert!(score < 0.2);
    }
}
