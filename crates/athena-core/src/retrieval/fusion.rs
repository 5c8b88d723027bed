//! Reciprocal rank fusion
//!
//! Combines a vector-search ranking and a lexical-search ranking into one
//! ordering without needing the two scales to be comparable:
//! `score(d) = sum over rankings containing d of 1 / (k + rank(d))`.

use crate::storage::SearchHit;
use std::collections::HashMap;
use uuid::Uuid;

/// Fusion damping constant. Lower values weight top ranks more heavily;
/// 60 is the standard choice from the original RRF paper.
pub const RRF_K: f64 = 60.0;

/// A hit with its fused RRF score and the ranks it attained in each input
/// list it appeared in.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub id: Uuid,
    pub namespace: &'static str,
    pub body: serde_json::Value,
    pub rrf_score: f64,
    pub vector_rank: Option<usize>,
    pub lexical_rank: Option<usize>,
}

/// Fuse a vector-search ranking and a lexical-search ranking.
pub fn reciprocal_rank_fusion(vector: &[SearchHit], lexical: &[SearchHit]) -> Vec<FusedHit> {
    let mut fused: HashMap<Uuid, FusedHit> = HashMap::new();

    for (rank, hit) in vector.iter().enumerate() {
        let entry = fused.entry(hit.id).or_insert_with(|| FusedHit {
            id: hit.id,
            namespace: hit.namespace,
            body: hit.body.clone(),
            rrf_score: 0.0,
            vector_rank: None,
            lexical_rank: None,
        });
        entry.rrf_score += 1.0 / (RRF_K + rank as f64 + 1.0);
        entry.vector_rank = Some(rank);
    }

    for (rank, hit) in lexical.iter().enumerate() {
        let entry = fused.entry(hit.id).or_insert_with(|| FusedHit {
            id: hit.id,
            namespace: hit.namespace,
            body: hit.body.clone(),
            rrf_score: 0.0,
            vector_rank: None,
            lexical_rank: None,
        });
        entry.rrf_score += 1.0 / (RRF_K + rank as f64 + 1.0);
        entry.lexical_rank = Some(rank);
    }

    let mut out: Vec<FusedHit> = fused.into_values().collect();
    out.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: Uuid, score: f64) -> SearchHit {
        SearchHit { id, namespace: "episodic", score, body: json!({}) }
    }

    #[test]
    fn item_in_both_lists_outranks_item_in_one() {
        let shared = Uuid::new_v4();
        let vector_only = Uuid::new_v4();
        let lexical_only = Uuid::new_v4();

        let vector = vec![hit(shared, 0.9), hit(vector_only, 0.8)];
        let lexical = vec![hit(shared, 5.0), hit(lexical_only, 4.0)];

        let fused = reciprocal_rank_fusion(&vector, &lexical);
        assert_eq!(fused[0].id, shared);
        assert!(fused[0].rrf_score > fused[1].rrf_score);
    }

    #[test]
    fn empty_inputs_produce_empty_output() {
        assert!(reciprocal_rank_fusion(&[], &[]).is_empty());
    }

    #[test]
    fn fusion_is_order_independent_of_rank_list_position() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let vector = vec![hit(a, 1.0), hit(b, 0.5)];
        let lexical: Vec<SearchHit> = vec![];
        let fused = reciprocal_rank_fusion(&vector, &lexical);
        assert_eq!(fused[0].id, a);
        assert_eq!(fused[0].vector_rank, Some(0));
    }
}
