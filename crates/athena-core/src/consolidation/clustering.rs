//! System 1: fast clustering
//!
//! Groups a batch of episodic events by embedding similarity with a
//! simple greedy threshold clusterer (no external clustering crate —
//! single-linkage over a small per-run batch is cheap enough to do by
//! hand). Each cluster becomes one candidate semantic memory.

use crate::model::EpisodicEvent;

const SIMILARITY_THRESHOLD: f32 = 0.82;

/// A group of events judged similar enough to consolidate into one
/// semantic memory.
pub struct EventCluster {
    pub events: Vec<EpisodicEvent>,
}

/// Greedily cluster events: each event joins the first existing cluster
/// whose centroid it is similar enough to, else starts a new one.
pub fn cluster_events(events: Vec<EpisodicEvent>) -> Vec<EventCluster> {
    let mut clusters: Vec<(Vec<f32>, EventCluster)> = Vec::new();

    for event in events {
        let Some(embedding) = event.embedding.clone() else {
            clusters.push((vec![], EventCluster { events: vec![event] }));
            continue;
        };

        let mut joined = false;
        for (centroid, cluster) in &mut clusters {
            if centroid.is_empty() {
                continue;
            }
            if cosine(&embedding, centroid) >= SIMILARITY_THRESHOLD {
                cluster.events.push(event.clone());
                *centroid = recompute_centroid(&cluster.events);
                joined = true;
                break;
            }
        }
        if !joined {
            clusters.push((embedding, EventCluster { events: vec![event] }));
        }
    }

    clusters.into_iter().map(|(_, c)| c).collect()
}

fn recompute_centroid(events: &[EpisodicEvent]) -> Vec<f32> {
    let dims = events.iter().find_map(|e| e.embedding.as_ref().map(|v| v.len())).unwrap_or(0);
    if dims == 0 {
        return vec![];
    }
    let mut centroid = vec![0.0f32; dims];
    let mut count = 0usize;
    for event in events {
        if let Some(embedding) = &event.embedding {
            for (acc, v) in centroid.iter_mut().zip(embedding) {
                *acc += v;
            }
            count += 1;
        }
    }
    if count > 0 {
        for v in &mut centroid {
            *v /= count as f32;
        }
    }
    centroid
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(embedding: Vec<f32>) -> EpisodicEvent {
        let now = Utc::now();
        EpisodicEvent {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            session_id: None,
            event_type: Default::default(),
            code_event_type: None,
            content: "x".into(),
            outcome: Default::default(),
            context: Default::default(),
            code: Default::default(),
            vc: Default::default(),
            metrics: Default::default(),
            test: Default::default(),
            quality: Default::default(),
            tags: vec![],
            content_hash: "h".into(),
            consolidation_status: Default::default(),
            consolidated_at: None,
            embedding: Some(embedding),
            occurred_at: now,
            created_at: now,
        }
    }

    #[test]
    fn near_identical_embeddings_cluster_together() {
        let events = vec![event(vec![1.0, 0.0]), event(vec![0.99, 0.01]), event(vec![0.0, 1.0])];
        let clusters = cluster_events(events);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn empty_batch_produces_no_clusters() {
        assert!(cluster_events(vec![]).is_empty());
    }
}
