//! Retrieval pipeline benchmarks
//!
//! Run with: cargo bench -p athena-core

use athena_core::retrieval::confidence::{confidence_score, ConfidenceInputs};
use athena_core::retrieval::expansion::{classify_intent, expand_query};
use athena_core::retrieval::fusion::reciprocal_rank_fusion;
use athena_core::storage::SearchHit;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uuid::Uuid;

fn bench_classify_intent(c: &mut Criterion) {
    let queries = [
        "what is a consolidation run",
        "how to ingest an episodic event",
        "why did the recall confidence drop",
        "when did the last session close",
        "deployment pipeline status",
    ];

    c.bench_function("classify_intent", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(classify_intent(q));
            }
        })
    });
}

fn bench_expand_query(c: &mut Criterion) {
    c.bench_function("expand_query", |b| {
        b.iter(|| {
            black_box(expand_query("what caused the nightly build to fail", 4));
        })
    });
}

fn bench_reciprocal_rank_fusion(c: &mut Criterion) {
    let vector: Vec<SearchHit> = (0..100)
        .map(|i| SearchHit { id: Uuid::new_v4(), namespace: "episodic", score: 1.0 / (i as f64 + 1.0), body: serde_json::json!({}) })
        .collect();
    let lexical: Vec<SearchHit> = (0..100)
        .map(|i| SearchHit { id: Uuid::new_v4(), namespace: "episodic", score: 1.0 / (i as f64 + 1.0), body: serde_json::json!({}) })
        .collect();

    c.bench_function("reciprocal_rank_fusion_100x100", |b| {
        b.iter(|| black_box(reciprocal_rank_fusion(&vector, &lexical)))
    });
}

fn bench_confidence_score(c: &mut Criterion) {
    let now = Utc::now();
    let inputs = ConfidenceInputs {
        semantic_relevance: 0.8,
        source_layer: "episodic",
        occurred_at: now,
        consistency: 0.7,
        content_len_chars: 240,
    };

    c.bench_function("confidence_score", |b| {
        b.iter(|| black_box(confidence_score(&inputs, now)))
    });
}

criterion_group!(benches, bench_classify_intent, bench_expand_query, bench_reciprocal_rank_fusion, bench_confidence_score);
criterion_main!(benches);
