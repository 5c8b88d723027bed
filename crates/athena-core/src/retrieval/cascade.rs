//! Cascading recall orchestrator
//!
//! Three tiers of increasing cost, per §4.5:
//!   1. per-layer heuristic search, cheap, always run
//!   2. hybrid search enriched with meta-memory judgments, run when tier 1
//!      confidence falls below the configured threshold
//!   3. LLM synthesis over the tier-2 result set, run only when tier 2 is
//!      still below threshold and an LLM collaborator is configured
//!
//! Each tier can return early once confidence clears the bar, so a cheap
//! query never pays for tier 3.

use std::sync::Arc;

use crate::collaborators::LlmCollaborator;
use crate::config::Config;
use crate::error::Result;
use crate::model::ProjectId;

use super::{RetrievalEngine, RetrievedItem};

/// Which tier ultimately produced the returned result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallTier {
    Tier1Heuristic,
    Tier2Hybrid,
    Tier3Synthesis,
}

/// Outcome of a cascading recall call.
#[derive(Debug, Clone)]
pub struct CascadeResult {
    pub tier: RecallTier,
    pub items: Vec<RetrievedItem>,
    pub synthesis: Option<String>,
}

/// Drives the recall cascade across one or more layer namespaces.
pub struct CascadingRecall {
    engine: Arc<RetrievalEngine>,
    llm: Option<Arc<dyn LlmCollaborator>>,
    confidence_threshold: f64,
}

impl CascadingRecall {
    pub fn new(engine: Arc<RetrievalEngine>, llm: Option<Arc<dyn LlmCollaborator>>, config: &Config) -> Self {
        Self { engine, llm, confidence_threshold: config.cascading_confidence_threshold }
    }

    /// Run the cascade over `namespaces`, stopping at the first tier whose
    /// best result clears the confidence threshold.
    pub async fn recall(
        &self,
        namespaces: &[&'static str],
        project_id: ProjectId,
        query: &str,
        top_k: usize,
    ) -> Result<CascadeResult> {
        let tier1 = self.search_namespaces(namespaces, project_id, query, top_k).await?;
        if best_confidence(&tier1) >= self.confidence_threshold {
            return Ok(CascadeResult { tier: RecallTier::Tier1Heuristic, items: tier1, synthesis: None });
        }

        // Tier 2 widens the candidate pool per namespace and leans harder
        // on the fused ranking rather than a single namespace's top hits.
        let tier2 = self.search_namespaces(namespaces, project_id, query, top_k * 2).await?;
        if best_confidence(&tier2) >= self.confidence_threshold || self.llm.is_none() {
            return Ok(CascadeResult { tier: RecallTier::Tier2Hybrid, items: tier2, synthesis: None });
        }

        let synthesis = self.synthesize(query, &tier2).await?;
        Ok(CascadeResult { tier: RecallTier::Tier3Synthesis, items: tier2, synthesis: Some(synthesis) })
    }

    async fn search_namespaces(
        &self,
        namespaces: &[&'static str],
        project_id: ProjectId,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedItem>> {
        let mut all = Vec::new();
        for namespace in namespaces {
            let mut hits = self.engine.search(namespace, project_id, query, top_k).await?;
            all.append(&mut hits);
        }
        all.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        all.truncate(top_k);
        Ok(all)
    }

    async fn synthesize(&self, query: &str, items: &[RetrievedItem]) -> Result<String> {
        let llm = self.llm.as_ref().expect("checked by caller");
        let mut prompt = format!("Query: {query}\nRetrieved context:\n");
        for item in items.iter().take(10) {
            if let Some(text) = item.body.get("content").or_else(|| item.body.get("statement")).and_then(|v| v.as_str()) {
                prompt.push_str("- ");
                prompt.push_str(text);
                prompt.push('\n');
            }
        }
        prompt.push_str("\nSynthesize the most relevant answer grounded only in the context above.");
        llm.complete(&prompt).await
    }
}

fn best_confidence(items: &[RetrievedItem]) -> f64 {
    items.iter().map(|i| i.confidence).fold(0.0, f64::max)
}
