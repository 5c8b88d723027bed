//! External collaborators
//!
//! The memory core never runs inference locally. Embeddings and LLM
//! completions are both remote services reached over HTTP, modeled as
//! traits so tests can substitute deterministic fakes and the retrieval/
//! consolidation/verification pipelines stay decoupled from the wire
//! format of whichever provider is configured.

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{AthenaError, Result};

/// Produces embeddings for text. Implementations may batch internally;
/// callers should prefer `embed_batch` when embedding more than one text.
#[async_trait]
pub trait EmbeddingCollaborator: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = vec![text.to_string()];
        Ok(self.embed_batch(&batch).await?.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// Produces free-text completions for System 2 consolidation and the
/// cascading recall orchestrator's tier-3 synthesis step.
#[async_trait]
pub trait LlmCollaborator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP client for a remote embedding service.
pub struct HttpEmbeddingCollaborator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    dimension: usize,
}

impl HttpEmbeddingCollaborator {
    pub fn new(endpoint: String, api_key: Option<String>, dimension: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AthenaError::Internal(format!("http client: {e}")))?;
        Ok(Self { client, endpoint, api_key, dimension })
    }
}

#[async_trait]
impl EmbeddingCollaborator for HttpEmbeddingCollaborator {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut req = self.client.post(&self.endpoint).json(&EmbeddingRequest { input: texts });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AthenaError::EmbeddingUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AthenaError::EmbeddingUnavailable(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AthenaError::EmbeddingUnavailable(format!("malformed response: {e}")))?;

        for embedding in &parsed.embeddings {
            if embedding.len() != self.dimension {
                return Err(AthenaError::EmbeddingDimMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(parsed.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    completion: String,
}

/// HTTP client for a remote LLM completion service.
pub struct HttpLlmCollaborator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpLlmCollaborator {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AthenaError::Internal(format!("http client: {e}")))?;
        Ok(Self { client, endpoint, api_key })
    }
}

#[async_trait]
impl LlmCollaborator for HttpLlmCollaborator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut req = self.client.post(&self.endpoint).json(&CompletionRequest { prompt });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| AthenaError::LlmUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AthenaError::LlmUnavailable(format!("llm service returned {}", response.status())));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AthenaError::LlmUnavailable(format!("malformed response: {e}")))?;
        Ok(parsed.completion)
    }
}

/// Deterministic fake embedder for tests: hashes each word into a fixed
/// position so identical text always yields an identical vector and
/// retrieval ordering is reproducible without a live embedding service.
pub struct FakeEmbeddingCollaborator {
    dimension: usize,
}

impl FakeEmbeddingCollaborator {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingCollaborator for FakeEmbeddingCollaborator {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| deterministic_embedding(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn deterministic_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    for word in text.to_lowercase().split_whitespace() {
        let mut hash: u64 = 1469598103934665603;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        let slot = (hash as usize) % dimension;
        vector[slot] += 1.0;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Deterministic fake LLM: echoes a fixed, inspectable response derived
/// from the prompt so consolidation/verification tests can assert on
/// shape without a live LLM.
pub struct FakeLlmCollaborator;

#[async_trait]
impl LlmCollaborator for FakeLlmCollaborator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(format!("summary: {}", prompt.chars().take(80).collect::<String>()))
    }
}

/// Wraps an [`EmbeddingCollaborator`] with an LRU cache keyed on raw query
/// text. Scoped to one inner embedder at construction, so a change of
/// embedder or dimension means building a new cache rather than reusing a
/// stale one. Concurrent misses on the same text are coalesced: the first
/// caller computes the embedding, later callers for the same key await its
/// result instead of issuing redundant embedder calls.
pub struct CachingEmbeddingCollaborator {
    inner: Arc<dyn EmbeddingCollaborator>,
    entries: StdMutex<LruCache<String, Vec<f32>>>,
    inflight: StdMutex<HashMap<String, Arc<Notify>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingEmbeddingCollaborator {
    pub fn new(inner: Arc<dyn EmbeddingCollaborator>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner,
            entries: StdMutex::new(LruCache::new(capacity)),
            inflight: StdMutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups served from cache since construction. `0.0` when
    /// nothing has been embedded yet.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let misses = self.misses() as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }
}

#[async_trait]
impl EmbeddingCollaborator for CachingEmbeddingCollaborator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = text.to_string();

        loop {
            if let Some(cached) = self.entries.lock().expect("embedding cache poisoned").get(&key).cloned() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached);
            }

            let wait_on = {
                let mut inflight = self.inflight.lock().expect("embedding cache poisoned");
                match inflight.get(&key) {
                    Some(existing) => Some(existing.clone()),
                    None => {
                        inflight.insert(key.clone(), Arc::new(Notify::new()));
                        None
                    }
                }
            };

            if let Some(notify) = wait_on {
                notify.notified().await;
                continue;
            }

            self.misses.fetch_add(1, Ordering::Relaxed);
            let result = self.inner.embed(text).await;

            let notify = self.inflight.lock().expect("embedding cache poisoned").remove(&key);
            if let Ok(embedding) = &result {
                self.entries.lock().expect("embedding cache poisoned").put(key, embedding.clone());
            }
            if let Some(notify) = notify {
                notify.notify_waiters();
            }

            return result;
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_embedder_is_deterministic() {
        let embedder = FakeEmbeddingCollaborator::new(64);
        let a = embedder.embed("the build failed").await.unwrap();
        let b = embedder.embed("the build failed").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fake_embedder_distinguishes_different_text() {
        let embedder = FakeEmbeddingCollaborator::new(64);
        let a = embedder.embed("alpha").await.unwrap();
        let b = embedder.embed("omega gamma delta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn fake_llm_echoes_a_summary() {
        let llm = FakeLlmCollaborator;
        let out = llm.complete("hello world").await.unwrap();
        assert!(out.starts_with("summary:"));
    }

    #[tokio::test]
    async fn repeated_query_is_served_from_cache() {
        let inner: Arc<dyn EmbeddingCollaborator> = Arc::new(FakeEmbeddingCollaborator::new(32));
        let cache = CachingEmbeddingCollaborator::new(inner, 16);

        let a = cache.embed("the build failed").await.unwrap();
        let b = cache.embed("the build failed").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn distinct_queries_each_miss_once() {
        let inner: Arc<dyn EmbeddingCollaborator> = Arc::new(FakeEmbeddingCollaborator::new(32));
        let cache = CachingEmbeddingCollaborator::new(inner, 16);

        cache.embed("alpha").await.unwrap();
        cache.embed("beta").await.unwrap();

        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn concurrent_misses_on_the_same_key_coalesce() {
        let inner: Arc<dyn EmbeddingCollaborator> = Arc::new(FakeEmbeddingCollaborator::new(32));
        let cache = Arc::new(CachingEmbeddingCollaborator::new(inner, 16));

        let (a, b) = tokio::join!(cache.embed("concurrent query"), cache.embed("concurrent query"));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(cache.misses(), 1);
    }
}
