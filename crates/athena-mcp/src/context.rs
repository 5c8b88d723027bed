//! Server context
//!
//! Everything a tool handler needs, built once at boot and shared behind
//! `Arc`s across every JSON-RPC request.

use std::sync::Arc;
use std::time::Duration;

use athena_core::collaborators::{
    CachingEmbeddingCollaborator, EmbeddingCollaborator, FakeEmbeddingCollaborator, FakeLlmCollaborator,
    HttpEmbeddingCollaborator, HttpLlmCollaborator, LlmCollaborator,
};
use athena_core::concurrency::ResourceLocks;
use athena_core::config::{Config, StorageBackendKind};
use athena_core::consolidation::ConsolidationPipeline;
use athena_core::error::{AthenaError, Result};
use athena_core::layers::{
    EpisodicStore, GraphStore, MetaStore, ProceduralStore, ProspectiveStore, SemanticStore, WorkingMemoryController,
};
use athena_core::observability::{HealthProbe, MetricsCollector};
use athena_core::pii::PiiPolicy;
use athena_core::retrieval::cascade::CascadingRecall;
use athena_core::retrieval::RetrievalEngine;
use athena_core::session::SessionManager;
use athena_core::storage::{SqliteBackend, StorageBackend};
use athena_core::verification::VerificationGateway;

#[derive(Clone)]
pub struct ServerContext {
    pub config: Config,
    pub backend: Arc<dyn StorageBackend>,
    pub embedder: Arc<dyn EmbeddingCollaborator>,
    pub embedding_cache: Arc<CachingEmbeddingCollaborator>,
    pub llm: Option<Arc<dyn LlmCollaborator>>,

    pub episodic: Arc<EpisodicStore>,
    pub semantic: Arc<SemanticStore>,
    pub procedural: Arc<ProceduralStore>,
    pub prospective: Arc<ProspectiveStore>,
    pub graph: Arc<GraphStore>,
    pub meta: Arc<MetaStore>,
    pub working_memory: Arc<WorkingMemoryController>,
    pub session: Arc<SessionManager>,

    pub retrieval: Arc<RetrievalEngine>,
    pub cascade: Arc<CascadingRecall>,
    pub consolidation: Arc<ConsolidationPipeline>,
    pub verification: Arc<VerificationGateway>,

    pub locks: Arc<ResourceLocks>,
    pub metrics: Arc<MetricsCollector>,
    pub health: Arc<HealthProbe>,
}

impl ServerContext {
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let backend: Arc<dyn StorageBackend> = match config.storage_backend {
            StorageBackendKind::Embedded => match &config.database_path {
                Some(path) => Arc::new(SqliteBackend::open(path)?),
                None => Arc::new(SqliteBackend::open_in_memory()?),
            },
            StorageBackendKind::Clustered => {
                #[cfg(feature = "clustered")]
                {
                    Arc::new(athena_core::storage::ClusteredBackend::connect(&config).await?)
                }
                #[cfg(not(feature = "clustered"))]
                {
                    return Err(AthenaError::InvalidArgument(
                        "storage_backend = clustered requires building with --features clustered".into(),
                    ));
                }
            }
        };

        let embedder: Arc<dyn EmbeddingCollaborator> = match &config.embedding_endpoint {
            Some(endpoint) => Arc::new(HttpEmbeddingCollaborator::new(
                endpoint.clone(),
                config.embedding_api_key.clone(),
                config.embedding_dim,
                Duration::from_millis(config.tool_timeout_ms_default),
            )?),
            // No remote embedding endpoint configured: fall back to the
            // deterministic in-process embedder so the server is still
            // usable for local development.
            None => Arc::new(FakeEmbeddingCollaborator::new(config.embedding_dim)),
        };
        let embedding_cache = Arc::new(CachingEmbeddingCollaborator::new(embedder, config.embedding_cache_capacity));
        let embedder: Arc<dyn EmbeddingCollaborator> = embedding_cache.clone();

        let llm: Option<Arc<dyn LlmCollaborator>> = if config.llm_enabled {
            match &config.llm_endpoint {
                Some(endpoint) => Some(Arc::new(HttpLlmCollaborator::new(
                    endpoint.clone(),
                    config.llm_api_key.clone(),
                    Duration::from_millis(config.tool_timeout_ms_default),
                )?)),
                None => Some(Arc::new(FakeLlmCollaborator)),
            }
        } else {
            None
        };

        let pii = PiiPolicy::from_profile(config.pii_policy_profile);

        let episodic = Arc::new(EpisodicStore::new(backend.clone(), embedder.clone(), pii));
        let semantic = Arc::new(SemanticStore::new(backend.clone()));
        let procedural = Arc::new(ProceduralStore::new(backend.clone()));
        let prospective = Arc::new(ProspectiveStore::new(backend.clone()));
        let graph = Arc::new(GraphStore::new(backend.clone()));
        let meta = Arc::new(MetaStore::new(backend.clone(), semantic.clone(), episodic.clone()));
        let working_memory = Arc::new(WorkingMemoryController::new(
            backend.clone(),
            semantic.clone(),
            procedural.clone(),
            prospective.clone(),
            config.working_memory_capacity,
        ));
        let session = Arc::new(SessionManager::new(backend.clone()));

        let retrieval = Arc::new(RetrievalEngine::new(backend.clone(), embedder.clone(), config.clone()));
        let cascade = Arc::new(CascadingRecall::new(retrieval.clone(), llm.clone(), &config));

        let consolidation_llm = llm.clone().unwrap_or_else(|| Arc::new(FakeLlmCollaborator));
        let consolidation = Arc::new(ConsolidationPipeline::new(
            backend.clone(),
            episodic.clone(),
            semantic.clone(),
            consolidation_llm,
        ));

        let verification = Arc::new(VerificationGateway::standard(
            config.verification_confidence_min,
            config.verification_minimality_cosine,
        ));

        let health = Arc::new(HealthProbe::new(backend.clone(), config.embedding_dim));

        Ok(Self {
            config,
            backend,
            embedder,
            embedding_cache,
            llm,
            episodic,
            semantic,
            procedural,
            prospective,
            graph,
            meta,
            working_memory,
            session,
            retrieval,
            cascade,
            consolidation,
            verification,
            locks: Arc::new(ResourceLocks::new()),
            metrics: Arc::new(MetricsCollector::new()),
            health,
        })
    }
}
