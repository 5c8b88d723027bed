//! Configuration
//!
//! Resolved env > file > built-in defaults, per §6. Every recognized
//! option is a field here; unknown env variables are ignored (we only
//! look up the names we know).

use crate::error::{AthenaError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend family selected at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Embedded,
    Clustered,
}

/// Default consolidation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsolidationStrategy {
    Speed,
    #[default]
    Balanced,
    Quality,
}

/// PII redaction aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PiiPolicyProfile {
    Permissive,
    #[default]
    Balanced,
    Strict,
}

/// Fully resolved runtime configuration for the memory core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    pub storage_backend: StorageBackendKind,
    pub database_path: Option<PathBuf>,

    // Clustered-backend connection parameters (ignored for `embedded`).
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub pool_min: u32,
    pub pool_max: u32,

    pub embedding_dim: usize,
    pub embedding_cache_capacity: usize,
    pub working_memory_capacity: usize,
    pub consolidation_strategy_default: ConsolidationStrategy,
    pub query_expansion_enabled: bool,
    pub query_expansion_variants: usize,
    pub cascading_confidence_threshold: f64,

    pub verification_grounding_required: bool,
    pub verification_confidence_min: f64,
    pub verification_minimality_cosine: f64,

    pub tool_timeout_ms_default: u64,

    pub llm_enabled: bool,
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,

    pub embedding_endpoint: Option<String>,
    pub embedding_api_key: Option<String>,

    pub pii_policy_profile: PiiPolicyProfile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackendKind::Embedded,
            database_path: None,
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            pool_min: 2,
            pool_max: 10,
            embedding_dim: 768,
            embedding_cache_capacity: 4096,
            working_memory_capacity: 7,
            consolidation_strategy_default: ConsolidationStrategy::Balanced,
            query_expansion_enabled: false,
            query_expansion_variants: 4,
            cascading_confidence_threshold: 0.6,
            verification_grounding_required: true,
            verification_confidence_min: 0.6,
            verification_minimality_cosine: 0.98,
            tool_timeout_ms_default: 5000,
            llm_enabled: false,
            llm_endpoint: None,
            llm_api_key: None,
            embedding_endpoint: None,
            embedding_api_key: None,
            pii_policy_profile: PiiPolicyProfile::Balanced,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then overlay recognized environment
    /// variables, then validate. Matches the precedence in §6: env > file >
    /// built-in defaults.
    pub fn load(file_path: Option<&std::path::Path>) -> Result<Self> {
        let mut cfg = match file_path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| AthenaError::InvalidArgument(format!("config file: {e}")))?;
                toml::from_str(&text)
                    .map_err(|e| AthenaError::InvalidArgument(format!("config file: {e}")))?
            }
            _ => Config::default(),
        };

        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("ATHENA_STORAGE_BACKEND") {
            self.storage_backend = match v.as_str() {
                "embedded" => StorageBackendKind::Embedded,
                "clustered" => StorageBackendKind::Clustered,
                other => {
                    return Err(AthenaError::InvalidArgument(format!(
                        "storage_backend: unrecognized value '{other}'"
                    )))
                }
            };
        }
        if let Ok(v) = std::env::var("ATHENA_EMBEDDING_DIM") {
            self.embedding_dim = v
                .parse()
                .map_err(|_| AthenaError::InvalidArgument("embedding_dim: not an integer".into()))?;
        }
        if let Ok(v) = std::env::var("ATHENA_WORKING_MEMORY_CAPACITY") {
            self.working_memory_capacity = v.parse().map_err(|_| {
                AthenaError::InvalidArgument("working_memory_capacity: not an integer".into())
            })?;
        }
        if let Ok(v) = std::env::var("ATHENA_QUERY_EXPANSION_ENABLED") {
            self.query_expansion_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("ATHENA_LLM_ENABLED") {
            self.llm_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("ATHENA_LLM_ENDPOINT") {
            self.llm_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("ATHENA_EMBEDDING_ENDPOINT") {
            self.embedding_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("ATHENA_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(AthenaError::InvalidArgument(
                "embedding_dim must be > 0".into(),
            ));
        }
        if self.working_memory_capacity == 0 {
            return Err(AthenaError::InvalidArgument(
                "working_memory_capacity must be > 0".into(),
            ));
        }
        if self.embedding_cache_capacity == 0 {
            return Err(AthenaError::InvalidArgument(
                "embedding_cache_capacity must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cascading_confidence_threshold) {
            return Err(AthenaError::InvalidArgument(
                "cascading_confidence_threshold must be within [0, 1]".into(),
            ));
        }
        if self.storage_backend == StorageBackendKind::Clustered && self.host.is_none() {
            return Err(AthenaError::InvalidArgument(
                "host is required when storage_backend = clustered".into(),
            ));
        }
        if self.pool_min > self.pool_max {
            return Err(AthenaError::InvalidArgument(
                "pool_min must be <= pool_max".into(),
            ));
        }
        Ok(())
    }

    /// Default platform-specific data directory, used when `database_path`
    /// is unset.
    pub fn default_data_dir() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "athena", "memory") {
            return proj_dirs.data_dir().to_path_buf();
        }
        PathBuf::from(".athena")
    }
}
