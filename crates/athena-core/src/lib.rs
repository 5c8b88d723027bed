//! # Athena Core
//!
//! A persistent, multi-layer memory substrate for AI agents: episodic
//! events, consolidated semantic facts, learned procedures, prospective
//! tasks, an entity/relation graph, meta-memory judgments, a bounded
//! working-memory buffer, and session context, all backed by a single
//! storage contract and retrieved through a hybrid vector+lexical engine
//! with cascading, confidence-scored recall.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use athena_core::storage::SqliteBackend;
//! use athena_core::collaborators::FakeEmbeddingCollaborator;
//! use athena_core::layers::EpisodicStore;
//! use athena_core::pii::PiiPolicy;
//! use std::sync::Arc;
//!
//! let backend = Arc::new(SqliteBackend::open_in_memory()?);
//! let embedder = Arc::new(FakeEmbeddingCollaborator::new(768));
//! let episodic = EpisodicStore::new(backend, embedder, PiiPolicy::balanced());
//! ```
//!
//! ## Feature flags
//!
//! - `bundled-sqlite` (default): vendor and statically link SQLite
//! - `encryption`: swap the embedded backend to SQLCipher
//! - `clustered`: enable the networked Postgres-backed storage backend

pub mod collaborators;
pub mod concurrency;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod hash;
pub mod layers;
pub mod model;
pub mod observability;
pub mod pii;
pub mod retrieval;
pub mod session;
pub mod storage;
pub mod verification;

pub use error::{AthenaError, Result};
