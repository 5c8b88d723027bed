//! Clustered (Postgres) storage backend
//!
//! Same contract as [`super::SqliteBackend`], backed by a connection pool
//! instead of a single file. Vector search still runs as an in-database
//! brute-force scan (`<=>`-free — no pgvector extension assumed) ordered
//! by a SQL cosine-similarity expression; lexical search uses Postgres's
//! built-in `tsvector`/`tsquery` instead of FTS5.

use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AthenaError, Result};
use crate::model::ProjectId;

use super::{Record, ScanFilter, SearchHit, StorageBackend, WriteOp};

pub struct ClusteredBackend {
    pool: Pool,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    namespace    TEXT NOT NULL,
    project_id   UUID NOT NULL,
    id           UUID NOT NULL,
    body         JSONB NOT NULL,
    embedding    DOUBLE PRECISION[],
    lexical_text TEXT,
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (namespace, project_id, id)
);
CREATE INDEX IF NOT EXISTS idx_records_tsv ON records
    USING gin (to_tsvector('english', coalesce(lexical_text, '')));
"#;

impl ClusteredBackend {
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let mut pool_cfg = PoolConfig::new();
        pool_cfg.host = cfg.host.clone();
        pool_cfg.port = cfg.port;
        pool_cfg.dbname = cfg.database.clone();
        pool_cfg.user = cfg.user.clone();
        pool_cfg.password = cfg.password.clone();
        pool_cfg.pool = Some(deadpool_postgres::PoolConfig::new(cfg.pool_max as usize));

        let pool = pool_cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AthenaError::Unavailable(format!("postgres pool: {e}")))?;

        let client = pool
            .get()
            .await
            .map_err(|e| AthenaError::Unavailable(format!("postgres connect: {e}")))?;
        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| AthenaError::Unavailable(format!("postgres schema: {e}")))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StorageBackend for ClusteredBackend {
    async fn put(&self, record: Record) -> Result<()> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        client
            .execute(
                "INSERT INTO records (namespace, project_id, id, body, embedding, lexical_text, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, now())
                 ON CONFLICT (namespace, project_id, id) DO UPDATE SET
                    body = excluded.body, embedding = excluded.embedding,
                    lexical_text = excluded.lexical_text, updated_at = now()",
                &[
                    &record.namespace,
                    &record.project_id,
                    &record.id,
                    &record.body,
                    &record.embedding.map(|v| v.into_iter().map(|f| f as f64).collect::<Vec<_>>()),
                    &record.lexical_text,
                ],
            )
            .await
            .map_err(map_pg_err)?;
        Ok(())
    }

    async fn get(&self, namespace: &'static str, project_id: ProjectId, id: Uuid) -> Result<Option<Record>> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        let row = client
            .query_opt(
                "SELECT body, embedding, lexical_text FROM records WHERE namespace = $1 AND project_id = $2 AND id = $3",
                &[&namespace, &project_id, &id],
            )
            .await
            .map_err(map_pg_err)?;
        Ok(row.map(|r| row_to_record(namespace, project_id, id, r)))
    }

    async fn delete(&self, namespace: &'static str, project_id: ProjectId, id: Uuid) -> Result<bool> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        let affected = client
            .execute(
                "DELETE FROM records WHERE namespace = $1 AND project_id = $2 AND id = $3",
                &[&namespace, &project_id, &id],
            )
            .await
            .map_err(map_pg_err)?;
        Ok(affected > 0)
    }

    async fn scan(&self, namespace: &'static str, project_id: ProjectId, filter: ScanFilter) -> Result<Vec<Record>> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        let limit = filter.limit.unwrap_or(1000) as i64;
        let rows = client
            .query(
                "SELECT id, body, embedding, lexical_text FROM records
                 WHERE namespace = $1 AND project_id = $2
                 ORDER BY updated_at DESC LIMIT $3",
                &[&namespace, &project_id, &limit],
            )
            .await
            .map_err(map_pg_err)?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let id: Uuid = r.get("id");
                row_to_record(namespace, project_id, id, r)
            })
            .collect())
    }

    async fn vector_search(
        &self,
        namespace: &'static str,
        project_id: ProjectId,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        let rows = client
            .query(
                "SELECT id, body, embedding FROM records WHERE namespace = $1 AND project_id = $2 AND embedding IS NOT NULL",
                &[&namespace, &project_id],
            )
            .await
            .map_err(map_pg_err)?;

        let mut scored: Vec<SearchHit> = rows
            .into_iter()
            .filter_map(|r| {
                let embedding: Vec<f64> = r.get("embedding");
                let embedding_f32: Vec<f32> = embedding.into_iter().map(|v| v as f32).collect();
                let score = cosine(query, &embedding_f32);
                let id: Uuid = r.get("id");
                let body: serde_json::Value = r.get("body");
                Some(SearchHit { id, namespace, score, body })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn lexical_search(
        &self,
        namespace: &'static str,
        project_id: ProjectId,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        let rows = client
            .query(
                "SELECT id, body, ts_rank(to_tsvector('english', coalesce(lexical_text, '')), plainto_tsquery('english', $3)) AS rank
                 FROM records
                 WHERE namespace = $1 AND project_id = $2
                   AND to_tsvector('english', coalesce(lexical_text, '')) @@ plainto_tsquery('english', $3)
                 ORDER BY rank DESC LIMIT $4",
                &[&namespace, &project_id, &query, &(top_k as i64)],
            )
            .await
            .map_err(map_pg_err)?;
        Ok(rows
            .into_iter()
            .map(|r| SearchHit {
                id: r.get("id"),
                namespace,
                score: r.get::<_, f32>("rank") as f64,
                body: r.get("body"),
            })
            .collect())
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut client = self.pool.get().await.map_err(map_pool_err)?;
        let tx = client.transaction().await.map_err(map_pg_err)?;
        for op in ops {
            match op {
                WriteOp::Put(record) => {
                    tx.execute(
                        "INSERT INTO records (namespace, project_id, id, body, embedding, lexical_text, updated_at)
                         VALUES ($1, $2, $3, $4, $5, $6, now())
                         ON CONFLICT (namespace, project_id, id) DO UPDATE SET
                            body = excluded.body, embedding = excluded.embedding,
                            lexical_text = excluded.lexical_text, updated_at = now()",
                        &[
                            &record.namespace,
                            &record.project_id,
                            &record.id,
                            &record.body,
                            &record.embedding.map(|v| v.into_iter().map(|f| f as f64).collect::<Vec<_>>()),
                            &record.lexical_text,
                        ],
                    )
                    .await
                    .map_err(map_pg_err)?;
                }
                WriteOp::Delete { namespace, project_id, id } => {
                    tx.execute(
                        "DELETE FROM records WHERE namespace = $1 AND project_id = $2 AND id = $3",
                        &[&namespace, &project_id, &id],
                    )
                    .await
                    .map_err(map_pg_err)?;
                }
            }
        }
        tx.commit().await.map_err(map_pg_err)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        client.query_one("SELECT 1", &[]).await.map_err(map_pg_err)?;
        Ok(())
    }

    async fn list_project_ids(&self, namespace: &'static str) -> Result<Vec<ProjectId>> {
        let client = self.pool.get().await.map_err(map_pool_err)?;
        let rows = client
            .query("SELECT DISTINCT project_id FROM records WHERE namespace = $1", &[&namespace])
            .await
            .map_err(map_pg_err)?;
        Ok(rows.into_iter().map(|r| r.get("project_id")).collect())
    }
}

fn row_to_record(namespace: &'static str, project_id: ProjectId, id: Uuid, row: tokio_postgres::Row) -> Record {
    let embedding: Option<Vec<f64>> = row.try_get("embedding").ok();
    Record {
        id,
        project_id,
        namespace,
        body: row.get("body"),
        embedding: embedding.map(|v| v.into_iter().map(|f| f as f32).collect()),
        lexical_text: row.try_get("lexical_text").ok(),
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

fn map_pool_err(e: deadpool_postgres::PoolError) -> AthenaError {
    AthenaError::Unavailable(format!("postgres pool: {e}"))
}

fn map_pg_err(e: tokio_postgres::Error) -> AthenaError {
    AthenaError::Unavailable(format!("postgres: {e}"))
}
