//! Embedded SQLite storage backend
//!
//! A single mutex-guarded connection and a brute-force cosine-similarity
//! scan over BLOB-encoded embeddings, alongside an FTS5 lexical index.
//! Adequate up to a few hundred thousand vectors per project; the
//! `clustered` backend exists for anything past that.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{AthenaError, Result};
use crate::model::ProjectId;

use super::migrations::MIGRATIONS;
use super::{Record, ScanFilter, SearchHit, StorageBackend, WriteOp};

pub struct SqliteBackend {
    // A single mutex-guarded connection. SQLite only allows one writer at
    // a time anyway, and sharing it for reads avoids running two separate
    // databases under `:memory:`.
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AthenaError::Internal(format!("create data dir: {e}")))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        for stmt in MIGRATIONS {
            conn.execute_batch(stmt)?;
        }
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        for stmt in MIGRATIONS {
            conn.execute_batch(stmt)?;
        }
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn put_locked(conn: &Connection, record: &Record) -> Result<()> {
        let embedding_bytes = record.embedding.as_ref().map(encode_embedding);
        conn.execute(
            "INSERT INTO records (namespace, project_id, id, body, embedding, lexical_text, tag, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(namespace, project_id, id) DO UPDATE SET
                body = excluded.body,
                embedding = excluded.embedding,
                lexical_text = excluded.lexical_text,
                tag = excluded.tag,
                updated_at = excluded.updated_at",
            params![
                record.namespace,
                record.project_id.to_string(),
                record.id.to_string(),
                record.body.to_string(),
                embedding_bytes,
                record.lexical_text,
                record.body.get("tag").and_then(|v| v.as_str()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_locked(conn: &Connection, namespace: &'static str, project_id: ProjectId, id: Uuid) -> Result<bool> {
        let affected = conn.execute(
            "DELETE FROM records WHERE namespace = ?1 AND project_id = ?2 AND id = ?3",
            params![namespace, project_id.to_string(), id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn encode_embedding(vector: &Vec<f32>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
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

/// Strips FTS5 operator characters a caller-supplied query could use to
/// break out of a simple MATCH clause.
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(|term| format!("\"{term}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Record> {
    let namespace: String = row.get("namespace")?;
    let project_id: String = row.get("project_id")?;
    let id: String = row.get("id")?;
    let body: String = row.get("body")?;
    let embedding: Option<Vec<u8>> = row.get("embedding")?;
    let lexical_text: Option<String> = row.get("lexical_text")?;

    Ok(Record {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        namespace: leak_namespace(&namespace),
        body: serde_json::from_str(&body).unwrap_or(serde_json::Value::Null),
        embedding: embedding.map(|b| decode_embedding(&b)),
        lexical_text,
    })
}

/// Namespace strings are always one of the static constants defined in
/// `Namespace::as_str`; interning here lets `Record` hold `&'static str`
/// without a lifetime tied to the row.
fn leak_namespace(namespace: &str) -> &'static str {
    match namespace {
        "episodic" => "episodic",
        "semantic" => "semantic",
        "procedural" => "procedural",
        "prospective" => "prospective",
        "graph_entity" => "graph_entity",
        "graph_relation" => "graph_relation",
        "meta" => "meta",
        "working_memory" => "working_memory",
        "session" => "session",
        "consolidation" => "consolidation",
        _ => "unknown",
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn put(&self, record: Record) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        Self::put_locked(&conn, &record)
    }

    async fn get(&self, namespace: &'static str, project_id: ProjectId, id: Uuid) -> Result<Option<Record>> {
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        let result = conn
            .query_row(
                "SELECT namespace, project_id, id, body, embedding, lexical_text FROM records
                 WHERE namespace = ?1 AND project_id = ?2 AND id = ?3",
                params![namespace, project_id.to_string(), id.to_string()],
                row_to_record,
            )
            .optional()?;
        Ok(result)
    }

    async fn delete(&self, namespace: &'static str, project_id: ProjectId, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        Self::delete_locked(&conn, namespace, project_id, id)
    }

    async fn scan(&self, namespace: &'static str, project_id: ProjectId, filter: ScanFilter) -> Result<Vec<Record>> {
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        let limit = filter.limit.unwrap_or(1000) as i64;

        let mut stmt = if filter.tag.is_some() {
            conn.prepare(
                "SELECT namespace, project_id, id, body, embedding, lexical_text FROM records
                 WHERE namespace = ?1 AND project_id = ?2 AND tag = ?3
                 ORDER BY updated_at DESC LIMIT ?4",
            )?
        } else {
            conn.prepare(
                "SELECT namespace, project_id, id, body, embedding, lexical_text FROM records
                 WHERE namespace = ?1 AND project_id = ?2
                 ORDER BY updated_at DESC LIMIT ?3",
            )?
        };

        let rows = if let Some(tag) = &filter.tag {
            stmt.query_map(params![namespace, project_id.to_string(), tag, limit], row_to_record)?
        } else {
            stmt.query_map(params![namespace, project_id.to_string(), limit], row_to_record)?
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn vector_search(
        &self,
        namespace: &'static str,
        project_id: ProjectId,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        let mut stmt = conn.prepare(
            "SELECT namespace, project_id, id, body, embedding, lexical_text FROM records
             WHERE namespace = ?1 AND project_id = ?2 AND embedding IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![namespace, project_id.to_string()], row_to_record)?;

        let mut scored: Vec<SearchHit> = Vec::new();
        for row in rows {
            let record = row?;
            if let Some(embedding) = &record.embedding {
                let score = cosine_similarity(query, embedding);
                scored.push(SearchHit { id: record.id, namespace: record.namespace, score, body: record.body });
            }
        }
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
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        let mut stmt = conn.prepare(
            "SELECT r.namespace, r.project_id, r.id, r.body, r.embedding, r.lexical_text, bm25(records_fts) AS rank
             FROM records_fts
             JOIN records r ON r.rowid = records_fts.rowid
             WHERE records_fts MATCH ?1 AND r.namespace = ?2 AND r.project_id = ?3
             ORDER BY rank LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            params![sanitized, namespace, project_id.to_string(), top_k as i64],
            |row| {
                let record = row_to_record(row)?;
                let rank: f64 = row.get("rank")?;
                Ok((record, rank))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            let (record, rank) = row?;
            // bm25() in sqlite's fts5 returns lower-is-better; invert for
            // consistency with vector_search's higher-is-better scale.
            out.push(SearchHit { id: record.id, namespace: record.namespace, score: -rank, body: record.body });
        }
        Ok(out)
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        let tx = conn.transaction()?;
        for op in ops {
            match op {
                WriteOp::Put(record) => Self::put_locked(&tx, &record)?,
                WriteOp::Delete { namespace, project_id, id } => {
                    Self::delete_locked(&tx, namespace, project_id, id)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        let exists: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='records'",
            [],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(AthenaError::Corruption("records table missing".into()));
        }
        Ok(())
    }

    async fn list_project_ids(&self, namespace: &'static str) -> Result<Vec<ProjectId>> {
        let conn = self.conn.lock().map_err(|_| AthenaError::Internal("connection lock poisoned".into()))?;
        let mut stmt = conn.prepare("SELECT DISTINCT project_id FROM records WHERE namespace = ?1")?;
        let rows = stmt.query_map(params![namespace], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            if let Ok(id) = Uuid::parse_str(&row?) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Namespace;
    use serde_json::json;

    fn sample_record(project_id: ProjectId, text: &str, embedding: Vec<f32>) -> Record {
        Record {
            id: Uuid::new_v4(),
            project_id,
            namespace: Namespace::Episodic.as_str(),
            body: json!({ "content": text }),
            embedding: Some(embedding),
            lexical_text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let project = Uuid::new_v4();
        let record = sample_record(project, "the build failed", vec![1.0, 0.0, 0.0]);
        let id = record.id;
        backend.put(record).await.unwrap();

        let fetched = backend.get(Namespace::Episodic.as_str(), project, id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().id, id);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let project = Uuid::new_v4();
        let record = sample_record(project, "ephemeral note", vec![0.0, 1.0, 0.0]);
        let id = record.id;
        backend.put(record).await.unwrap();

        let removed = backend.delete(Namespace::Episodic.as_str(), project, id).await.unwrap();
        assert!(removed);
        assert!(backend.get(Namespace::Episodic.as_str(), project, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine_similarity() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let project = Uuid::new_v4();
        backend.put(sample_record(project, "exact match", vec![1.0, 0.0, 0.0])).await.unwrap();
        backend.put(sample_record(project, "orthogonal", vec![0.0, 1.0, 0.0])).await.unwrap();

        let hits = backend
            .vector_search(Namespace::Episodic.as_str(), project, &[1.0, 0.0, 0.0], 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn lexical_search_finds_matching_terms() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let project = Uuid::new_v4();
        backend.put(sample_record(project, "deployment pipeline failed overnight", vec![1.0])).await.unwrap();
        backend.put(sample_record(project, "unrelated note about lunch", vec![0.0])).await.unwrap();

        let hits = backend
            .lexical_search(Namespace::Episodic.as_str(), project, "pipeline", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_failure_is_atomic_for_success_case() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let project = Uuid::new_v4();
        let a = sample_record(project, "a", vec![1.0]);
        let b = sample_record(project, "b", vec![1.0]);
        let (id_a, id_b) = (a.id, b.id);

        backend.transaction(vec![WriteOp::Put(a), WriteOp::Put(b)]).await.unwrap();

        assert!(backend.get(Namespace::Episodic.as_str(), project, id_a).await.unwrap().is_some());
        assert!(backend.get(Namespace::Episodic.as_str(), project, id_b).await.unwrap().is_some());
    }

    #[test]
    fn fts5_sanitization_quotes_terms_and_drops_operators() {
        let sanitized = sanitize_fts5_query("pipeline* OR DROP TABLE");
        assert!(!sanitized.contains('*'));
        assert!(sanitized.contains("\"pipeline\""));
    }
}
