//! Session context manager
//!
//! Tracks the live agent sessions a project's working memory and recall
//! calls are scoped to. A background reaper (see [`crate::concurrency`])
//! closes sessions that have gone idle past a timeout.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{ProjectId, SessionContext};
use crate::storage::{Namespace, Record, ScanFilter, StorageBackend};

pub struct SessionManager {
    backend: Arc<dyn StorageBackend>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub async fn open(&self, project_id: ProjectId, label: Option<String>) -> Result<SessionContext> {
        let now = Utc::now();
        let session = SessionContext { id: Uuid::new_v4(), project_id, label, started_at: now, last_active_at: now, closed_at: None };
        self.put(&session).await?;
        Ok(session)
    }

    pub async fn touch(&self, project_id: ProjectId, id: Uuid) -> Result<Option<SessionContext>> {
        let Some(mut session) = self.get(project_id, id).await? else {
            return Ok(None);
        };
        session.last_active_at = Utc::now();
        self.put(&session).await?;
        Ok(Some(session))
    }

    pub async fn close(&self, project_id: ProjectId, id: Uuid) -> Result<Option<SessionContext>> {
        let Some(mut session) = self.get(project_id, id).await? else {
            return Ok(None);
        };
        session.closed_at = Some(Utc::now());
        self.put(&session).await?;
        Ok(Some(session))
    }

    pub async fn get(&self, project_id: ProjectId, id: Uuid) -> Result<Option<SessionContext>> {
        let record = self.backend.get(Namespace::Session.as_str(), project_id, id).await?;
        Ok(record.and_then(|r| serde_json::from_value(r.body).ok()))
    }

    /// Close every open session that has been idle longer than `idle_for`.
    pub async fn reap_idle(&self, project_id: ProjectId, idle_for: Duration) -> Result<usize> {
        let records = self.backend.scan(Namespace::Session.as_str(), project_id, ScanFilter { tag: None, limit: Some(10_000) }).await?;
        let now = Utc::now();
        let mut reaped = 0;
        for record in records {
            let Some(mut session) = serde_json::from_value::<SessionContext>(record.body).ok() else { continue };
            if session.closed_at.is_none() && now - session.last_active_at > idle_for {
                session.closed_at = Some(now);
                self.put(&session).await?;
                reaped += 1;
            }
        }
        Ok(reaped)
    }

    async fn put(&self, session: &SessionContext) -> Result<()> {
        let body = serde_json::to_value(session).unwrap_or(json!({}));
        self.backend
            .put(Record { id: session.id, project_id: session.project_id, namespace: Namespace::Session.as_str(), body, embedding: None, lexical_text: None })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteBackend;

    #[tokio::test]
    async fn closing_a_session_sets_closed_at() {
        let manager = SessionManager::new(Arc::new(SqliteBackend::open_in_memory().unwrap()));
        let project = Uuid::new_v4();
        let session = manager.open(project, Some("cli".into())).await.unwrap();
        let closed = manager.close(project, session.id).await.unwrap().unwrap();
        assert!(closed.closed_at.is_some());
    }

    #[tokio::test]
    async fn reap_idle_closes_only_stale_sessions() {
        let manager = SessionManager::new(Arc::new(SqliteBackend::open_in_memory().unwrap()));
        let project = Uuid::new_v4();
        let fresh = manager.open(project, None).await.unwrap();

        let reaped = manager.reap_idle(project, Duration::seconds(3600)).await.unwrap();
        assert_eq!(reaped, 0);

        let still_open = manager.get(project, fresh.id).await.unwrap().unwrap();
        assert!(still_open.closed_at.is_none());
    }
}
