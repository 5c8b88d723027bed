//! Concurrency and scheduling
//!
//! A cooperative executor for background maintenance loops (working-memory
//! decay, scheduled consolidation, session reaping), all cancellable
//! through one shared token so a graceful shutdown stops every loop at
//! once rather than racing individual `JoinHandle::abort` calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Coordinates every background task's lifetime under one cancellation
/// token, so `shutdown` stops them all without hunting down handles
/// individually.
pub struct TaskExecutor {
    token: CancellationToken,
    handles: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self { token: CancellationToken::new(), handles: AsyncMutex::new(Vec::new()) }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a periodic background loop that runs `tick` every `interval`
    /// until cancelled.
    pub async fn spawn_periodic<F, Fut>(&self, interval: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => tick().await,
                }
            }
        });
        self.handles.lock().await.push(handle);
    }

    /// Cancel every background task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }
}

/// Per-`(project_id, resource_key)` mutex map, so mutating tool calls
/// against the same resource serialize while calls against different
/// resources (or different projects) proceed concurrently.
#[derive(Default)]
pub struct ResourceLocks {
    locks: AsyncMutex<HashMap<(Uuid, String), Arc<AsyncMutex<()>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, project_id: Uuid, resource_key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry((project_id, resource_key.to_string()))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn shutdown_stops_a_running_periodic_task() {
        let executor = TaskExecutor::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        executor
            .spawn_periodic(Duration::from_millis(5), move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        executor.shutdown().await;
        let after_shutdown = counter.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test]
    async fn resource_locks_are_scoped_per_key() {
        let locks = ResourceLocks::new();
        let project = Uuid::new_v4();
        let a = locks.lock_for(project, "task:1").await;
        let b = locks.lock_for(project, "task:2").await;
        assert!(!Arc::ptr_eq(&a, &b));

        let a_again = locks.lock_for(project, "task:1").await;
        assert!(Arc::ptr_eq(&a, &a_again));
    }
}
