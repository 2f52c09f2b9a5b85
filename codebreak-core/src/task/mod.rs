//! Tracked background work with cooperative cancellation.
//!
//! Every task spawned through a [`TaskPool`] races against the pool's
//! [`CancellationToken`]; [`TaskPool::shutdown`] cancels the token and
//! joins every task, so nothing outlives its owner.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct TaskPool {
    tasks: JoinSet<()>,
    token: CancellationToken,
    next_id: u64,
}

impl TaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool whose tasks also stop when `token` (or its parent) is cancelled.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token,
            next_id: 0,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Spawn a task with an async function. Returns the task's id.
    pub fn spawn<Fut>(&mut self, name: &'static str, fut: Fut) -> u64
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        let token = self.token.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!(task = name, id, "task cancelled"),
                _ = fut => debug!(task = name, id, "task finished"),
            }
        });
        id
    }

    /// Number of tasks not yet reaped.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Collect tasks that already finished without waiting.
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "task failed");
            }
        }
    }

    /// Cancel every task and wait for all of them to exit.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_cancels_pending_tasks() {
        let mut pool = TaskPool::new();
        let finished = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let finished = finished.clone();
            pool.spawn("sleeper", async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(pool.len(), 3);

        pool.shutdown().await;
        assert!(pool.is_empty());
        assert!(pool.token().is_cancelled());
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reap_collects_finished_tasks() {
        let mut pool = TaskPool::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let first = pool.spawn("quick", async move {
            let _ = tx.send(());
        });
        let second = pool.spawn("quick", async {});
        assert_ne!(first, second);

        rx.await.unwrap();
        tokio::task::yield_now().await;
        while !pool.is_empty() {
            pool.reap();
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn parent_token_cancels_children() {
        let parent = CancellationToken::new();
        let mut pool = TaskPool::with_token(parent.child_token());
        pool.spawn("sleeper", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        parent.cancel();
        assert!(pool.token().is_cancelled());
        pool.shutdown().await;
        assert!(pool.is_empty());
    }
}
