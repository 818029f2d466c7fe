//! Detached task runner.
//!
//! Work handed to `TaskRunner::spawn` outlives the request that scheduled it.
//! Nobody awaits the outcome; failures are logged. Outstanding tasks are
//! counted so shutdown can wait for pending cache writes.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
pub struct TaskRunner {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: AtomicUsize,
    idle: Notify,
}

/// Decrements the pending count even if the task panics.
struct PendingGuard(Arc<Inner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` in the background. An `Err` is logged with `name`.
    pub fn spawn<F>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard(self.inner.clone());

        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = fut.await {
                tracing::warn!(task = name, error = %format!("{:#}", e), "Background task failed");
            }
        })
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Wait until no tasks are pending. Returns `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let idle = self.inner.idle.notified();
                if self.pending() == 0 {
                    return;
                }
                idle.await;
            }
        };

        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_is_contained() {
        let runner = TaskRunner::new();
        let handle = runner.spawn("failing", async { anyhow::bail!("store refused") });
        // the task itself completes normally
        handle.await.unwrap();
        assert_eq!(runner.pending(), 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_pending_work() {
        let runner = TaskRunner::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = done.clone();
            runner.spawn("sleepy", async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        assert!(runner.drain(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(runner.pending(), 0);
    }

    #[tokio::test]
    async fn test_drain_times_out() {
        let runner = TaskRunner::new();
        runner.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        assert!(!runner.drain(Duration::from_millis(20)).await);
        assert_eq!(runner.pending(), 1);
    }
}
