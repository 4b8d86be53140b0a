//! TaskRegistry - Supervised Background Tasks
//!
//! Review jobs and maintenance loops are spawned here instead of as
//! detached tasks, so panics and errors surface in logs and shutdown can
//! cancel long-running loops and join outstanding work within a grace
//! period.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// TaskRegistry instance
pub struct TaskRegistry {
    tasks: Mutex<JoinSet<()>>,
    cancel: CancellationToken,
}

impl TaskRegistry {
    /// Create a new registry
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed by cancellable loops (scratch purge etc.)
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Spawn a supervised task. Also reaps any tasks that have already
    /// finished so the set does not grow without bound.
    pub async fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!(error = %e, "Background task panicked");
                }
            }
        }
        tasks.spawn(future);
    }

    /// Cancel loops, then join outstanding tasks within the grace period.
    /// Whatever is still running after the deadline is aborted; in-flight
    /// review jobs are best-effort by design.
    pub async fn shutdown(&self, grace: Duration) {
        self.cancel.cancel();

        let mut tasks = self.tasks.lock().await;
        let deadline = tokio::time::Instant::now() + grace;

        loop {
            let join = tokio::time::timeout_at(deadline, tasks.join_next());
            match join.await {
                Ok(Some(Err(e))) if e.is_panic() => {
                    tracing::error!(error = %e, "Background task panicked during shutdown");
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    let remaining = tasks.len();
                    tracing::warn!(remaining, "Aborting tasks still running at shutdown");
                    tasks.abort_all();
                    break;
                }
            }
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
