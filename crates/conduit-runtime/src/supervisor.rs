//! Structured task supervision.
//!
//! ```text
//! Supervisor (platform)
//!   ├── child (connection A) ── receive loop, packet tasks
//!   └── child (connection B) ── receive loop, packet tasks
//! ```
//!
//! Cancelling a supervisor cancels every child below it. Children share
//! the root's task tracker, so [`Supervisor::shutdown`] on the root waits
//! for every task spawned anywhere in the tree.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancellation scope plus task tracking.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Supervisor {
    /// New root supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Nested scope. Cancelling `self` cancels the child; cancelling the
    /// child leaves `self` running.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            tracker: self.tracker.clone(),
        }
    }

    /// Spawns a tracked task.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Cancellation token of this scope.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels this scope and its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether this scope is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Number of live tracked tasks in the whole tree.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels the scope and waits for every tracked task to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
