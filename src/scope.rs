//! Backing scope of a container: where it runs and when it stops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Notify;

/// Execution scope shared by a container and everything attached to it.
///
/// The scope owns two runtime handles: one for the container's own worker
/// and one for background transform work. Cancelling the scope tears down
/// every container created from it.
#[derive(Clone)]
pub struct Scope {
    handle: Handle,
    background: Handle,
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Scope {
    /// Create a scope running both the worker and background work on `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            background: handle.clone(),
            handle,
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a scope on the runtime the caller is running in.
    ///
    /// # Errors
    /// Fails when called outside of a tokio runtime.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    /// Run background transforms on a different runtime.
    pub fn with_background(mut self, background: Handle) -> Self {
        self.background = background;
        self
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Execution context for `TransformSuspend` and `TransformFlow` work.
    pub fn background(&self) -> &Handle {
        &self.background
    }

    /// Tear the scope down.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("Scope cancelled");
            self.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        // Subscribe to Notify BEFORE checking the flag: cancel() could fire
        // between the check and the await, and notify_waiters() would have no
        // subscribers, losing the notification.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_resolves_for_waiters() {
        let scope = Scope::current().expect("inside runtime");
        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .expect("waiter task");
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_after_cancel() {
        let scope = Scope::current().expect("inside runtime");
        scope.cancel();
        scope.cancel();
        tokio::time::timeout(Duration::from_millis(100), scope.cancelled())
            .await
            .expect("already cancelled");
    }

    #[test]
    fn current_fails_outside_runtime() {
        assert!(Scope::current().is_err());
    }
}
