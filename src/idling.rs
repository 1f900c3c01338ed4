//! Idling instrumentation for in-flight asynchronous work.
//!
//! A registry counts units of work that are still running on the background
//! context. It is advisory: nothing waits on it except code that wants to
//! know when a container has settled (typically tests).

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scopeguard::ScopeGuard;
use thiserror::Error;
use tokio::sync::Notify;

/// A decrement was issued without a matching increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Idling registry imbalance: decrement with {count} units in flight")]
pub struct RegistryImbalance {
    /// Counter value observed when the decrement was refused.
    pub count: i64,
}

/// Counter of outstanding asynchronous units of work.
///
/// Implementations must be safe under concurrent calls from many intents.
pub trait IdlingRegistry: Send + Sync + fmt::Debug {
    /// Record that a unit of work started.
    fn increment(&self);

    /// Record that a unit of work finished.
    ///
    /// # Errors
    /// Returns [`RegistryImbalance`] when no unit is in flight. The counter is
    /// left unchanged in that case.
    fn decrement(&self) -> Result<(), RegistryImbalance>;
}

/// Registry that ignores every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIdlingRegistry;

impl IdlingRegistry for NoopIdlingRegistry {
    fn increment(&self) {}

    fn decrement(&self) -> Result<(), RegistryImbalance> {
        Ok(())
    }
}

/// Atomic in-flight counter with settle notification.
#[derive(Debug, Default)]
pub struct CountingIdlingRegistry {
    count: AtomicI64,
    idle: Notify,
}

impl CountingIdlingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units currently in flight.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }

    /// Wait until no unit is in flight.
    ///
    /// Returns `false` if work was still outstanding after `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                // Register interest before checking, otherwise a decrement
                // between the check and the await would be missed.
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.is_idle() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl IdlingRegistry for CountingIdlingRegistry {
    fn increment(&self) {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(count, "Idling registry incremented");
    }

    fn decrement(&self) -> Result<(), RegistryImbalance> {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count > 0).then(|| count - 1)
            })
            .map_err(|count| RegistryImbalance { count })?;

        tracing::trace!(count = previous - 1, "Idling registry decremented");
        if previous == 1 {
            self.idle.notify_waiters();
        }
        Ok(())
    }
}

/// Holds one increment and releases it exactly once when dropped.
pub type IdlingGuard = ScopeGuard<Arc<dyn IdlingRegistry>, fn(Arc<dyn IdlingRegistry>)>;

/// Increment `registry` and return a guard that decrements it on drop.
///
/// Dropping covers every exit path of the owning unit of work: normal
/// completion, an error result, and cancellation of the future or stream
/// holding the guard.
pub fn acquire(registry: Arc<dyn IdlingRegistry>) -> IdlingGuard {
    registry.increment();
    scopeguard::guard(registry, release as fn(Arc<dyn IdlingRegistry>))
}

fn release(registry: Arc<dyn IdlingRegistry>) {
    if let Err(err) = registry.decrement() {
        tracing::error!(error = %err, "Idling guard released without matching increment");
    }
}
