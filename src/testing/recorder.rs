//! Records a container's items in arrival order.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::dispatcher::AbortOnDrop;
use crate::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    /// Items may still arrive.
    Collecting,
    /// The source ended or its scope was cancelled. Only already recorded
    /// items remain.
    Exhausted,
}

/// Result of waiting on the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// At least one unconsumed item is available.
    Pending,
    Exhausted,
    TimedOut,
}

struct Recorded<I> {
    items: VecDeque<I>,
    phase: RecorderPhase,
}

struct RecorderShared<I> {
    inner: Mutex<Recorded<I>>,
    arrived: Notify,
}

impl<I> RecorderShared<I> {
    fn push(&self, item: I) {
        self.inner.lock().items.push_back(item);
        self.arrived.notify_waiters();
    }

    fn exhaust(&self) {
        self.inner.lock().phase = RecorderPhase::Exhausted;
        self.arrived.notify_waiters();
    }
}

/// FIFO buffer fed by a background task subscribed to an item stream.
///
/// Waiting never blocks the runtime, only the calling task, and every wait
/// is bounded by a deadline. Cancelling the scope exhausts the recorder so
/// pending waits fail promptly.
pub struct ItemRecorder<I> {
    shared: Arc<RecorderShared<I>>,
    task: Mutex<Option<AbortOnDrop<()>>>,
}

impl<I: Send + 'static> ItemRecorder<I> {
    /// Start recording `items` on `scope`'s runtime.
    pub fn start<St>(items: St, scope: &Scope) -> Self
    where
        St: Stream<Item = I> + Send + 'static,
    {
        let shared = Arc::new(RecorderShared {
            inner: Mutex::new(Recorded {
                items: VecDeque::new(),
                phase: RecorderPhase::Collecting,
            }),
            arrived: Notify::new(),
        });

        let task = {
            let shared = shared.clone();
            let scope = scope.clone();
            let handle = scope.handle().clone();
            handle.spawn(async move {
                let mut items = Box::pin(items);
                loop {
                    tokio::select! {
                        biased;
                        _ = scope.cancelled() => break,
                        item = items.next() => match item {
                            Some(item) => shared.push(item),
                            None => break,
                        },
                    }
                }
                tracing::trace!("Item recorder exhausted");
                shared.exhaust();
            })
        };

        Self {
            shared,
            task: Mutex::new(Some(AbortOnDrop::new(task))),
        }
    }

    /// Wait until an item is pending, the recorder is exhausted, or
    /// `deadline` passes. Already pending items win over exhaustion.
    pub async fn await_arrival(&self, deadline: Instant) -> Arrival {
        loop {
            let notified = self.shared.arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let inner = self.shared.inner.lock();
                if !inner.items.is_empty() {
                    return Arrival::Pending;
                }
                if inner.phase == RecorderPhase::Exhausted {
                    return Arrival::Exhausted;
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Arrival::TimedOut;
            }
        }
    }

    /// Dequeue the oldest unconsumed item.
    pub fn pop(&self) -> Option<I> {
        self.shared.inner.lock().items.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.shared.inner.lock().items.len()
    }

    pub fn phase(&self) -> RecorderPhase {
        self.shared.inner.lock().phase
    }

    /// Stop recording and discard everything not yet consumed.
    pub fn cancel(&self) {
        drop(self.task.lock().take());
        let mut inner = self.shared.inner.lock();
        inner.items.clear();
        inner.phase = RecorderPhase::Exhausted;
        drop(inner);
        self.shared.arrived.notify_waiters();
    }
}

impl<I: Clone> ItemRecorder<I> {
    /// Oldest unconsumed item, left in place.
    pub fn peek(&self) -> Option<I> {
        self.shared.inner.lock().items.front().cloned()
    }
}
