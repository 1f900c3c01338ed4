//! Plumbing for work running on the background execution context.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use super::error::TransformError;
use crate::idling::IdlingGuard;

/// Join handle that aborts its task when dropped.
pub(crate) struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> AbortOnDrop<T> {
    pub(crate) fn new(handle: JoinHandle<T>) -> Self {
        Self(handle)
    }
}

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A transform sequence produced on the background context and consumed on
/// the container's pipeline.
///
/// The idling guard, if any, is shared with the producer task. It is released
/// once the sequence has ended (exhausted, failed or panicked), or after this
/// stream is dropped and the aborted producer has been torn down.
pub(crate) struct BackgroundFlow<T> {
    receiver: mpsc::Receiver<anyhow::Result<T>>,
    task: Option<AbortOnDrop<()>>,
    guard: Option<Arc<IdlingGuard>>,
}

impl<T: Send + 'static> BackgroundFlow<T> {
    pub(crate) fn spawn(
        sequence: BoxStream<'static, anyhow::Result<T>>,
        background: &Handle,
        guard: Option<Arc<IdlingGuard>>,
    ) -> Self {
        // Capacity 1 keeps the producer at most one element ahead.
        let (sender, receiver) = mpsc::channel(1);
        let held = guard.clone();
        let task = background.spawn(async move {
            let mut sequence = sequence;
            while let Some(item) = sequence.next().await {
                let failed = item.is_err();
                if sender.send(item).await.is_err() || failed {
                    break;
                }
            }
            // Release before closing the channel so the consumer never sees
            // the end of the sequence while the producer is still registered.
            drop(sequence);
            drop(held);
            drop(sender);
        });

        Self {
            receiver,
            task: Some(AbortOnDrop::new(task)),
            guard,
        }
    }
}

impl<T> BackgroundFlow<T> {
    fn finish(&mut self) {
        self.task = None;
        self.guard = None;
    }
}

impl<T> Stream for BackgroundFlow<T> {
    type Item = Result<T, TransformError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Err(err))) => {
                this.finish();
                return Poll::Ready(Some(Err(TransformError::Failed(err))));
            }
            Poll::Ready(None) => {}
            Poll::Pending => return Poll::Pending,
        }

        // Sender is gone: the producer either ran to completion or panicked.
        let Some(task) = this.task.as_mut() else {
            return Poll::Ready(None);
        };
        let outcome = ready!(Pin::new(task).poll(cx));
        this.finish();
        match outcome {
            Ok(()) => Poll::Ready(None),
            Err(err) => Poll::Ready(Some(Err(TransformError::from_join(err)))),
        }
    }
}
