//! The container's job queue and the task draining it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::error::ContainerError;
use super::ContainerId;
use crate::dispatcher::TransformError;
use crate::scope::Scope;

/// One submitted intent waiting for its turn.
pub(crate) struct Job {
    pub(crate) intent: u64,
    pub(crate) work: BoxFuture<'static, Result<(), TransformError>>,
    pub(crate) done: oneshot::Sender<Result<(), ContainerError>>,
}

/// Drain `jobs` until the queue closes or `scope` is cancelled.
///
/// With `concurrency == 1` every intent runs to completion before the next
/// one starts. Cancellation drops all queued and in-flight work.
pub(crate) async fn run(
    container: ContainerId,
    jobs: mpsc::UnboundedReceiver<Job>,
    scope: Scope,
    concurrency: usize,
    errors: broadcast::Sender<ContainerError>,
) {
    let jobs = stream::unfold(jobs, |mut jobs| async move {
        jobs.recv().await.map(|job| (job, jobs))
    });
    let drain = jobs.for_each_concurrent(concurrency, |job| run_job(container, job, &errors));

    tokio::select! {
        _ = scope.cancelled() => {
            tracing::debug!(%container, "Container scope cancelled, dropping in-flight intents");
        }
        _ = drain => {
            tracing::debug!(%container, "Container job queue closed");
        }
    }
}

async fn run_job(container: ContainerId, job: Job, errors: &broadcast::Sender<ContainerError>) {
    let Job { intent, work, done } = job;
    tracing::debug!(%container, intent, "Intent started");

    // Direct transforms run inline here; a panic must not take the worker down.
    let result = match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(TransformError::from_panic(payload)),
    };

    let outcome = match result {
        Ok(()) => {
            tracing::debug!(%container, intent, "Intent completed");
            Ok(())
        }
        Err(err) => {
            let err = ContainerError::Transform {
                intent,
                source: Arc::new(err),
            };
            tracing::warn!(%container, intent, error = %err, "Intent failed");
            let _ = errors.send(err.clone());
            Err(err)
        }
    };

    if done.send(outcome).is_err() {
        tracing::trace!(%container, intent, "Intent outcome dropped (handle gone)");
    }
}
