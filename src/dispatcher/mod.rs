//! Operator dispatch: runs an operator's transform against an event stream.
//!
//! # Strategies
//!
//! ```text
//! Direct            event ──→ transform (inline) ──→ result
//! TransformSuspend  event ──→ [idling+] background task ──→ result [idling-]
//! TransformFlow     event ──→ [idling+] background sequence ══→ results [idling-]
//! ```
//!
//! Results leave the dispatcher in input order. A suspend transform for
//! event N+1 starts only after event N produced its result, and a flow for
//! event N+1 starts only after the sequence for event N was fully drained.

mod background;
mod error;

use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::runtime::Handle;

use crate::idling::{self, IdlingRegistry};
use crate::operator::{Context, Operator};

pub(crate) use background::AbortOnDrop;
use background::BackgroundFlow;
pub use error::TransformError;

/// Stream of intermediate results flowing between operators.
pub type ResultStream<T> = BoxStream<'static, Result<T, TransformError>>;

/// Applies operators on behalf of one container.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<dyn IdlingRegistry>,
    background: Handle,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn IdlingRegistry>, background: Handle) -> Self {
        Self {
            registry,
            background,
        }
    }

    pub fn registry(&self) -> &Arc<dyn IdlingRegistry> {
        &self.registry
    }

    /// Apply `operator` to every event of `events`.
    ///
    /// `context_factory` binds each event to a fresh [`Context`]. Errors
    /// already present on `events` are forwarded untouched. Dropping the
    /// returned stream cancels any background work it started and releases
    /// its idling registrations.
    pub fn apply<S, E, T, F>(
        &self,
        events: ResultStream<E>,
        operator: Operator<S, E, T>,
        context_factory: F,
    ) -> ResultStream<T>
    where
        S: Send + 'static,
        E: Send + 'static,
        T: Send + 'static,
        F: Fn(E) -> Context<S, E> + Send + Sync + 'static,
    {
        let factory = Arc::new(context_factory);

        match operator {
            Operator::Direct { transform, .. } => events
                .map(move |item| -> Result<T, TransformError> {
                    let event = item?;
                    transform(factory(event)).map_err(TransformError::from)
                })
                .boxed(),

            Operator::TransformSuspend {
                register_idling,
                transform,
            } => {
                let registry = self.registry.clone();
                let background = self.background.clone();
                events
                    .then(move |item| {
                        let transform = transform.clone();
                        let factory = factory.clone();
                        let registry = registry.clone();
                        let background = background.clone();
                        async move {
                            let event = match item {
                                Ok(event) => event,
                                Err(err) => return Err(err),
                            };
                            // Shared with the task: an aborted transform stays
                            // registered until the runtime has actually dropped it.
                            let guard: Option<Arc<dyn Send + Sync>> = register_idling.then(|| Arc::new(idling::acquire(registry)) as Arc<dyn Send + Sync>);
                            let held = guard.clone();
                            let work = transform(factory(event));
                            tracing::trace!(operator = "transform_suspend", "Running transform");
                            let task = AbortOnDrop::new(background.spawn(async move {
                                let result = work.await;
                                drop(held);
                                result
                            }));
                            let outcome = task.await;
                            drop(guard);
                            match outcome {
                                Ok(result) => result.map_err(TransformError::from),
                                Err(err) => Err(TransformError::from_join(err)),
                            }
                        }
                    })
                    .boxed()
            }

            Operator::TransformFlow {
                register_idling,
                transform,
            } => {
                let registry = self.registry.clone();
                let background = self.background.clone();
                events
                    .map(move |item| -> ResultStream<T> {
                        match item {
                            Ok(event) => {
                                let guard = register_idling
                                    .then(|| Arc::new(idling::acquire(registry.clone())));
                                tracing::trace!(operator = "transform_flow", "Starting sequence");
                                let sequence = transform(factory(event));
                                BackgroundFlow::spawn(sequence, &background, guard).boxed()
                            }
                            Err(err) => stream::once(async move { Err(err) }).boxed(),
                        }
                    })
                    // Flatten pulls the next event only after the current
                    // sequence ended, which gives concatenation semantics.
                    .flatten()
                    .boxed()
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}
