//! State container: current state, emitted items and intent routing.
//!
//! # Architecture
//!
//! ```text
//! intent()/orbit()/dispatch()
//!        │
//!        ▼
//!   job queue ──→ worker ──→ Chain ──→ Dispatcher ──→ transforms
//!                                                          │
//!                          reduce / post_side_effect ◄─────┘
//!                                   │
//!                                   ▼
//!                        Emitter ──→ items() / side_effects() / state_changes()
//! ```
//!
//! Intents leave the queue in submission order. With the default
//! concurrency of one, each intent finishes before the next starts, so
//! intents issued by one sequential caller emit their items in call order.

mod chain;
mod emitter;
mod error;
mod item;
mod worker;

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::config::ContainerSettings;
use crate::dispatcher::{Dispatcher, TransformError};
use crate::idling::{CountingIdlingRegistry, IdlingRegistry};
use crate::mvi::{Reducer, SideEffect, State};
use crate::scope::Scope;

pub use chain::{Chain, IntentScope};
use emitter::{broadcast_stream, Emitter};
pub use error::ContainerError;
pub use item::Item;
use worker::Job;

/// Unique identifier of a container, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(Uuid);

impl ContainerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct Shared<S, SE> {
    pub(crate) id: ContainerId,
    pub(crate) emitter: Emitter<S, SE>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) settings: ContainerSettings,
    initial_state: S,
    registry: Arc<dyn IdlingRegistry>,
    scope: Scope,
    jobs: mpsc::UnboundedSender<Job>,
    errors: broadcast::Sender<ContainerError>,
    next_intent: AtomicU64,
}

/// Handle to a running container. Cloning shares the same container.
pub struct Container<S, SE> {
    shared: Arc<Shared<S, SE>>,
}

impl<S, SE> Clone for Container<S, SE> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Types exposing a container, e.g. view models owning one.
pub trait ContainerHost {
    type State: State;
    type SideEffect: SideEffect;

    fn container(&self) -> &Container<Self::State, Self::SideEffect>;
}

impl<S: State, SE: SideEffect> ContainerHost for Container<S, SE> {
    type State = S;
    type SideEffect = SE;

    fn container(&self) -> &Container<S, SE> {
        self
    }
}

/// Builder for containers with non-default settings or registry.
pub struct ContainerBuilder<S, SE> {
    initial_state: S,
    settings: ContainerSettings,
    registry: Option<Arc<dyn IdlingRegistry>>,
    side_effect: PhantomData<fn() -> SE>,
}

impl<S: State, SE: SideEffect> ContainerBuilder<S, SE> {
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            settings: ContainerSettings::default(),
            registry: None,
            side_effect: PhantomData,
        }
    }

    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Registry tracking in-flight work. Defaults to a fresh
    /// [`CountingIdlingRegistry`] per container.
    pub fn idling_registry(mut self, registry: Arc<dyn IdlingRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Create the container and start its worker on `scope`.
    pub fn build(self, scope: &Scope) -> Container<S, SE> {
        let id = ContainerId::new();
        let registry: Arc<dyn IdlingRegistry> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(CountingIdlingRegistry::new()),
        };
        let dispatcher = Dispatcher::new(registry.clone(), scope.background().clone());
        let emitter = Emitter::new(self.initial_state.clone(), &self.settings);
        let (jobs, receiver) = mpsc::unbounded_channel();
        let (errors, _) = broadcast::channel(self.settings.error_buffer_size.max(1));

        scope.handle().spawn(worker::run(
            id,
            receiver,
            scope.clone(),
            self.settings.intent_concurrency.max(1),
            errors.clone(),
        ));
        tracing::debug!(
            container = %id,
            initial_state = ?self.initial_state,
            "Container created"
        );

        Container {
            shared: Arc::new(Shared {
                id,
                emitter,
                dispatcher,
                settings: self.settings,
                initial_state: self.initial_state,
                registry,
                scope: scope.clone(),
                jobs,
                errors,
                next_intent: AtomicU64::new(0),
            }),
        }
    }
}

impl<S: State, SE: SideEffect> Container<S, SE> {
    /// Create a container with default settings.
    pub fn new(initial_state: S, scope: &Scope) -> Self {
        ContainerBuilder::new(initial_state).build(scope)
    }

    pub fn builder(initial_state: S) -> ContainerBuilder<S, SE> {
        ContainerBuilder::new(initial_state)
    }

    pub fn id(&self) -> ContainerId {
        self.shared.id
    }

    /// State the container was created with.
    pub fn initial_state(&self) -> &S {
        &self.shared.initial_state
    }

    /// Latest committed state.
    pub fn current_state(&self) -> S {
        self.shared.emitter.current_state()
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.shared.settings
    }

    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    pub fn idling_registry(&self) -> Arc<dyn IdlingRegistry> {
        self.shared.registry.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.scope.is_cancelled()
    }

    /// Combined item stream: the current state, then every later state and
    /// side effect in emission order. Side effects are never replayed.
    pub fn items(&self) -> BoxStream<'static, Item<S, SE>> {
        self.shared.emitter.subscribe_items()
    }

    /// Side effects only. Side effects posted while no subscriber was
    /// attached are delivered to the next subscriber, up to
    /// `side_effect_buffer_size`.
    pub fn side_effects(&self) -> BoxStream<'static, SE> {
        self.shared.emitter.subscribe_side_effects()
    }

    /// Distinct states, starting with the current one.
    pub fn state_changes(&self) -> BoxStream<'static, S> {
        self.shared.emitter.subscribe_states()
    }

    /// Failures of intents submitted after subscribing.
    pub fn errors(&self) -> BoxStream<'static, ContainerError> {
        broadcast_stream(self.shared.errors.subscribe()).boxed()
    }

    /// Submit a simple intent.
    ///
    /// The handler runs as a suspending transform on the background context
    /// and may reduce the state and post side effects through its
    /// [`IntentScope`] any number of times.
    pub fn intent<F, Fut>(&self, handler: F) -> Result<IntentHandle, ContainerError>
    where
        F: FnOnce(IntentScope<S, SE>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let scope = IntentScope::new(self.shared.clone());
        self.orbit(handler, move |chain| {
            chain.transform_suspend(move |context| {
                let handler = context.into_event();
                handler(scope.clone())
            })
        })
    }

    /// Submit `event` through an operator chain built by `build`.
    pub fn orbit<E, T, F>(&self, event: E, build: F) -> Result<IntentHandle, ContainerError>
    where
        E: Send + 'static,
        T: Send + 'static,
        F: FnOnce(Chain<S, SE, E>) -> Chain<S, SE, T>,
    {
        self.ensure_open()?;
        let chain = build(Chain::new(self.shared.clone(), event));
        self.enqueue(chain.into_work())
    }

    /// Submit a pure reducer step.
    pub fn dispatch<R>(&self, intent: R::Intent) -> Result<IntentHandle, ContainerError>
    where
        R: Reducer<State = S> + 'static,
    {
        self.orbit(intent, |chain| {
            chain.reduce(|state, intent| R::reduce(state.clone(), intent))
        })
    }

    fn ensure_open(&self) -> Result<(), ContainerError> {
        if self.shared.scope.is_cancelled() {
            return Err(ContainerError::Closed {
                container: self.shared.id,
            });
        }
        Ok(())
    }

    fn enqueue(
        &self,
        work: futures::future::BoxFuture<'static, Result<(), TransformError>>,
    ) -> Result<IntentHandle, ContainerError> {
        let intent = self.shared.next_intent.fetch_add(1, Ordering::SeqCst);
        let (done, outcome) = oneshot::channel();

        self.shared
            .jobs
            .send(Job { intent, work, done })
            .map_err(|_| ContainerError::Closed {
                container: self.shared.id,
            })?;
        tracing::trace!(container = %self.shared.id, intent, "Intent queued");

        Ok(IntentHandle { intent, outcome })
    }
}

impl<S: fmt::Debug, SE> fmt::Debug for Container<S, SE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.shared.id)
            .field("initial_state", &self.shared.initial_state)
            .finish()
    }
}

/// Outcome of one submitted intent.
#[derive(Debug)]
pub struct IntentHandle {
    intent: u64,
    outcome: oneshot::Receiver<Result<(), ContainerError>>,
}

impl IntentHandle {
    /// Sequence number of the intent within its container.
    pub fn id(&self) -> u64 {
        self.intent
    }

    /// Wait until the intent has run.
    ///
    /// # Errors
    /// Returns the intent's transform failure, or
    /// [`ContainerError::Cancelled`] when the container was torn down first.
    pub async fn join(self) -> Result<(), ContainerError> {
        let intent = self.intent;
        self.outcome
            .await
            .unwrap_or(Err(ContainerError::Cancelled { intent }))
    }
}
