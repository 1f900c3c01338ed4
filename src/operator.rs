//! Operator descriptors: how an event is turned into results.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

/// Synchronous transform run inline on the container's pipeline.
pub type DirectFn<S, E, T> = Arc<dyn Fn(Context<S, E>) -> anyhow::Result<T> + Send + Sync>;

/// Transform producing a single result on the background context.
pub type SuspendFn<S, E, T> =
    Arc<dyn Fn(Context<S, E>) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Transform producing an ordered sequence of results on the background context.
pub type FlowFn<S, E, T> =
    Arc<dyn Fn(Context<S, E>) -> BoxStream<'static, anyhow::Result<T>> + Send + Sync>;

/// Execution context bound to one event.
///
/// Carries the container state as it was when the event reached the
/// operator. Reductions never write through it; they read the live state
/// under the container lock instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Context<S, E> {
    state: S,
    event: E,
}

impl<S, E> Context<S, E> {
    pub fn new(state: S, event: E) -> Self {
        Self { state, event }
    }

    /// State snapshot taken when the context was created.
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn into_event(self) -> E {
        self.event
    }

    pub fn into_parts(self) -> (S, E) {
        (self.state, self.event)
    }
}

/// How the dispatcher executes a transform against the event stream.
///
/// The set of strategies is closed; the dispatcher matches on it
/// exhaustively.
pub enum Operator<S, E, T> {
    /// Pure synchronous transform, executed inline per event.
    ///
    /// `register_idling` is carried for symmetry but never acted upon.
    Direct {
        register_idling: bool,
        transform: DirectFn<S, E, T>,
    },
    /// One suspending unit of work per event, yielding a single result.
    TransformSuspend {
        register_idling: bool,
        transform: SuspendFn<S, E, T>,
    },
    /// A lazy sequence of results per event, drained in order.
    TransformFlow {
        register_idling: bool,
        transform: FlowFn<S, E, T>,
    },
}

impl<S, E, T> Operator<S, E, T>
where
    S: Send + 'static,
    E: Send + 'static,
    T: Send + 'static,
{
    pub fn direct<F>(transform: F) -> Self
    where
        F: Fn(Context<S, E>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Operator::Direct {
            register_idling: false,
            transform: Arc::new(transform),
        }
    }

    /// Suspending transform. Registers with the idling registry by default.
    pub fn transform_suspend<F, Fut>(transform: F) -> Self
    where
        F: Fn(Context<S, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Operator::TransformSuspend {
            register_idling: true,
            transform: Arc::new(move |context| transform(context).boxed()),
        }
    }

    /// Stream-producing transform. Registers with the idling registry by default.
    pub fn transform_flow<F, St>(transform: F) -> Self
    where
        F: Fn(Context<S, E>) -> St + Send + Sync + 'static,
        St: Stream<Item = anyhow::Result<T>> + Send + 'static,
    {
        Operator::TransformFlow {
            register_idling: true,
            transform: Arc::new(move |context| transform(context).boxed()),
        }
    }
}

impl<S, E, T> Operator<S, E, T> {
    /// Override whether the operator registers its work as in flight.
    pub fn register_idling(self, register: bool) -> Self {
        match self {
            Operator::Direct { transform, .. } => Operator::Direct {
                register_idling: register,
                transform,
            },
            Operator::TransformSuspend { transform, .. } => Operator::TransformSuspend {
                register_idling: register,
                transform,
            },
            Operator::TransformFlow { transform, .. } => Operator::TransformFlow {
                register_idling: register,
                transform,
            },
        }
    }

    pub fn registers_idling(&self) -> bool {
        match self {
            Operator::Direct {
                register_idling, ..
            }
            | Operator::TransformSuspend {
                register_idling, ..
            }
            | Operator::TransformFlow {
                register_idling, ..
            } => *register_idling,
        }
    }

    /// Short name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Direct { .. } => "direct",
            Operator::TransformSuspend { .. } => "transform_suspend",
            Operator::TransformFlow { .. } => "transform_flow",
        }
    }
}

impl<S, E, T> fmt::Debug for Operator<S, E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("kind", &self.name())
            .field("register_idling", &self.registers_idling())
            .finish()
    }
}
