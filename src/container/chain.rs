//! Intent syntax: operator chains and the simple handler scope.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream;
use futures::{FutureExt, Stream, StreamExt};

use super::Shared;
use crate::dispatcher::{ResultStream, TransformError};
use crate::mvi::{SideEffect, State};
use crate::operator::{Context, Operator};

/// A chain of operators applied to one submitted event.
///
/// Every step is routed through the container's dispatcher, so suspend and
/// flow steps run on the background context and register idling according
/// to the container settings.
///
/// ```ignore
/// container.orbit(query, |chain| {
///     chain
///         .transform_suspend(|ctx| async move { search(ctx.into_event()).await })
///         .reduce(|state, results| state.with_results(results.clone()))
///         .post_side_effect(|_, results| Toast::found(results.len()))
/// })?;
/// ```
pub struct Chain<S, SE, T> {
    host: Arc<Shared<S, SE>>,
    stream: ResultStream<T>,
}

impl<S, SE, T> Chain<S, SE, T>
where
    S: State,
    SE: SideEffect,
    T: Send + 'static,
{
    pub(crate) fn new(host: Arc<Shared<S, SE>>, event: T) -> Self {
        Self {
            host,
            stream: stream::once(async move { Ok(event) }).boxed(),
        }
    }

    /// Apply an arbitrary operator.
    pub fn apply<U>(self, operator: Operator<S, T, U>) -> Chain<S, SE, U>
    where
        U: Send + 'static,
    {
        tracing::trace!(
            container = %self.host.id,
            operator = operator.name(),
            register_idling = operator.registers_idling(),
            "Applying operator"
        );
        let snapshot = self.host.clone();
        let stream = self.host.dispatcher.apply(self.stream, operator, move |event| {
            Context::new(snapshot.emitter.current_state(), event)
        });
        Chain {
            host: self.host,
            stream,
        }
    }

    /// Synchronous transform (`Direct`).
    pub fn transform<U, F>(self, transform: F) -> Chain<S, SE, U>
    where
        U: Send + 'static,
        F: Fn(Context<S, T>) -> U + Send + Sync + 'static,
    {
        self.apply(Operator::direct(move |context| Ok(transform(context))))
    }

    /// Suspending transform run on the background context.
    pub fn transform_suspend<U, F, Fut>(self, transform: F) -> Chain<S, SE, U>
    where
        U: Send + 'static,
        F: Fn(Context<S, T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
    {
        let register = self.host.settings.register_idling;
        self.apply(Operator::transform_suspend(transform).register_idling(register))
    }

    /// Stream-producing transform; every value continues down the chain.
    pub fn transform_flow<U, F, St>(self, transform: F) -> Chain<S, SE, U>
    where
        U: Send + 'static,
        F: Fn(Context<S, T>) -> St + Send + Sync + 'static,
        St: Stream<Item = anyhow::Result<U>> + Send + 'static,
    {
        let register = self.host.settings.register_idling;
        self.apply(Operator::transform_flow(transform).register_idling(register))
    }

    /// Replace the state with a value built from the live state and the
    /// current event. The event passes through unchanged.
    pub fn reduce<F>(self, reducer: F) -> Self
    where
        F: Fn(&S, &T) -> S + Send + Sync + 'static,
    {
        let host = self.host.clone();
        self.apply(Operator::direct(move |context: Context<S, T>| {
            let event = context.into_event();
            host.emitter.reduce(|state| reducer(state, &event));
            Ok(event)
        }))
    }

    /// Emit a side effect built from the state snapshot and the current
    /// event. The event passes through unchanged.
    pub fn post_side_effect<F>(self, side_effect: F) -> Self
    where
        F: Fn(&S, &T) -> SE + Send + Sync + 'static,
    {
        let host = self.host.clone();
        self.apply(Operator::direct(move |context: Context<S, T>| {
            let (state, event) = context.into_parts();
            host.emitter.post_side_effect(side_effect(&state, &event));
            Ok(event)
        }))
    }

    /// Drain the chain; the first error stops it.
    pub(crate) fn into_work(self) -> BoxFuture<'static, Result<(), TransformError>> {
        let mut stream = self.stream;
        async move {
            while let Some(item) = stream.next().await {
                if let Err(err) = item {
                    return Err(err);
                }
            }
            Ok(())
        }
        .boxed()
    }
}

/// Handle given to simple intent handlers.
pub struct IntentScope<S, SE> {
    host: Arc<Shared<S, SE>>,
}

impl<S, SE> Clone for IntentScope<S, SE> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
        }
    }
}

impl<S: State, SE: SideEffect> IntentScope<S, SE> {
    pub(crate) fn new(host: Arc<Shared<S, SE>>) -> Self {
        Self { host }
    }

    /// Latest committed state.
    pub fn state(&self) -> S {
        self.host.emitter.current_state()
    }

    /// Atomically replace the state and emit it. Returns the new state.
    pub fn reduce<F>(&self, reducer: F) -> S
    where
        F: FnOnce(&S) -> S,
    {
        self.host.emitter.reduce(reducer)
    }

    pub fn post_side_effect(&self, side_effect: SE) {
        self.host.emitter.post_side_effect(side_effect);
    }
}
