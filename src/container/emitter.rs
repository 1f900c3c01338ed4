//! State storage and emission channels of a container.
//!
//! Every emission happens while the state lock is held, so the order seen by
//! each subscriber is the order in which reductions and side effects were
//! committed. Item and side-effect subscribers each own an unbounded queue:
//! nothing is dropped for a subscriber that falls behind.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};

use super::item::Item;
use crate::config::ContainerSettings;
use crate::mvi::{SideEffect, State};

pub(crate) struct Emitter<S, SE> {
    inner: Mutex<EmitterState<S, SE>>,
    states: watch::Sender<S>,
    side_effect_capacity: usize,
}

struct EmitterState<S, SE> {
    state: S,
    items: Vec<mpsc::UnboundedSender<Item<S, SE>>>,
    side_effects: Vec<mpsc::UnboundedSender<SE>>,
    /// Side effects posted while nobody listened to `side_effects`.
    pending: VecDeque<SE>,
}

impl<S: State, SE: SideEffect> Emitter<S, SE> {
    pub(crate) fn new(initial: S, settings: &ContainerSettings) -> Self {
        let (states, _) = watch::channel(initial.clone());

        Self {
            inner: Mutex::new(EmitterState {
                state: initial,
                items: Vec::new(),
                side_effects: Vec::new(),
                pending: VecDeque::new(),
            }),
            states,
            side_effect_capacity: settings.side_effect_buffer_size.max(1),
        }
    }

    pub(crate) fn current_state(&self) -> S {
        self.inner.lock().state.clone()
    }

    /// Atomic read-modify-write of the state.
    ///
    /// `reducer` runs under the state lock and must not call back into the
    /// same container.
    pub(crate) fn reduce<F>(&self, reducer: F) -> S
    where
        F: FnOnce(&S) -> S,
    {
        let mut inner = self.inner.lock();
        let next = reducer(&inner.state);
        inner.state = next.clone();
        self.states.send_replace(next.clone());
        fan_out(&mut inner.items, &Item::State(next.clone()));
        tracing::trace!(state = ?next, "State reduced");
        next
    }

    pub(crate) fn post_side_effect(&self, side_effect: SE) {
        let mut inner = self.inner.lock();
        fan_out(&mut inner.items, &Item::SideEffect(side_effect.clone()));

        if fan_out(&mut inner.side_effects, &side_effect) > 0 {
            return;
        }

        if inner.pending.len() == self.side_effect_capacity {
            inner.pending.pop_front();
            tracing::warn!(
                capacity = self.side_effect_capacity,
                "Side effect buffer full with no subscriber, dropping oldest"
            );
        }
        inner.pending.push_back(side_effect);
    }

    /// Combined stream: the current state first, then every later item.
    pub(crate) fn subscribe_items(&self) -> BoxStream<'static, Item<S, SE>> {
        let mut inner = self.inner.lock();
        let (sender, receiver) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is still in hand.
        let _ = sender.send(Item::State(inner.state.clone()));
        inner.items.push(sender);
        drop(inner);

        receiver_stream(receiver).boxed()
    }

    /// Side effects only. The first subscriber also drains the backlog
    /// buffered while nobody was listening.
    pub(crate) fn subscribe_side_effects(&self) -> BoxStream<'static, SE> {
        let mut inner = self.inner.lock();
        let (sender, receiver) = mpsc::unbounded_channel();
        let backlog = inner.pending.len();
        for side_effect in inner.pending.drain(..) {
            let _ = sender.send(side_effect);
        }
        inner.side_effects.push(sender);
        drop(inner);

        if backlog > 0 {
            tracing::debug!(count = backlog, "Delivering buffered side effects");
        }
        receiver_stream(receiver).boxed()
    }

    /// Distinct states: the current one first, then each change.
    ///
    /// Intermediate states may be skipped when the subscriber is slower than
    /// the reductions.
    pub(crate) fn subscribe_states(&self) -> BoxStream<'static, S> {
        let receiver = self.states.subscribe();
        stream::unfold((receiver, true), |(mut receiver, first)| async move {
            if !first && receiver.changed().await.is_err() {
                return None;
            }
            let state = receiver.borrow_and_update().clone();
            Some((state, (receiver, false)))
        })
        .boxed()
    }
}

/// Send `value` to every live sink, forgetting the ones whose subscriber is
/// gone. Returns how many sinks received it.
fn fan_out<T: Clone>(sinks: &mut Vec<mpsc::UnboundedSender<T>>, value: &T) -> usize {
    sinks.retain(|sink| sink.send(value.clone()).is_ok());
    sinks.len()
}

fn receiver_stream<T: Send + 'static>(receiver: mpsc::UnboundedReceiver<T>) -> impl Stream<Item = T> {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|value| (value, receiver))
    })
}

/// Adapt a broadcast receiver into a stream that ends when the sender is gone.
pub(crate) fn broadcast_stream<T>(receiver: broadcast::Receiver<T>) -> impl Stream<Item = T>
where
    T: Clone + Send + 'static,
{
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(value) => return Some((value, receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged behind, errors dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter() -> Emitter<i32, &'static str> {
        Emitter::new(0, &ContainerSettings::default())
    }

    #[tokio::test]
    async fn items_start_with_current_state() {
        let emitter = emitter();
        emitter.reduce(|s| s + 5);

        let mut items = emitter.subscribe_items();
        emitter.post_side_effect("toast");
        emitter.reduce(|s| s * 2);

        assert_eq!(items.next().await, Some(Item::State(5)));
        assert_eq!(items.next().await, Some(Item::SideEffect("toast")));
        assert_eq!(items.next().await, Some(Item::State(10)));
    }

    #[tokio::test]
    async fn side_effects_buffer_until_first_subscriber() {
        let emitter = emitter();
        emitter.post_side_effect("first");
        emitter.post_side_effect("second");

        let mut early = emitter.subscribe_side_effects();
        emitter.post_side_effect("third");
        let mut late = emitter.subscribe_side_effects();
        emitter.post_side_effect("fourth");

        assert_eq!(early.next().await, Some("first"));
        assert_eq!(early.next().await, Some("second"));
        assert_eq!(early.next().await, Some("third"));
        assert_eq!(early.next().await, Some("fourth"));
        assert_eq!(late.next().await, Some("fourth"));
    }

    #[tokio::test]
    async fn side_effect_backlog_is_bounded() {
        let settings = ContainerSettings {
            side_effect_buffer_size: 2,
            ..ContainerSettings::default()
        };
        let emitter: Emitter<i32, i32> = Emitter::new(0, &settings);
        for effect in 1..=4 {
            emitter.post_side_effect(effect);
        }

        let mut effects = emitter.subscribe_side_effects();
        assert_eq!(effects.next().await, Some(3));
        assert_eq!(effects.next().await, Some(4));
    }

    #[tokio::test]
    async fn slow_subscribers_miss_nothing() {
        let emitter = emitter();
        let mut items = emitter.subscribe_items();
        let mut effects = emitter.subscribe_side_effects();
        for _ in 0..1_000 {
            emitter.reduce(|s| s + 1);
            emitter.post_side_effect("tick");
        }

        assert_eq!(items.next().await, Some(Item::State(0)));
        for expected in 1..=1_000 {
            assert_eq!(items.next().await, Some(Item::State(expected)));
            assert_eq!(items.next().await, Some(Item::SideEffect("tick")));
        }
        for _ in 0..1_000 {
            assert_eq!(effects.next().await, Some("tick"));
        }
    }

    #[tokio::test]
    async fn dropped_subscribers_are_forgotten() {
        let emitter = emitter();
        let items = emitter.subscribe_items();
        let effects = emitter.subscribe_side_effects();
        drop(items);
        drop(effects);

        emitter.reduce(|s| s + 1);
        emitter.post_side_effect("kept");
        assert!(emitter.inner.lock().items.is_empty());

        // With every subscriber gone the side effect goes to the backlog.
        let mut late = emitter.subscribe_side_effects();
        assert_eq!(late.next().await, Some("kept"));
    }

    #[tokio::test]
    async fn states_stream_starts_with_current() {
        let emitter = emitter();
        let mut states = emitter.subscribe_states();
        assert_eq!(states.next().await, Some(0));

        emitter.reduce(|s| s + 1);
        assert_eq!(states.next().await, Some(1));
    }

    #[test]
    fn reduce_commits_new_state() {
        let emitter = emitter();
        let next = emitter.reduce(|s| s + 3);
        assert_eq!(next, 3);
        assert_eq!(emitter.current_state(), 3);
    }
}
