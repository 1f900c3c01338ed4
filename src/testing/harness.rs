use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::error::HarnessError;
use super::recorder::{Arrival, ItemRecorder};
use crate::config::TestSettings;
use crate::container::{Container, ContainerHost, Item};

type HostItem<H> = Item<<H as ContainerHost>::State, <H as ContainerHost>::SideEffect>;

struct Inner<H: ContainerHost> {
    host: H,
    initial_state: H::State,
    recorder: ItemRecorder<HostItem<H>>,
    settings: TestSettings,
    ignore_remaining: AtomicBool,
}

/// Assertion handle over the items a container emits.
///
/// Every wait is bounded by [`TestSettings::timeout`] unless an explicit
/// window is passed. Items are consumed strictly in emission order.
pub struct ContainerTest<H: ContainerHost> {
    inner: Arc<Inner<H>>,
}

impl<H: ContainerHost> Clone for ContainerTest<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H> ContainerTest<H>
where
    H: ContainerHost + Send + Sync + 'static,
{
    /// Start recording `host`'s items. Recording begins with the container's
    /// current state.
    pub fn attach(host: H, settings: TestSettings) -> Self {
        let container = host.container();
        let initial_state = container.initial_state().clone();
        let recorder = ItemRecorder::start(container.items(), container.scope());
        tracing::debug!(container = %container.id(), "Harness attached");

        Self {
            inner: Arc::new(Inner {
                host,
                initial_state,
                recorder,
                settings,
                ignore_remaining: AtomicBool::new(false),
            }),
        }
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn container(&self) -> &Container<H::State, H::SideEffect> {
        self.inner.host.container()
    }

    pub fn settings(&self) -> &TestSettings {
        &self.inner.settings
    }

    /// Unconsumed items recorded so far.
    pub fn pending_items(&self) -> usize {
        self.inner.recorder.pending()
    }

    /// The first item must be the state the container was created with.
    pub async fn expect_initial_state(&self) -> Result<(), HarnessError> {
        let operation = "expect_initial_state";
        match self.next_item(operation, self.inner.settings.timeout()).await? {
            Item::State(state) if state == self.inner.initial_state => Ok(()),
            other => Err(HarnessError::assertion(format!(
                "{operation}: expected State({:?}), got {other:?}",
                self.inner.initial_state
            ))),
        }
    }

    pub async fn await_item(&self) -> Result<HostItem<H>, HarnessError> {
        self.await_item_within(self.inner.settings.timeout()).await
    }

    /// Oldest unconsumed item, waiting up to `timeout` for one to arrive.
    pub async fn await_item_within(
        &self,
        timeout: Duration,
    ) -> Result<HostItem<H>, HarnessError> {
        self.next_item("await_item", timeout).await
    }

    /// Next item, which must be a state.
    pub async fn await_state(&self) -> Result<H::State, HarnessError> {
        let operation = "await_state";
        match self.next_item(operation, self.inner.settings.timeout()).await? {
            Item::State(state) => Ok(state),
            other => Err(HarnessError::assertion(format!(
                "{operation}: expected a state, got {other:?}"
            ))),
        }
    }

    /// Next item, which must be a side effect.
    pub async fn await_side_effect(&self) -> Result<H::SideEffect, HarnessError> {
        let operation = "await_side_effect";
        match self.next_item(operation, self.inner.settings.timeout()).await? {
            Item::SideEffect(side_effect) => Ok(side_effect),
            other => Err(HarnessError::assertion(format!(
                "{operation}: expected a side effect, got {other:?}"
            ))),
        }
    }

    /// Consume exactly `count` items. All of them must arrive within one
    /// timeout budget.
    pub async fn skip_items(&self, count: usize) -> Result<(), HarnessError> {
        let started = Instant::now();
        let deadline = started + self.inner.settings.timeout();
        for _ in 0..count {
            self.next_item_until("skip_items", started, deadline).await?;
        }
        Ok(())
    }

    pub async fn expect_no_items(&self) -> Result<(), HarnessError> {
        self.expect_no_items_within(self.inner.settings.settle_window())
            .await
    }

    /// Nothing may be pending now, and nothing may arrive within `window`.
    pub async fn expect_no_items_within(&self, window: Duration) -> Result<(), HarnessError> {
        if let Some(item) = self.inner.recorder.peek() {
            return Err(HarnessError::assertion(format!(
                "expect_no_items: unconsumed item present: {item:?}"
            )));
        }

        match self
            .inner
            .recorder
            .await_arrival(Instant::now() + window)
            .await
        {
            Arrival::Pending => {
                let item = self.inner.recorder.peek();
                Err(HarnessError::assertion(format!(
                    "expect_no_items: item arrived within {window:?}: {item:?}"
                )))
            }
            Arrival::TimedOut | Arrival::Exhausted => Ok(()),
        }
    }

    /// Stop recording and skip the end-of-test unconsumed item check.
    pub fn cancel_and_ignore_remaining_items(&self) {
        self.inner.ignore_remaining.store(true, Ordering::SeqCst);
        self.inner.recorder.cancel();
    }

    /// Fail if any recorded item was never consumed.
    pub fn ensure_all_items_consumed(&self) -> Result<(), HarnessError> {
        if self.inner.ignore_remaining.load(Ordering::SeqCst) {
            return Ok(());
        }
        let count = self.inner.recorder.pending();
        match self.inner.recorder.peek() {
            Some(next) => Err(HarnessError::UnconsumedItems {
                count,
                next: format!("{next:?}"),
            }),
            None => Ok(()),
        }
    }

    async fn next_item(
        &self,
        operation: &'static str,
        timeout: Duration,
    ) -> Result<HostItem<H>, HarnessError> {
        let started = Instant::now();
        self.next_item_until(operation, started, started + timeout)
            .await
    }

    async fn next_item_until(
        &self,
        operation: &'static str,
        started: Instant,
        deadline: Instant,
    ) -> Result<HostItem<H>, HarnessError> {
        loop {
            if let Some(item) = self.inner.recorder.pop() {
                tracing::trace!(operation, kind = item.kind(), "Item consumed");
                return Ok(item);
            }
            match self.inner.recorder.await_arrival(deadline).await {
                Arrival::Pending => continue,
                Arrival::Exhausted => return Err(HarnessError::ContainerClosed { operation }),
                Arrival::TimedOut => {
                    return Err(HarnessError::Timeout {
                        operation,
                        elapsed: started.elapsed(),
                    })
                }
            }
        }
    }
}

impl<H: ContainerHost> Debug for ContainerTest<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerTest")
            .field("initial_state", &self.inner.initial_state)
            .field("settings", &self.inner.settings)
            .finish()
    }
}
