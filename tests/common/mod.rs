//! Shared test utilities: a counter container and fast harness settings.

#![allow(dead_code, unused_imports)]

use std::time::Duration;

use statehost::{Container, ContainerHost, ContainerSettings, Scope, TestSettings};

#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub count: i32,
}

pub type CounterContainer = Container<Counter, i32>;

/// Counter container starting at zero.
pub fn counter_container(scope: &Scope) -> CounterContainer {
    Container::new(Counter { count: 0 }, scope)
}

/// Counter container with custom settings.
pub fn counter_container_with(scope: &Scope, settings: ContainerSettings) -> CounterContainer {
    Container::builder(Counter { count: 0 })
        .settings(settings)
        .build(scope)
}

/// Harness settings short enough to keep failing waits fast.
pub fn fast_settings() -> TestSettings {
    TestSettings {
        timeout_ms: 500,
        settle_window_ms: 30,
    }
}

/// View-model style host owning a container.
pub struct CounterViewModel {
    container: CounterContainer,
}

impl CounterViewModel {
    pub fn new(scope: &Scope) -> Self {
        Self {
            container: counter_container(scope),
        }
    }

    /// Set the count, then post it as a side effect.
    pub fn set_and_announce(&self, count: i32, announce: i32) -> anyhow::Result<()> {
        self.container.intent(move |scope| async move {
            scope.reduce(|_| Counter { count });
            scope.post_side_effect(announce);
            Ok(())
        })?;
        Ok(())
    }
}

impl ContainerHost for CounterViewModel {
    type State = Counter;
    type SideEffect = i32;

    fn container(&self) -> &CounterContainer {
        &self.container
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
