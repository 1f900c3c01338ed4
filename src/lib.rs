//! Reactive state containers.
//!
//! A [`Container`] holds an immutable state snapshot and emits
//! [`Item`]s (state changes and one-shot side effects) while processing
//! intents. Intent work is described by [`Operator`]s and executed by the
//! [`Dispatcher`]; asynchronous work is tracked by an [`IdlingRegistry`].
//! The [`testing`] module records emitted items and asserts on them.

pub mod config;
pub mod container;
pub mod dispatcher;
pub mod idling;
pub mod mvi;
pub mod operator;
pub mod scope;
pub mod telemetry;
pub mod testing;

pub use config::{Config, ConfigError, ContainerSettings, TestSettings};
pub use container::{
    Chain, Container, ContainerBuilder, ContainerError, ContainerHost, ContainerId, IntentHandle,
    IntentScope, Item,
};
pub use dispatcher::{Dispatcher, TransformError};
pub use idling::{CountingIdlingRegistry, IdlingRegistry, NoopIdlingRegistry, RegistryImbalance};
pub use operator::{Context, Operator};
pub use scope::Scope;
