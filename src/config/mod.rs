//! Container and harness configuration.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, ContainerSettings, TestSettings};
