use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub container: ContainerSettings,
    #[serde(default)]
    pub test: TestSettings,
}

/// Runtime settings applied to every container built from this config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSettings {
    /// Failures kept for each `errors()` subscriber before the oldest are
    /// skipped (default: 256).
    #[serde(default = "default_error_buffer_size")]
    pub error_buffer_size: usize,
    /// Side effects kept while no side-effect subscriber is attached (default: 64).
    #[serde(default = "default_side_effect_buffer_size")]
    pub side_effect_buffer_size: usize,
    /// Intents allowed to run at the same time (default: 1, strictly ordered).
    #[serde(default = "default_intent_concurrency")]
    pub intent_concurrency: usize,
    /// Whether suspend/flow steps register with the idling registry (default: true).
    #[serde(default = "default_register_idling")]
    pub register_idling: bool,
}

/// Timing used by the test harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSettings {
    /// How long item waits block before failing (default: 1000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long `expect_no_items` watches for stray items (default: 50).
    #[serde(default = "default_settle_window_ms")]
    pub settle_window_ms: u64,
}

impl TestSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}

fn default_error_buffer_size() -> usize {
    256
}

fn default_side_effect_buffer_size() -> usize {
    64
}

fn default_intent_concurrency() -> usize {
    1
}

fn default_register_idling() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_settle_window_ms() -> u64 {
    50
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            error_buffer_size: default_error_buffer_size(),
            side_effect_buffer_size: default_side_effect_buffer_size(),
            intent_concurrency: default_intent_concurrency(),
            register_idling: default_register_idling(),
        }
    }
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            settle_window_ms: default_settle_window_ms(),
        }
    }
}
