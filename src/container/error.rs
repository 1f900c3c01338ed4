//! Errors surfaced to callers submitting intents.

use std::sync::Arc;

use thiserror::Error;

use super::ContainerId;
use crate::dispatcher::TransformError;

/// Errors that can occur when submitting or awaiting an intent.
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// The container's scope was torn down; no new intents are accepted.
    #[error("Container {container} is closed")]
    Closed { container: ContainerId },

    /// The intent was dropped before it completed (scope teardown).
    #[error("Intent {intent} was cancelled before completing")]
    Cancelled { intent: u64 },

    /// A transform in the intent's chain failed.
    #[error("Intent {intent} failed: {source}")]
    Transform {
        intent: u64,
        #[source]
        source: Arc<TransformError>,
    },
}
