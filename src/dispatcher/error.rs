//! Errors raised while executing transforms.

use std::any::Any;

use thiserror::Error;
use tokio::task::JoinError;

/// A transform did not produce its result.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transform returned an error.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// The transform panicked.
    #[error("Transform panicked: {0}")]
    Panicked(String),

    /// The background task running the transform was cancelled.
    #[error("Transform cancelled before producing a result")]
    Cancelled,
}

impl TransformError {
    pub(crate) fn from_join(err: JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            TransformError::Cancelled
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TransformError::Panicked(message)
    }
}
