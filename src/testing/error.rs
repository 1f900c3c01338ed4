use std::time::Duration;

use thiserror::Error;

/// Failure of a harness expectation. Ends the current test scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Assertion failed: {message}")]
    Assertion { message: String },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("{operation}: container closed and no items are left")]
    ContainerClosed { operation: &'static str },

    #[error("{count} unconsumed item(s) at the end of the test, next: {next}")]
    UnconsumedItems { count: usize, next: String },
}

impl HarnessError {
    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }
}
