//! Base trait for intents (caller/system actions) in MVI architecture.

/// Marker trait for intent objects handled by a [`Reducer`](super::Reducer).
///
/// Intents represent:
/// - Caller actions (button clicks, commands)
/// - System events (responses, timers)
///
/// Intents are processed by reducers to produce new states.
pub trait Intent: Send + Sync + 'static {}
