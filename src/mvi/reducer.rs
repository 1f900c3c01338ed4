//! Reducer trait for MVI architecture.

use super::intent::Intent;
use super::state::State;

/// Reducer transforms state based on intents.
///
/// It must be a pure function: (State, Intent) -> State. Containers run it
/// inline as a `Direct` operator, see [`Container::dispatch`].
///
/// [`Container::dispatch`]: crate::container::Container::dispatch
pub trait Reducer {
    /// The state type this reducer operates on.
    type State: State;

    /// The intent type this reducer handles.
    type Intent: Intent;

    /// Process an intent and return the new state.
    ///
    /// This should be a pure function with no side effects.
    fn reduce(state: Self::State, intent: &Self::Intent) -> Self::State;
}
