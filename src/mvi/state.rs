//! Bounds for the values a container emits.

use std::fmt::Debug;

/// Marker trait for container state.
///
/// States should be:
/// - Immutable (Clone to create new states)
/// - Comparable (PartialEq, equality is structural)
/// - Shareable across the background execution context
pub trait State: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> State for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Marker trait for one-shot side effects.
pub trait SideEffect: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> SideEffect for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}
