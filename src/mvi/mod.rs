//! Model-View-Intent (MVI) primitives shared by containers.
//!
//! # Architecture
//!
//! ```text
//! Intent ──→ Container ──→ State ──→ Subscribers
//!    ↑           │
//!    │           └──→ SideEffect ──→ Subscribers
//!    └───────────────────────────────────┘
//! ```
//!
//! - **State**: Immutable snapshot, replaced wholesale on every reduction
//! - **SideEffect**: One-shot event that is never part of the state
//! - **Intent**: Caller action routed through a container
//! - **Reducer**: Pure function that transforms state based on intents

mod intent;
mod reducer;
mod state;

pub use intent::Intent;
pub use reducer::Reducer;
pub use state::{SideEffect, State};
