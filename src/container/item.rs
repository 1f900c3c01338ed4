//! Items observed downstream of a container.

/// One emission of a container, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Item<S, SE> {
    /// The state after a reduction (or the current state on subscription).
    State(S),
    /// A one-shot side effect.
    SideEffect(SE),
}

impl<S, SE> Item<S, SE> {
    pub fn is_state(&self) -> bool {
        matches!(self, Item::State(_))
    }

    pub fn is_side_effect(&self) -> bool {
        matches!(self, Item::SideEffect(_))
    }

    /// Human-readable kind, used in assertion messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Item::State(_) => "state",
            Item::SideEffect(_) => "side effect",
        }
    }
}
