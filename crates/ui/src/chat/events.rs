use crate::chat::message::ExchangeTarget;
use crate::chat::render::RenderState;

/// Which part of the rendered exchange changed after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewChange {
    ChainLogChanged,
    FinalTextChanged,
    PhaseChanged,
    ReasoningVisibilityChanged,
}

/// Published to the view after every state change of a live exchange.
///
/// The snapshot is the full state after the change, so a view can re-render the slot
/// without tracking history of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEvent {
    pub change: ViewChange,
    pub snapshot: RenderState,
}

impl ViewEvent {
    pub fn new(change: ViewChange, snapshot: RenderState) -> Self {
        Self { change, snapshot }
    }

    pub fn target(&self) -> ExchangeTarget {
        self.snapshot.target()
    }
}

/// User input routed to a live exchange while it streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeControl {
    ToggleReasoning,
}
