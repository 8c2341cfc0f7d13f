pub mod dispatcher;
/// View-facing change notifications and user controls.
pub mod events;
pub mod indicator;
/// Identifiers routing writes to conversation slots.
pub mod message;
pub mod render;
pub mod scroll_manager;
pub mod view;

pub use dispatcher::{
    DEFAULT_IDLE_TIMEOUT, DispatchOptions, ExchangeFailure, ExchangeOutcome, SessionDispatcher,
};
pub use events::{ExchangeControl, ViewChange, ViewEvent};
pub use indicator::TypingIndicator;
pub use message::{ConversationId, ExchangeId, ExchangeTarget};
pub use render::{ChainEntry, ChainPanel, FAILURE_PREFIX, INTERRUPTED_MARKER, Phase, RenderState};
pub use scroll_manager::{AutoScroll, Viewport};
pub use view::ChatView;
