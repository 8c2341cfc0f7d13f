use crate::chat::events::ViewEvent;
use crate::chat::message::ExchangeTarget;
use crate::chat::scroll_manager::Viewport;

/// Rendering layer that displays exchanges.
///
/// Calls arrive from the task driving the exchange, in the order the stream produced them.
pub trait ChatView: Send + Sync {
    /// Current scroll metrics of the conversation list.
    fn viewport(&self) -> Viewport;

    fn render(&self, event: ViewEvent);

    fn scroll_to_bottom(&self, target: ExchangeTarget);

    /// Shows or hides the typing indicator for one exchange.
    fn set_typing(&self, target: ExchangeTarget, active: bool);
}
