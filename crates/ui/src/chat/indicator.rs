use std::sync::Arc;

use crate::chat::message::ExchangeTarget;
use crate::chat::view::ChatView;

/// Typing indicator held for the lifetime of one exchange.
///
/// The indicator is hidden when the guard drops, whichever way the exchange ends.
pub struct TypingIndicator {
    target: ExchangeTarget,
    view: Arc<dyn ChatView>,
}

impl TypingIndicator {
    pub fn start(view: Arc<dyn ChatView>, target: ExchangeTarget) -> Self {
        view.set_typing(target, true);
        Self { target, view }
    }

    pub fn target(&self) -> ExchangeTarget {
        self.target
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.view.set_typing(self.target, false);
        tracing::trace!(target = ?self.target, "typing indicator released");
    }
}
