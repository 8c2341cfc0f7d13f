use std::fmt;

/// Stable identifier for one conversation, and therefore for its visual slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub u64);

impl ConversationId {
    /// Slot for a message sent before the backend assigned a chat id.
    pub const DRAFT: Self = Self(0);

    /// Creates a typed conversation identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Maps an optional backend chat id onto its slot.
    pub fn for_chat(chat_id: Option<u64>) -> Self {
        chat_id.map(Self).unwrap_or(Self::DRAFT)
    }
}

/// Identifier for one exchange.
///
/// This must change on every send so writes from a superseded exchange can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl ExchangeId {
    /// Creates a typed exchange identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Slot routing key used for stale-write rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeTarget {
    pub conversation_id: ConversationId,
    pub exchange_id: ExchangeId,
}

impl ExchangeTarget {
    /// Builds a full exchange target from conversation and exchange IDs.
    pub const fn new(conversation_id: ConversationId, exchange_id: ExchangeId) -> Self {
        Self {
            conversation_id,
            exchange_id,
        }
    }
}

impl fmt::Display for ExchangeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conversation {} exchange {}",
            self.conversation_id.0, self.exchange_id.0
        )
    }
}
