use std::fmt;

/// Author of one chain-of-thought segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChainRole {
    Critic,
    Responder,
    #[default]
    Unknown,
}

impl ChainRole {
    /// Parses the optional structured `role` field carried by some chain frames.
    ///
    /// Unrecognized values map to `None` so the classifier falls back to content markers.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critic" => Some(Self::Critic),
            "responder" => Some(Self::Responder),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critic => "critic",
            Self::Responder => "responder",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator reported by [`StreamEvent::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chain,
    Final,
    Token,
    Malformed,
}

/// One decoded unit of the streaming protocol.
///
/// Both wire variants (typed chain/final frames and raw `response` tokens) land in this
/// single union so downstream consumers only ever match on one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Intermediate reasoning authored by the critic or the responder.
    Chain {
        role: ChainRole,
        /// Role announced by the frame itself, if any.
        declared_role: Option<ChainRole>,
        content: String,
    },
    /// Complete final answer for the current reasoning round.
    Final { content: String },
    /// Incremental fragment of the final answer.
    Token { content: String },
    /// Frame whose payload could not be parsed; `raw` is the offending line.
    Malformed { raw: String, reason: String },
}

impl StreamEvent {
    pub fn chain(content: impl Into<String>) -> Self {
        Self::Chain {
            role: ChainRole::Unknown,
            declared_role: None,
            content: content.into(),
        }
    }

    pub fn final_answer(content: impl Into<String>) -> Self {
        Self::Final {
            content: content.into(),
        }
    }

    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Chain { .. } => EventKind::Chain,
            Self::Final { .. } => EventKind::Final,
            Self::Token { .. } => EventKind::Token,
            Self::Malformed { .. } => EventKind::Malformed,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Chain { content, .. } | Self::Final { content } | Self::Token { content } => {
                content
            }
            Self::Malformed { raw, .. } => raw,
        }
    }

    /// Role of a chain event; `None` for every other kind.
    pub fn role(&self) -> Option<ChainRole> {
        match self {
            Self::Chain { role, .. } => Some(*role),
            Self::Final { .. } | Self::Token { .. } | Self::Malformed { .. } => None,
        }
    }
}
