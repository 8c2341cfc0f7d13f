//! Event-frame decoding for `data:`-prefixed stream lines.
//!
//! The backend emits one JSON payload per frame, in one of two shapes:
//!
//! ```text
//! data: {"type":"chain","role":"critic","content":"Critic: the answer skips step 2"}
//! data: {"type":"final","content":"Here is the corrected answer."}
//! data: {"response":"Hel"}
//! ```
//!
//! Anything else on the wire (blank separators, `: keep-alive` comments) is skipped.

use serde::Deserialize;

use crate::event::{ChainRole, StreamEvent};
use crate::line::LogicalLine;

pub const EVENT_FRAME_PREFIX: &str = "data:";

/// Frame types the decoder understands. Other values are ignored for forward compatibility.
const KIND_CHAIN: &str = "chain";
const KIND_FINAL: &str = "final";
const KIND_INTERMEDIATE: &str = "intermediate";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePayload {
    Typed {
        #[serde(rename = "type")]
        kind: String,
        content: String,
        #[serde(default)]
        role: Option<String>,
    },
    Token {
        response: String,
    },
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    prefix: String,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_prefix(EVENT_FRAME_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Decodes one line into an event.
    ///
    /// Returns `None` for lines that are not event frames or that carry a frame type this
    /// decoder does not know. A frame with an unparseable payload yields
    /// [`StreamEvent::Malformed`] instead of an error so the stream keeps flowing.
    pub fn decode(&self, line: &LogicalLine) -> Option<StreamEvent> {
        let text = line.as_str().trim_end_matches('\r');
        let payload = text.strip_prefix(self.prefix.as_str())?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload.trim().is_empty() {
            tracing::debug!("skipping event frame with empty payload");
            return None;
        }

        match Self::parse_payload(payload) {
            Ok(WirePayload::Typed {
                kind,
                content,
                role,
            }) => Self::typed_event(&kind, content, role.as_deref()),
            Ok(WirePayload::Token { response }) => Some(StreamEvent::token(response)),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    frame_len = text.len(),
                    "discarding malformed event frame"
                );
                Some(StreamEvent::Malformed {
                    raw: line.as_str().to_string(),
                    reason: error.to_string(),
                })
            }
        }
    }

    fn parse_payload(payload: &str) -> Result<WirePayload, serde_json::Error> {
        // Parse to a value first so syntax errors keep serde_json's position details
        // instead of the generic untagged-enum mismatch message.
        let value = serde_json::from_str::<serde_json::Value>(payload)?;
        WirePayload::deserialize(value)
    }

    fn typed_event(kind: &str, content: String, role: Option<&str>) -> Option<StreamEvent> {
        match kind {
            KIND_CHAIN => Some(StreamEvent::Chain {
                role: ChainRole::Unknown,
                declared_role: role.and_then(ChainRole::from_wire),
                content,
            }),
            KIND_FINAL => Some(StreamEvent::final_answer(content)),
            // The non-reasoning backend path streams partial answers as `intermediate`.
            KIND_INTERMEDIATE => Some(StreamEvent::token(content)),
            other => {
                tracing::debug!(kind = other, "ignoring unrecognized stream event kind");
                None
            }
        }
    }
}
