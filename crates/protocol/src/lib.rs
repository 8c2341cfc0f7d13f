#![deny(unsafe_code)]

//! Wire-level ingestion of streamed chat responses.
//!
//! Raw transport chunks become [`LogicalLine`]s, lines become [`StreamEvent`]s, and chain
//! events get a [`ChainRole`]. Nothing in this crate performs I/O or returns errors:
//! malformed input degrades into [`StreamEvent::Malformed`] so a single bad frame never
//! aborts an otherwise healthy stream.

pub mod classify;
pub mod event;
pub mod frame;
pub mod line;
pub mod pipeline;

pub use classify::{CRITIC_MARKER, RESPONDER_MARKER, ReasoningClassifier};
pub use event::{ChainRole, EventKind, StreamEvent};
pub use frame::{EVENT_FRAME_PREFIX, FrameDecoder};
pub use line::{LineReassembler, LogicalLine};
pub use pipeline::EventPipeline;
