#![deny(unsafe_code)]

//! Streaming chat client core.
//!
//! Drives one exchange at a time per conversation slot: the backend's byte stream is fed
//! through the protocol pipeline into a [`chat::RenderState`], and every change is
//! published to a [`chat::ChatView`].

/// Exchange rendering, dispatch and view contracts.
pub mod chat;
/// Settings persistence.
pub mod settings;
pub mod terminal;
