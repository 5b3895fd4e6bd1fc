//! CRDT shared document and wire protocol codec, using the Yjs protocol via `yrs`.
//!
//! This crate owns the in-memory replica (`SharedDocument`), its ephemeral
//! awareness side-channel, and the binary framing used on the WebSocket wire.
//! It knows nothing about rooms, connections, or persistence — those live in
//! `collab-room`.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod awareness;
pub mod codec;
pub mod document;

pub use awareness::Awareness;
pub use codec::{Message, SyncMessage};
pub use document::SharedDocument;

// vim: ts=4
