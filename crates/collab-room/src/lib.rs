//! Room lifecycle, the wire-protocol dispatcher inside each Room, the
//! Persistence Binder, and the Room Registry (§4.4, §4.6, §5).
//!
//! Everything in this crate that suspends across an `.await` belongs to
//! exactly one Room's single-task serialization domain; nothing here holds
//! a lock shared between Rooms.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod admin_client;
pub mod binder;
pub mod connection;
pub mod registry;
pub mod room;

pub use admin_client::{AdminClient, GetOutcome, HttpAdminClient, PutOutcome, SharedAdminClient};
pub use connection::{ConnState, ConnectionId, OutboundMsg, OutboundSender};
pub use registry::{Registry, RoomConfig};
pub use room::{ConnectAccepted, ConnectRequest, RoomHandle, select_subprotocol, spawn_room};

// vim: ts=4
