//! Per-connection bookkeeping (§3 Connection).
//!
//! A `Connection` never crosses the Room boundary by reference — only its
//! opaque id does. The Room owns the authoritative `ConnState` map so that
//! closing a connection never has to chase a cycle back through a shared
//! pointer (§9 "cyclic references" avoided pattern).

use collab_crdt::awareness::ClientId;
use tokio::sync::mpsc;

pub type ConnectionId = u64;

/// Something the Room wants the edge handler to do with one client's
/// socket: write a frame, or close it outright (admin invalidation, auth
/// revocation, a 412 from the admin service).
#[derive(Debug)]
pub enum OutboundMsg {
	Frame(Vec<u8>),
	Close,
}

/// A channel onto which the Room enqueues outbound work; a task owned by
/// the edge handler drains it onto the real WebSocket.
pub type OutboundSender = mpsc::UnboundedSender<OutboundMsg>;

/// Room-side state for one live connection.
pub struct ConnState {
	pub outbound: OutboundSender,
	pub credential: Option<Box<str>>,
	pub read_only: bool,
	pub awareness_ids: Vec<ClientId>,
}

impl ConnState {
	pub fn new(outbound: OutboundSender, credential: Option<Box<str>>, read_only: bool) -> Self {
		Self { outbound, credential, read_only, awareness_ids: Vec::new() }
	}

	/// Best-effort send; a closed receiver just means the connection is
	/// already tearing down from the other side.
	pub fn send(&self, frame: Vec<u8>) {
		let _ = self.outbound.send(OutboundMsg::Frame(frame));
	}

	pub fn close(&self) {
		let _ = self.outbound.send(OutboundMsg::Close);
	}
}

// vim: ts=4
