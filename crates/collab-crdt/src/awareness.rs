//! Ephemeral per-client presence/cursor state (§3 Document, §4.2).
//!
//! Awareness is deliberately not part of the durable CRDT replica: it is
//! never persisted and is wiped whenever its owning connection closes. The
//! wire format mirrors the y-protocols awareness encoding (a varint entry
//! count, then per entry: client id, clock, and a JSON-encoded state or an
//! empty string for "removed") so unmodified Yjs clients can talk to this
//! server without a custom awareness layer on their end.

use std::collections::HashMap;

use collab_types::prelude::*;
use serde_json::Value;

use crate::codec::varint;

pub type ClientId = u64;

#[derive(Clone, Debug)]
struct Entry {
	clock: u32,
	state: Option<Value>,
}

/// Holds the latest known state per connected client.
#[derive(Debug, Default)]
pub struct Awareness {
	states: HashMap<ClientId, Entry>,
}

impl Awareness {
	pub fn new() -> Self {
		Self::default()
	}

	/// All live client states, for seeding a newly connected peer.
	pub fn states(&self) -> impl Iterator<Item = (ClientId, &Value)> {
		self.states.iter().filter_map(|(id, e)| e.state.as_ref().map(|s| (*id, s)))
	}

	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	/// Apply a decoded remote update, returning the set of client ids it
	/// touched (for rebroadcast bookkeeping).
	pub fn apply(&mut self, update: &AwarenessUpdate) {
		for item in &update.items {
			match &item.state {
				Some(state) => {
					self.states.insert(item.client_id, Entry { clock: item.clock, state: Some(state.clone()) });
				}
				None => {
					self.states.remove(&item.client_id);
				}
			}
		}
	}

	/// Remove every client id this connection controlled, producing a
	/// "removed" update to broadcast to the remaining peers.
	pub fn remove_clients(&mut self, client_ids: &[ClientId]) -> AwarenessUpdate {
		let mut items = Vec::with_capacity(client_ids.len());
		for &client_id in client_ids {
			let clock = self.states.remove(&client_id).map_or(0, |e| e.clock) + 1;
			items.push(AwarenessItem { client_id, clock, state: None });
		}
		AwarenessUpdate { items }
	}

	/// Encode the full current state as a single update, for seeding a new
	/// connection right after Sync Step 2.
	pub fn full_snapshot(&self) -> AwarenessUpdate {
		let items = self
			.states
			.iter()
			.map(|(&client_id, e)| AwarenessItem { client_id, clock: e.clock, state: e.state.clone() })
			.collect();
		AwarenessUpdate { items }
	}
}

#[derive(Clone, Debug)]
pub struct AwarenessItem {
	pub client_id: ClientId,
	pub clock: u32,
	pub state: Option<Value>,
}

#[derive(Clone, Debug, Default)]
pub struct AwarenessUpdate {
	pub items: Vec<AwarenessItem>,
}

impl AwarenessUpdate {
	pub fn encode(&self) -> Vec<u8> {
		let mut buf = Vec::new();
		varint::write(&mut buf, self.items.len() as u64);
		for item in &self.items {
			varint::write(&mut buf, item.client_id);
			varint::write(&mut buf, u64::from(item.clock));
			let json = match &item.state {
				Some(v) => serde_json::to_string(v).unwrap_or_default(),
				None => String::new(),
			};
			let bytes = json.as_bytes();
			varint::write(&mut buf, bytes.len() as u64);
			buf.extend_from_slice(bytes);
		}
		buf
	}

	pub fn decode(bytes: &[u8]) -> ClResult<Self> {
		let mut pos = 0usize;
		let count = varint::read(bytes, &mut pos)?;
		let mut items = Vec::with_capacity(count as usize);
		for _ in 0..count {
			let client_id = varint::read(bytes, &mut pos)?;
			let clock = varint::read(bytes, &mut pos)? as u32;
			let len = varint::read(bytes, &mut pos)? as usize;
			if pos + len > bytes.len() {
				return Err(Error::Decode("awareness update truncated".into()));
			}
			let raw = &bytes[pos..pos + len];
			pos += len;
			let state = if raw.is_empty() {
				None
			} else {
				let text = std::str::from_utf8(raw).map_err(|e| Error::Decode(e.to_string()))?;
				Some(serde_json::from_str(text).map_err(|e| Error::Decode(e.to_string()))?)
			};
			items.push(AwarenessItem { client_id, clock, state });
		}
		Ok(Self { items })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roundtrips_through_encode_decode() {
		let update = AwarenessUpdate {
			items: vec![
				AwarenessItem { client_id: 1, clock: 3, state: Some(serde_json::json!({"cursor": 5})) },
				AwarenessItem { client_id: 2, clock: 1, state: None },
			],
		};
		let bytes = update.encode();
		let decoded = AwarenessUpdate::decode(&bytes).expect("decode");
		assert_eq!(decoded.items.len(), 2);
		assert_eq!(decoded.items[0].client_id, 1);
		assert!(decoded.items[1].state.is_none());
	}

	#[test]
	fn remove_clients_wipes_state_and_bumps_clock() {
		let mut awareness = Awareness::new();
		awareness.apply(&AwarenessUpdate {
			items: vec![AwarenessItem { client_id: 7, clock: 1, state: Some(serde_json::json!({})) }],
		});
		assert!(!awareness.is_empty());
		let removal = awareness.remove_clients(&[7]);
		assert!(awareness.is_empty());
		assert_eq!(removal.items[0].clock, 2);
		assert!(removal.items[0].state.is_none());
	}
}

// vim: ts=4
