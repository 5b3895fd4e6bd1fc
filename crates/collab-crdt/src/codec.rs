//! Wire Protocol Codec (§4.3): frames and parses sync/awareness messages.
//!
//! Every frame is a binary WebSocket message whose first varint is the
//! message kind, followed by a kind-specific payload. This mirrors the
//! real Yjs `y-protocols/sync` and `y-protocols/awareness` wire formats so
//! unmodified Yjs clients can connect directly.

use collab_types::prelude::*;

pub mod varint {
	use collab_types::prelude::*;

	pub fn write(buf: &mut Vec<u8>, mut value: u64) {
		loop {
			let mut byte = (value & 0x7f) as u8;
			value >>= 7;
			if value != 0 {
				byte |= 0x80;
			}
			buf.push(byte);
			if value == 0 {
				break;
			}
		}
	}

	pub fn read(bytes: &[u8], pos: &mut usize) -> ClResult<u64> {
		let mut result: u64 = 0;
		let mut shift = 0u32;
		loop {
			let byte = *bytes
				.get(*pos)
				.ok_or_else(|| Error::Decode("truncated varint".into()))?;
			*pos += 1;
			result |= u64::from(byte & 0x7f) << shift;
			if byte & 0x80 == 0 {
				break;
			}
			shift += 7;
			if shift >= 64 {
				return Err(Error::Decode("varint too long".into()));
			}
		}
		Ok(result)
	}
}

/// Top-level message kinds (§4.3 table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
	Sync = 0,
	Awareness = 1,
}

impl MessageKind {
	fn from_u64(v: u64) -> ClResult<Self> {
		match v {
			0 => Ok(MessageKind::Sync),
			1 => Ok(MessageKind::Awareness),
			other => Err(Error::Decode(format!("unknown message kind {other}"))),
		}
	}
}

/// Sync sub-kinds, carried as an inner varint inside a Sync message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncMessage {
	/// Sender's state vector.
	Step1(Vec<u8>),
	/// The diff the peer was missing.
	Step2(Vec<u8>),
	/// An incremental update broadcast after a local mutation.
	Update(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
	Sync(SyncMessage),
	Awareness(Vec<u8>),
}

impl Message {
	pub fn encode(&self) -> Vec<u8> {
		let mut buf = Vec::new();
		match self {
			Message::Sync(sync) => {
				varint::write(&mut buf, MessageKind::Sync as u64);
				let (sub_kind, payload) = match sync {
					SyncMessage::Step1(p) => (0u64, p),
					SyncMessage::Step2(p) => (1u64, p),
					SyncMessage::Update(p) => (2u64, p),
				};
				varint::write(&mut buf, sub_kind);
				varint::write(&mut buf, payload.len() as u64);
				buf.extend_from_slice(payload);
			}
			Message::Awareness(payload) => {
				varint::write(&mut buf, MessageKind::Awareness as u64);
				varint::write(&mut buf, payload.len() as u64);
				buf.extend_from_slice(payload);
			}
		}
		buf
	}

	pub fn decode(bytes: &[u8]) -> ClResult<Self> {
		let mut pos = 0usize;
		let kind = MessageKind::from_u64(varint::read(bytes, &mut pos)?)?;
		match kind {
			MessageKind::Sync => {
				let sub_kind = varint::read(bytes, &mut pos)?;
				let len = varint::read(bytes, &mut pos)? as usize;
				let payload = read_payload(bytes, &mut pos, len)?;
				let sync = match sub_kind {
					0 => SyncMessage::Step1(payload),
					1 => SyncMessage::Step2(payload),
					2 => SyncMessage::Update(payload),
					other => return Err(Error::Decode(format!("unknown sync sub-kind {other}"))),
				};
				Ok(Message::Sync(sync))
			}
			MessageKind::Awareness => {
				let len = varint::read(bytes, &mut pos)? as usize;
				let payload = read_payload(bytes, &mut pos, len)?;
				Ok(Message::Awareness(payload))
			}
		}
	}
}

fn read_payload(bytes: &[u8], pos: &mut usize, len: usize) -> ClResult<Vec<u8>> {
	if *pos + len > bytes.len() {
		return Err(Error::Decode("message payload truncated".into()));
	}
	let payload = bytes[*pos..*pos + len].to_vec();
	*pos += len;
	Ok(payload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn varint_roundtrips_small_and_large_values() {
		for value in [0u64, 1, 127, 128, 300, u64::from(u32::MAX)] {
			let mut buf = Vec::new();
			varint::write(&mut buf, value);
			let mut pos = 0;
			assert_eq!(varint::read(&buf, &mut pos).expect("read"), value);
			assert_eq!(pos, buf.len());
		}
	}

	#[test]
	fn sync_step1_roundtrips() {
		let msg = Message::Sync(SyncMessage::Step1(vec![1, 2, 3]));
		let bytes = msg.encode();
		assert_eq!(Message::decode(&bytes).expect("decode"), msg);
	}

	#[test]
	fn awareness_message_roundtrips() {
		let msg = Message::Awareness(vec![9, 9, 9]);
		let bytes = msg.encode();
		assert_eq!(Message::decode(&bytes).expect("decode"), msg);
	}

	#[test]
	fn unknown_kind_is_a_decode_error() {
		let bytes = vec![7u8];
		assert!(Message::decode(&bytes).is_err());
	}

	#[test]
	fn truncated_payload_is_a_decode_error() {
		// Sync kind, Step2 sub-kind, claims a 10-byte payload but supplies none.
		let bytes = vec![0u8, 1u8, 10u8];
		assert!(Message::decode(&bytes).is_err());
	}
}

// vim: ts=4
