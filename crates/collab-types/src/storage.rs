//! The `PersistenceInterface` abstraction for durable room storage (§4.5).
//!
//! Kept backend-agnostic on purpose: the Durable Room Storage Codec is
//! specified against this narrow `list`/`put`/`delete_all` capability so any
//! embedded or remote key-value store can back it. `collab-room-storage-redb`
//! is the shipped implementation.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::prelude::*;
use crate::types::DocName;

/// One row of the chunked storage record (§3 Chunked Storage Record).
#[derive(Clone, Debug, Default)]
pub struct ChunkedRecord {
	pub doc: Option<Box<str>>,
	pub docstore: Option<Vec<u8>>,
	pub chunks: Option<u32>,
	pub chunk_values: BTreeMap<u32, Vec<u8>>,
	pub etag: Option<Box<str>>,
}

impl ChunkedRecord {
	pub fn is_empty(&self) -> bool {
		self.doc.is_none() && self.docstore.is_none() && self.chunks.is_none()
	}
}

/// Hard ceiling on the number of chunks a single record may hold (§3, §4.5).
/// `N == MAX_CHUNKS` must fail rather than silently truncate.
pub const MAX_CHUNKS: u32 = 128;

/// The outcome of reassembling a stored record against the name it was
/// expected to hold (§4.5 read algorithm).
pub enum ReadOutcome {
	/// Nothing stored yet for this document.
	Absent,
	/// The record's `doc` tag didn't match; the caller must wipe storage
	/// before treating this as absent.
	Mismatched,
	/// The full CRDT state, reassembled, plus whatever ETag was stored
	/// alongside it.
	Present { state: Vec<u8>, etag: Option<Box<str>> },
}

/// Durable Room Storage Codec read algorithm (§4.5): validate the `doc` tag
/// and reassemble `docstore` or `chunk_0..chunk_{chunks-1}` into one buffer.
/// Chunks are copied one at a time (never concatenated via an unbounded
/// splat) so a large state can't blow the stack.
pub fn reassemble(record: &ChunkedRecord, expected_doc: &DocName) -> ReadOutcome {
	if record.is_empty() {
		return ReadOutcome::Absent;
	}
	match &record.doc {
		Some(doc) if doc.as_ref() == expected_doc.as_str() => {}
		_ => return ReadOutcome::Mismatched,
	}

	if let Some(docstore) = &record.docstore {
		return ReadOutcome::Present { state: docstore.clone(), etag: record.etag.clone() };
	}

	let Some(chunks) = record.chunks else { return ReadOutcome::Absent };
	let mut state = Vec::new();
	for i in 0..chunks {
		let Some(chunk) = record.chunk_values.get(&i) else { return ReadOutcome::Absent };
		state.extend_from_slice(chunk);
	}
	ReadOutcome::Present { state, etag: record.etag.clone() }
}

/// Durable Room Storage Codec write algorithm (§4.5): split `state` into
/// chunks of at most `chunk_size` bytes if it doesn't fit in a single value,
/// else write it unchunked. Fails if the split would need `MAX_CHUNKS` or
/// more chunks.
pub fn chunk(doc: &DocName, state: &[u8], etag: Option<Box<str>>, chunk_size: usize) -> ClResult<ChunkedRecord> {
	let doc_tag = Some(Box::from(doc.as_str()));
	if state.len() <= chunk_size {
		return Ok(ChunkedRecord { doc: doc_tag, docstore: Some(state.to_vec()), chunks: None, chunk_values: BTreeMap::new(), etag });
	}

	let n = state.len().div_ceil(chunk_size) as u32;
	if n >= MAX_CHUNKS {
		return Err(Error::Storage(format!(
			"state requires {n} chunks, at or above the {MAX_CHUNKS}-chunk ceiling"
		)));
	}
	let mut chunk_values = BTreeMap::new();
	for (i, slice) in state.chunks(chunk_size).enumerate() {
		chunk_values.insert(i as u32, slice.to_vec());
	}
	Ok(ChunkedRecord { doc: doc_tag, docstore: None, chunks: Some(n), chunk_values, etag })
}


/// Abstract key-value capability a durable room storage backend must offer.
/// One logical namespace per document name; no cross-room aliasing.
#[async_trait]
pub trait PersistenceInterface: Send + Sync {
	/// Read every recognized key for `doc` into a record. Returns a default
	/// (empty) record if nothing has been stored yet.
	async fn list(&self, doc: &DocName) -> ClResult<ChunkedRecord>;

	/// Overwrite the stored record for `doc` wholesale. Implementations must
	/// delete any previously stored keys first (delete-all semantics).
	async fn put(&self, doc: &DocName, record: ChunkedRecord) -> ClResult<()>;

	/// Remove every stored key for `doc`.
	async fn delete_all(&self, doc: &DocName) -> ClResult<()>;
}

// vim: ts=4
