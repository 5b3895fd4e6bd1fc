//! The in-memory CRDT replica for a single Room (§4.2).

use collab_types::prelude::*;
use yrs::types::ToJson;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
	Doc, Map, MapRef, Options, ReadTxn, StateVector, Subscription, Transact, Update, XmlFragment,
	XmlFragmentRef,
};

/// Well-known root slot names (§3 Document / §4.1).
pub const SLOT_PROSEMIRROR: &str = "prosemirror";
pub const SLOT_METADATA: &str = "daMetadata";
pub const SLOT_ERROR: &str = "error";

/// The CRDT replica plus its root slots. Garbage collection of tombstones is
/// disabled at construction to keep snapshot/undo consistent (§4.2).
pub struct SharedDocument {
	doc: Doc,
	prosemirror: XmlFragmentRef,
	metadata: MapRef,
	error: MapRef,
	update_subscription: Option<Subscription>,
}

impl SharedDocument {
	pub fn new() -> Self {
		let doc = Doc::with_options(Options { skip_gc: true, ..Options::default() });
		let prosemirror = doc.get_or_insert_xml_fragment(SLOT_PROSEMIRROR);
		let metadata = doc.get_or_insert_map(SLOT_METADATA);
		let error = doc.get_or_insert_map(SLOT_ERROR);
		Self { doc, prosemirror, metadata, error, update_subscription: None }
	}

	pub fn prosemirror(&self) -> &XmlFragmentRef {
		&self.prosemirror
	}

	pub fn metadata(&self) -> &MapRef {
		&self.metadata
	}

	/// Merge a remote update into the replica.
	pub fn apply_update(&self, bytes: &[u8]) -> ClResult<()> {
		let update = Update::decode_v1(bytes).map_err(|e| Error::Decode(e.to_string()))?;
		let mut txn = self.doc.transact_mut();
		txn.apply_update(update).map_err(|e| Error::Decode(e.to_string()))?;
		Ok(())
	}

	/// Serialize the full state as an update relative to the empty state
	/// vector — used by the Durable Room Storage Codec and cold restores.
	pub fn encode_state(&self) -> Vec<u8> {
		let txn = self.doc.transact();
		txn.encode_state_as_update_v1(&StateVector::default())
	}

	/// Our state vector, sent as Sync Step 1.
	pub fn state_vector(&self) -> Vec<u8> {
		let txn = self.doc.transact();
		txn.state_vector().encode_v1()
	}

	/// The diff the peer is missing, given their state vector (Sync Step 2).
	pub fn encode_diff(&self, remote_sv_bytes: &[u8]) -> ClResult<Vec<u8>> {
		let remote_sv =
			StateVector::decode_v1(remote_sv_bytes).map_err(|e| Error::Decode(e.to_string()))?;
		let txn = self.doc.transact();
		Ok(txn.encode_state_as_update_v1(&remote_sv))
	}

	/// Register an observer fired with the raw update bytes on every mutation.
	/// Only one observer may be installed through this helper; the Room
	/// installs a dispatcher here and fans out to the durable-snapshot and
	/// admin write-back observers itself (§4.4.2).
	pub fn on_update<F>(&mut self, mut handler: F)
	where
		F: FnMut(&[u8]) + Send + 'static,
	{
		let sub = self.doc.observe_update_v1(move |_txn, event| {
			handler(&event.update);
		});
		self.update_subscription = sub.ok();
	}

	/// Record a server-side error into the "error" map inside a single
	/// transaction (§4.3, §7). Included stack is gated by the caller on
	/// `Config::return_stack_traces`.
	pub fn record_error(&self, message: &str, stack: Option<&str>) {
		let mut txn = self.doc.transact_mut();
		self.error.insert(&mut txn, "timestamp", Timestamp::now().0);
		self.error.insert(&mut txn, "message", message);
		if let Some(stack) = stack {
			self.error.insert(&mut txn, "stack", stack);
		}
	}

	/// Run `f` with a read-only view of the prosemirror fragment and its
	/// transaction, e.g. to walk it into another tree representation
	/// without exposing `yrs`'s transaction type to every caller.
	pub fn with_fragment_snapshot<T>(&self, f: impl FnOnce(&XmlFragmentRef, &yrs::Transaction) -> T) -> T {
		let txn = self.doc.transact();
		f(&self.prosemirror, &txn)
	}

	/// Read the metadata map out as a plain string map, e.g. for serialization.
	pub fn metadata_snapshot(&self) -> std::collections::BTreeMap<String, String> {
		let txn = self.doc.transact();
		self.metadata
			.iter(&txn)
			.map(|(k, v)| (k.to_string(), v.to_json(&txn).to_string()))
			.collect()
	}

	/// Replace the document content wholesale: clear every root slot, then
	/// let the caller repopulate them. Used by the Persistence Binder's
	/// rebuild-from-authoritative-HTML step (§4.4.1).
	pub fn clear_and_rebuild<F>(&self, rebuild: F)
	where
		F: FnOnce(&mut yrs::TransactionMut, &XmlFragmentRef, &MapRef),
	{
		let mut txn = self.doc.transact_mut();
		while self.prosemirror.len(&txn) > 0 {
			self.prosemirror.remove_range(&mut txn, 0, 1);
		}
		let keys: Vec<_> = self.metadata.iter(&txn).map(|(k, _)| k.to_string()).collect();
		for key in keys {
			self.metadata.remove(&mut txn, &key);
		}
		let error_keys: Vec<_> = self.error.iter(&txn).map(|(k, _)| k.to_string()).collect();
		for key in error_keys {
			self.error.remove(&mut txn, &key);
		}
		rebuild(&mut txn, &self.prosemirror, &self.metadata);
	}

	/// Detach all observers. Idempotent.
	pub fn destroy(&mut self) {
		self.update_subscription = None;
	}
}

impl Default for SharedDocument {
	fn default() -> Self {
		Self::new()
	}
}

// vim: ts=4
