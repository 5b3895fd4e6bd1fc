//! The Room actor (§4.6, §5): one dedicated Tokio task per live document,
//! owning the `SharedDocument`, the `Awareness` side-channel, and the
//! connection map as its own single-threaded serialization domain. Nothing
//! outside this module ever touches that state directly — every request
//! crosses through `RoomCommand` on an unbounded mailbox.
//!
//! Running the Persistence Binder's Load Protocol inline on the first
//! `Connect` command (instead of a separate shared future/`OnceCell`) is
//! what makes "the binder runs exactly once per Room, and every connection
//! made before it completes waits for it" fall out for free: the mailbox is
//! FIFO, so a second `Connect` queued behind the first is only read once the
//! first has already finished binding.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use collab_core::debounce::DebounceTimer;
use collab_core::generation::Generation;
use collab_crdt::awareness::{Awareness, AwarenessUpdate};
use collab_crdt::codec::{Message, SyncMessage};
use collab_crdt::document::SharedDocument;
use collab_types::prelude::*;
use collab_types::storage::PersistenceInterface;
use tokio::sync::{mpsc, oneshot};

use crate::admin_client::SharedAdminClient;
use crate::binder::{self, ConnectionCredential};
use crate::connection::{ConnState, ConnectionId, OutboundSender};
use crate::registry::{Registry, RoomConfig};

static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(0);

/// What a connecting client asked for.
pub struct ConnectRequest {
	pub credential: Option<Box<str>>,
	/// Pre-authorized from `X-auth-actions`, if the edge dispatcher already
	/// resolved it; `None` means "fall back to what the binder last learned".
	pub action_set: Option<ActionSet>,
	pub outbound: OutboundSender,
}

/// What the Room hands back once a connection is admitted.
pub struct ConnectAccepted {
	pub conn_id: ConnectionId,
	pub read_only: bool,
	/// Sync Step 1 to send immediately after upgrade (§4.3).
	pub sync_step1: Vec<u8>,
	/// A full awareness snapshot, if any peer already has presence state.
	pub awareness_snapshot: Option<Vec<u8>>,
}

enum RoomCommand {
	Connect { req: ConnectRequest, reply: oneshot::Sender<ClResult<ConnectAccepted>> },
	Message { conn_id: ConnectionId, bytes: Vec<u8> },
	Disconnect { conn_id: ConnectionId },
	/// Admin-triggered invalidation (`syncAdmin`/`deleteAdmin`, §4.7): close
	/// every connection and let the Room's mailbox drain to nothing.
	Invalidate,
}

/// A cheap, cloneable reference to a live Room. Doubles as the liveness
/// witness the Registry uses to decide whether to spawn a replacement:
/// once the actor task exits, `cmd_tx` closes and `is_dead` goes true.
#[derive(Clone)]
pub struct RoomHandle {
	name: DocName,
	cmd_tx: mpsc::UnboundedSender<RoomCommand>,
	id: u64,
}

impl RoomHandle {
	pub fn name(&self) -> &DocName {
		&self.name
	}

	/// True once the Room's task has exited and its mailbox is closed.
	pub fn is_dead(&self) -> bool {
		self.cmd_tx.is_closed()
	}

	/// Whether `other` refers to the very same spawned Room instance, as
	/// opposed to a newer Room that happens to share the same document name.
	pub fn same_room(&self, other: &RoomHandle) -> bool {
		self.id == other.id
	}

	pub async fn connect(&self, req: ConnectRequest) -> ClResult<ConnectAccepted> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.cmd_tx
			.send(RoomCommand::Connect { req, reply: reply_tx })
			.map_err(|_| Error::Internal("room is no longer running".into()))?;
		reply_rx.await.map_err(|_| Error::Internal("room dropped the connect reply".into()))?
	}

	/// Fire-and-forget: a dead room silently drops the message, same as a
	/// connection that raced its own disconnect.
	pub fn message(&self, conn_id: ConnectionId, bytes: Vec<u8>) {
		let _ = self.cmd_tx.send(RoomCommand::Message { conn_id, bytes });
	}

	pub fn disconnect(&self, conn_id: ConnectionId) {
		let _ = self.cmd_tx.send(RoomCommand::Disconnect { conn_id });
	}

	pub fn invalidate(&self) {
		let _ = self.cmd_tx.send(RoomCommand::Invalidate);
	}
}

/// Negotiate the single WebSocket subprotocol this server understands out
/// of whatever the client offered in `Sec-WebSocket-Protocol`.
pub fn select_subprotocol(offered: &str) -> Option<&'static str> {
	offered.split(',').map(str::trim).find(|p| *p == "yjs").map(|_| "yjs")
}

pub fn spawn_room(name: DocName, config: RoomConfig, registry: Arc<Registry>) -> RoomHandle {
	let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
	let (update_tx, update_rx) = mpsc::unbounded_channel();
	let id = NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed);
	let self_handle = RoomHandle { name: name.clone(), cmd_tx: cmd_tx.clone(), id };

	let actor = RoomActor {
		name: name.clone(),
		document: SharedDocument::new(),
		awareness: Awareness::new(),
		connections: std::collections::HashMap::new(),
		next_conn_id: 0,
		bound: false,
		ever_connected: false,
		load_action_set: None,
		current_etag: None,
		last_known_html: None,
		pending_rebuild: None,
		write_back_timer: DebounceTimer::write_back(),
		generation: Generation::new(),
		admin: config.admin,
		storage: config.storage,
		storage_chunk_size: config.storage_chunk_size,
		return_stack_traces: config.return_stack_traces,
		registry,
		self_handle,
		cmd_rx,
		update_tx,
		update_rx,
	};
	tokio::spawn(actor.run());
	RoomHandle { name, cmd_tx, id }
}

struct RoomActor {
	name: DocName,
	document: SharedDocument,
	awareness: Awareness,
	connections: std::collections::HashMap<ConnectionId, ConnState>,
	next_conn_id: ConnectionId,
	bound: bool,
	ever_connected: bool,
	load_action_set: Option<ActionSet>,
	current_etag: Option<Box<str>>,
	last_known_html: Option<Box<str>>,
	/// Authoritative HTML awaiting the ~1s rebuild grace delay (§4.4.1 step 4).
	pending_rebuild: Option<(Box<str>, Instant)>,
	write_back_timer: DebounceTimer,
	generation: Generation,
	admin: SharedAdminClient,
	storage: Arc<dyn PersistenceInterface>,
	storage_chunk_size: usize,
	return_stack_traces: bool,
	registry: Arc<Registry>,
	/// This Room's own handle, kept only so its teardown path can identify
	/// itself to the Registry (§3: "destroyed when its last Connection
	/// closes or when an admin invalidation arrives").
	self_handle: RoomHandle,
	cmd_rx: mpsc::UnboundedReceiver<RoomCommand>,
	update_tx: mpsc::UnboundedSender<Vec<u8>>,
	update_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
	match deadline {
		Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
		None => std::future::pending().await,
	}
}

impl RoomActor {
	async fn run(mut self) {
		loop {
			let write_deadline = self.write_back_timer.deadline();
			let rebuild_deadline = self.pending_rebuild.as_ref().map(|(_, d)| *d);

			tokio::select! {
				cmd = self.cmd_rx.recv() => {
					match cmd {
						Some(cmd) => self.handle_command(cmd).await,
						None => break,
					}
				}
				Some(update_bytes) = self.update_rx.recv() => {
					self.on_doc_update(update_bytes).await;
				}
				_ = sleep_until_opt(write_deadline) => {
					self.fire_write_back().await;
				}
				_ = sleep_until_opt(rebuild_deadline) => {
					self.fire_rebuild();
				}
			}

			if self.ever_connected && self.connections.is_empty() {
				break;
			}
		}
		self.registry.remove(&self.name, &self.self_handle).await;
		self.document.destroy();
	}

	async fn handle_command(&mut self, cmd: RoomCommand) {
		match cmd {
			RoomCommand::Connect { req, reply } => self.handle_connect(req, reply).await,
			RoomCommand::Message { conn_id, bytes } => self.handle_message(conn_id, bytes).await,
			RoomCommand::Disconnect { conn_id } => self.handle_disconnect(conn_id),
			RoomCommand::Invalidate => self.handle_invalidate(),
		}
	}

	async fn handle_connect(&mut self, req: ConnectRequest, reply: oneshot::Sender<ClResult<ConnectAccepted>>) {
		if !self.bound {
			match binder::load(&self.name, &self.document, self.storage.as_ref(), self.admin.as_ref(), req.credential.as_deref()).await {
				Ok(result) => {
					self.current_etag = result.current_etag;
					self.last_known_html = result.last_known_html;
					if let Some(html) = result.pending_rebuild_html {
						self.pending_rebuild = Some((html, Instant::now() + Duration::from_secs(1)));
					}
					if result.action_set.is_some() {
						self.load_action_set = result.action_set;
					}
					self.bound = true;
					self.install_observers();
				}
				Err(e) => {
					let _ = reply.send(Err(e));
					return;
				}
			}
		}

		let read_only = match req.action_set {
			Some(set) => set.is_read_only(),
			None => self.load_action_set.map(|set| set.is_read_only()).unwrap_or(true),
		};

		let conn_id = self.next_conn_id;
		self.next_conn_id += 1;
		self.ever_connected = true;

		let sync_step1 = self.document.state_vector();
		let awareness_snapshot = (!self.awareness.is_empty()).then(|| self.awareness.full_snapshot().encode());

		self.connections.insert(conn_id, ConnState::new(req.outbound, req.credential, read_only));
		let _ = reply.send(Ok(ConnectAccepted { conn_id, read_only, sync_step1, awareness_snapshot }));
	}

	async fn handle_message(&mut self, conn_id: ConnectionId, bytes: Vec<u8>) {
		if !self.connections.contains_key(&conn_id) {
			return;
		}
		match Message::decode(&bytes) {
			Ok(Message::Sync(SyncMessage::Step1(remote_sv))) => match self.document.encode_diff(&remote_sv) {
				Ok(diff) => {
					if let Some(conn) = self.connections.get(&conn_id) {
						conn.send(Message::Sync(SyncMessage::Step2(diff)).encode());
					}
				}
				Err(e) => self.note_decode_error(&e),
			},
			Ok(Message::Sync(SyncMessage::Step2(update))) | Ok(Message::Sync(SyncMessage::Update(update))) => {
				self.apply_and_broadcast_update(conn_id, update);
			}
			Ok(Message::Awareness(payload)) => self.handle_awareness(conn_id, payload),
			Err(e) => self.note_decode_error(&e),
		}
	}

	fn apply_and_broadcast_update(&mut self, conn_id: ConnectionId, update: Vec<u8>) {
		let read_only = self.connections.get(&conn_id).map(|c| c.read_only).unwrap_or(true);
		if read_only {
			// Silently dropped: a read-only connection is not granted write
			// access, but a non-conforming client sending one anyway is not
			// a protocol error (§4.3 edge cases).
			return;
		}
		if let Err(e) = self.document.apply_update(&update) {
			self.note_decode_error(&e);
			return;
		}
		let frame = Message::Sync(SyncMessage::Update(update)).encode();
		self.broadcast_except(conn_id, &frame);
	}

	fn handle_awareness(&mut self, conn_id: ConnectionId, payload: Vec<u8>) {
		let update = match AwarenessUpdate::decode(&payload) {
			Ok(update) => update,
			Err(e) => {
				self.note_decode_error(&e);
				return;
			}
		};
		if let Some(conn) = self.connections.get_mut(&conn_id) {
			for item in &update.items {
				if item.state.is_some() && !conn.awareness_ids.contains(&item.client_id) {
					conn.awareness_ids.push(item.client_id);
				}
			}
		}
		self.awareness.apply(&update);
		let frame = Message::Awareness(payload).encode();
		self.broadcast_except(conn_id, &frame);
	}

	fn broadcast_except(&self, except: ConnectionId, frame: &[u8]) {
		for (&id, conn) in &self.connections {
			if id != except {
				conn.send(frame.to_vec());
			}
		}
	}

	fn handle_disconnect(&mut self, conn_id: ConnectionId) {
		let Some(conn) = self.connections.remove(&conn_id) else { return };
		if !conn.awareness_ids.is_empty() {
			let removal = self.awareness.remove_clients(&conn.awareness_ids);
			let frame = Message::Awareness(removal.encode()).encode();
			self.broadcast_except(conn_id, &frame);
		}
	}

	fn handle_invalidate(&mut self) {
		self.close_all();
		self.generation.bump();
	}

	fn close_all(&mut self) {
		for (_, conn) in self.connections.drain() {
			conn.close();
		}
	}

	fn install_observers(&mut self) {
		let tx = self.update_tx.clone();
		self.document.on_update(move |bytes| {
			let _ = tx.send(bytes.to_vec());
		});
	}

	/// Fan-out from the single `SharedDocument` update observer into the
	/// Durable Room Storage snapshot (§4.4.2 #1, synchronous and unconditional)
	/// and the debounced admin write-back (§4.4.2 #2).
	async fn on_doc_update(&mut self, _update_bytes: Vec<u8>) {
		let state = self.document.encode_state();
		if let Err(e) = binder::snapshot(&self.name, state, self.current_etag.clone(), self.storage.as_ref(), self.storage_chunk_size).await {
			warn!("durable snapshot failed for {}: {}", self.name, e);
		}
		self.write_back_timer.notify();
	}

	fn fire_rebuild(&mut self) {
		let Some((html, _)) = self.pending_rebuild.take() else { return };
		if let Err(e) = binder::rebuild(&self.document, &html) {
			warn!("rebuild-from-authoritative-html failed for {}: {}", self.name, e);
			let stack = self.error_stack(&e);
			self.document.record_error(&format!("rebuild failed: {e}"), stack.as_deref());
		}
	}

	async fn fire_write_back(&mut self) {
		self.write_back_timer.fire();
		let creds: Vec<ConnectionCredential<'_>> = self
			.connections
			.values()
			.map(|c| ConnectionCredential { credential: c.credential.as_deref(), read_only: c.read_only })
			.collect();
		let captured = self.generation.current();

		let outcome = binder::write_back(&self.name, &self.document, self.admin.as_ref(), self.last_known_html.as_deref(), &creds).await;
		if !self.generation.is_current(captured) {
			// The room was invalidated while the PUT was in flight; whatever
			// it returned no longer applies to anything.
			return;
		}
		match outcome {
			Ok(binder::WriteBackOutcome::NoOp | binder::WriteBackOutcome::SkippedReadOnly) => {}
			Ok(binder::WriteBackOutcome::Wrote { html, etag }) => {
				self.last_known_html = Some(html);
				self.current_etag = etag;
			}
			Ok(binder::WriteBackOutcome::AuthDenied) => {
				self.document.record_error("admin write-back denied: credential no longer authorized", None);
				self.close_all();
			}
			Ok(binder::WriteBackOutcome::PreconditionFailed) => {
				warn!("write-back precondition failed for {}; wiping durable storage", self.name);
				if let Err(e) = self.storage.delete_all(&self.name).await {
					warn!("failed to wipe storage for {} after 412: {}", self.name, e);
				}
				self.document.record_error("admin write-back failed: stale ETag", None);
				self.close_all();
				self.generation.bump();
			}
			Ok(binder::WriteBackOutcome::Other(status)) => {
				warn!("write-back for {} got unexpected status {}", self.name, status);
				self.document.record_error(&format!("admin write-back failed: unexpected status {status}"), None);
			}
			Err(e) => {
				warn!("write-back error for {}: {}", self.name, e);
				let stack = self.error_stack(&e);
				self.document.record_error(&format!("admin write-back failed: {e}"), stack.as_deref());
			}
		}
	}

	fn note_decode_error(&self, e: &Error) {
		let stack = self.error_stack(e);
		self.document.record_error(&format!("wire protocol decode failed: {e}"), stack.as_deref());
	}

	fn error_stack(&self, e: &Error) -> Option<String> {
		self.return_stack_traces.then(|| format!("{e:?}\n  at collab-room::room ({})", self.name))
	}
}


// vim: ts=4
