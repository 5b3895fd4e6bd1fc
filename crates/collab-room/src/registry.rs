//! Room Registry (§4.6, §9): name -> Room routing and admin-triggered
//! invalidation dispatch.
//!
//! Encapsulated as an injected service rather than a global mutable map, so
//! tests can construct a fresh `Registry` per test (§9 avoided pattern).

use std::collections::HashMap;
use std::sync::Arc;

use collab_types::prelude::*;
use collab_types::storage::PersistenceInterface;
use tokio::sync::RwLock;

use crate::admin_client::SharedAdminClient;
use crate::room::{RoomHandle, spawn_room};

/// Settings the Registry threads through to every Room it creates.
#[derive(Clone)]
pub struct RoomConfig {
	pub admin: SharedAdminClient,
	pub storage: Arc<dyn PersistenceInterface>,
	pub storage_chunk_size: usize,
	pub return_stack_traces: bool,
}

/// Process-wide (but injected) map from document name to its live Room.
/// Writes are serialized through an async `RwLock`; reads may be concurrent.
pub struct Registry {
	rooms: RwLock<HashMap<DocName, RoomHandle>>,
	config: RoomConfig,
}

impl Registry {
	/// Always lives behind an `Arc`: each Room it spawns is handed a clone of
	/// that `Arc` so it can deregister itself on teardown (§3 Room: "destroyed
	/// when its last Connection closes or when an admin invalidation arrives")
	/// without the Registry needing to track or poll its Rooms itself.
	pub fn new(config: RoomConfig) -> Arc<Self> {
		Arc::new(Self { rooms: RwLock::new(HashMap::new()), config })
	}

	/// Look up the live Room for `name`, creating and registering one
	/// lazily if none exists yet (§3 Room: "Created lazily on first
	/// connect").
	pub async fn get_or_create(self: &Arc<Self>, name: &DocName) -> RoomHandle {
		if let Some(handle) = self.rooms.read().await.get(name) {
			if !handle.is_dead() {
				return handle.clone();
			}
		}
		let mut rooms = self.rooms.write().await;
		if let Some(handle) = rooms.get(name) {
			if !handle.is_dead() {
				return handle.clone();
			}
		}
		let handle = spawn_room(name.clone(), self.config.clone(), Arc::clone(self));
		rooms.insert(name.clone(), handle.clone());
		handle
	}

	/// Look up a live Room without creating one, for the in-band admin
	/// API (`syncAdmin`/`deleteAdmin`), which must 404 when the Room does
	/// not already exist.
	pub async fn find(&self, name: &DocName) -> Option<RoomHandle> {
		let handle = self.rooms.read().await.get(name).cloned()?;
		(!handle.is_dead()).then_some(handle)
	}

	/// Remove `name` from the map if `handle` is still the registered
	/// occupant. Called by a Room's own teardown path and by admin
	/// invalidation; a stale remove (the name was already replaced by a
	/// newer Room) is a no-op.
	pub async fn remove(&self, name: &DocName, handle: &RoomHandle) {
		let mut rooms = self.rooms.write().await;
		if let Some(current) = rooms.get(name) {
			if current.same_room(handle) {
				rooms.remove(name);
			}
		}
	}
}


// vim: ts=4
