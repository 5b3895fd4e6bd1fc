//! Fakes used to stand up a real `axum::Router` in integration tests
//! without a live admin service or durable storage backend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use collab_room::{AdminClient, GetOutcome, PutOutcome};
use collab_types::prelude::*;
use collab_types::storage::{ChunkedRecord, PersistenceInterface};

/// A scripted admin client: every test that needs one schedules its
/// responses up front, same pattern as `collab_room`'s own `FakeAdminClient`
/// test double (not reusable here since it is private to that crate).
#[derive(Default)]
pub struct FakeAdminClient {
	pub get_responses: Mutex<Vec<ClResult<GetOutcome>>>,
	pub put_responses: Mutex<Vec<ClResult<PutOutcome>>>,
}

impl FakeAdminClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push_get(&self, outcome: GetOutcome) {
		self.get_responses.lock().unwrap_or_else(|e| e.into_inner()).push(Ok(outcome));
	}
}

#[async_trait]
impl AdminClient for FakeAdminClient {
	async fn get(&self, _doc: &DocName, _credential: Option<&str>, _if_none_match: Option<&str>) -> ClResult<GetOutcome> {
		let mut responses = self.get_responses.lock().unwrap_or_else(|e| e.into_inner());
		if responses.is_empty() {
			return Err(Error::AdminUnavailable("no scripted GET response".into()));
		}
		responses.remove(0)
	}

	async fn put(&self, _doc: &DocName, _html: &str, _authorization: Option<&str>) -> ClResult<PutOutcome> {
		let mut responses = self.put_responses.lock().unwrap_or_else(|e| e.into_inner());
		if responses.is_empty() {
			return Err(Error::AdminUnavailable("no scripted PUT response".into()));
		}
		responses.remove(0)
	}
}

/// An in-memory stand-in for the durable room storage adapter.
#[derive(Default)]
pub struct MemStorage(Mutex<BTreeMap<Box<str>, ChunkedRecord>>);

impl MemStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl PersistenceInterface for MemStorage {
	async fn list(&self, doc: &DocName) -> ClResult<ChunkedRecord> {
		Ok(self.0.lock().unwrap_or_else(|e| e.into_inner()).get(doc.as_str()).cloned().unwrap_or_default())
	}

	async fn put(&self, doc: &DocName, record: ChunkedRecord) -> ClResult<()> {
		self.0.lock().unwrap_or_else(|e| e.into_inner()).insert(Box::from(doc.as_str()), record);
		Ok(())
	}

	async fn delete_all(&self, doc: &DocName) -> ClResult<()> {
		self.0.lock().unwrap_or_else(|e| e.into_inner()).remove(doc.as_str());
		Ok(())
	}
}

/// Build a router backed by fresh fakes, optionally gated by a shared secret
/// (§6 Configuration: `COLLAB_SHARED_SECRET`).
pub fn test_router(shared_secret: Option<&str>) -> axum::Router {
	let registry = collab_room::Registry::new(collab_room::RoomConfig {
		admin: Arc::new(FakeAdminClient::new()),
		storage: Arc::new(MemStorage::new()),
		storage_chunk_size: 64 * 1024,
		return_stack_traces: false,
	});
	let state: collab_room_server::app::App = Arc::new(collab_room_server::app::AppState {
		registry,
		shared_secret: shared_secret.map(Box::from),
		return_stack_traces: false,
	});
	collab_room_server::routes::init(state)
}
