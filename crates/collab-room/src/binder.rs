//! The Persistence Binder (§4.4): load protocol plus write-back protocol.
//!
//! Kept as plain functions over explicit state rather than a struct with
//! its own fields, so the Room actor (§4.6) — the only caller — stays the
//! single place that owns the document, the connection map, and the
//! current ETag/last-known-HTML across suspension points.

use collab_crdt::SharedDocument;
use collab_types::prelude::*;
use collab_types::storage::{self, PersistenceInterface, ReadOutcome};

use crate::admin_client::{AdminClient, GetOutcome, PutOutcome};

/// What the Load Protocol (§4.4.1) learned, for the Room to fold into its
/// own state.
pub struct LoadResult {
	/// The action set observed during the admin GET, if one happened
	/// (absent on a pure 304-from-cache restore).
	pub action_set: Option<ActionSet>,
	pub current_etag: Option<Box<str>>,
	pub last_known_html: Option<Box<str>>,
	/// Non-`None` when the Document must be rebuilt from authoritative HTML
	/// after the ~1s grace delay (§4.4.1 step 4).
	pub pending_rebuild_html: Option<Box<str>>,
}

/// Run the Load Protocol once for a Room. A non-2xx, non-304 admin response
/// is a fatal load error — the Room must be torn down by the caller.
pub async fn load(
	doc_name: &DocName,
	document: &SharedDocument,
	storage: &dyn PersistenceInterface,
	admin: &dyn AdminClient,
	credential: Option<&str>,
) -> ClResult<LoadResult> {
	let record = storage.list(doc_name).await.unwrap_or_else(|e| {
		warn!("durable storage read failed for {}: {}; treating as absent", doc_name, e);
		storage::ChunkedRecord::default()
	});

	let (stored_state, stored_etag) = match storage::reassemble(&record, doc_name) {
		ReadOutcome::Absent => (None, None),
		ReadOutcome::Mismatched => {
			warn!("stored doc tag mismatch for {}; wiping", doc_name);
			if let Err(e) = storage.delete_all(doc_name).await {
				warn!("failed to wipe mismatched storage for {}: {}", doc_name, e);
			}
			(None, None)
		}
		ReadOutcome::Present { state, etag } => (Some(state), etag),
	};

	let outcome = admin.get(doc_name, credential, stored_etag.as_deref()).await?;

	match outcome {
		GetOutcome::NotModified => {
			if let Some(state) = &stored_state {
				document.apply_update(state)?;
			}
			Ok(LoadResult {
				action_set: None,
				current_etag: stored_etag,
				last_known_html: None,
				pending_rebuild_html: None,
			})
		}
		GetOutcome::Modified { html, etag, actions } => {
			let mut restored = false;
			if let Some(state) = &stored_state {
				document.apply_update(state)?;
				let rendered = collab_html::to_html(document)?;
				restored = rendered.as_ref() == html.as_ref();
			}
			let pending_rebuild_html = if restored { None } else { Some(html.clone()) };
			Ok(LoadResult {
				action_set: Some(actions),
				current_etag: etag,
				last_known_html: Some(html),
				pending_rebuild_html,
			})
		}
	}
}

/// Run the ~1s-delayed rebuild (§4.4.1 step 4): clear every root slot and
/// re-run the HTML->tree conversion on the authoritative body.
pub fn rebuild(document: &SharedDocument, authoritative_html: &str) -> ClResult<()> {
	collab_html::to_tree(authoritative_html, document)
}

/// A connection's contribution to a write-back PUT: its credential (if
/// any) and whether it is read-only.
pub struct ConnectionCredential<'a> {
	pub credential: Option<&'a str>,
	pub read_only: bool,
}

pub enum WriteBackOutcome {
	/// Rendered HTML is unchanged since the last successful write-back.
	NoOp,
	/// Every connection is read-only; the PUT was skipped (§4.4.2 step c).
	SkippedReadOnly,
	Wrote { html: Box<str>, etag: Option<Box<str>> },
	AuthDenied,
	PreconditionFailed,
	Other(u16),
}

/// Run one debounced firing of the Admin Write-Back Observer (§4.4.2 #2).
pub async fn write_back(
	doc_name: &DocName,
	document: &SharedDocument,
	admin: &dyn AdminClient,
	last_known_html: Option<&str>,
	connections: &[ConnectionCredential<'_>],
) -> ClResult<WriteBackOutcome> {
	let html = collab_html::to_html(document)?;
	if last_known_html == Some(html.as_ref()) {
		return Ok(WriteBackOutcome::NoOp);
	}

	let mut creds: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
	for conn in connections {
		if !conn.read_only {
			if let Some(cred) = conn.credential {
				creds.insert(cred);
			}
		}
	}
	let all_read_only = connections.iter().all(|c| c.read_only);
	if all_read_only {
		return Ok(WriteBackOutcome::SkippedReadOnly);
	}
	let authorization = if creds.is_empty() { None } else { Some(creds.into_iter().collect::<Vec<_>>().join(",")) };

	match admin.put(doc_name, &html, authorization.as_deref()).await? {
		PutOutcome::Ok { etag } => Ok(WriteBackOutcome::Wrote { html: html.into_boxed_str(), etag }),
		PutOutcome::AuthDenied => Ok(WriteBackOutcome::AuthDenied),
		PutOutcome::PreconditionFailed => Ok(WriteBackOutcome::PreconditionFailed),
		PutOutcome::Other(status) => Ok(WriteBackOutcome::Other(status)),
	}
}

/// Synchronously encode and durably snapshot the current CRDT state
/// (§4.4.2 #1), preserving whatever ETag is already current.
pub async fn snapshot(
	doc_name: &DocName,
	state: Vec<u8>,
	current_etag: Option<Box<str>>,
	storage: &dyn PersistenceInterface,
	chunk_size: usize,
) -> ClResult<()> {
	let record = storage::chunk(doc_name, &state, current_etag, chunk_size)?;
	storage.put(doc_name, record).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::admin_client::fake::FakeAdminClient;
	use collab_types::storage::ChunkedRecord;
	use std::collections::BTreeMap;
	use std::sync::Mutex;

	struct MemStorage(Mutex<BTreeMap<Box<str>, ChunkedRecord>>);

	impl MemStorage {
		fn new() -> Self {
			Self(Mutex::new(BTreeMap::new()))
		}
	}

	#[async_trait::async_trait]
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

	fn name() -> DocName {
		DocName::from("https://admin.da.live/source/a.html")
	}

	#[tokio::test]
	async fn cold_load_seeds_from_authoritative_html_and_schedules_rebuild() {
		let doc = SharedDocument::new();
		let storage = MemStorage::new();
		let admin = FakeAdminClient::new();
		admin.get_responses.lock().unwrap_or_else(|e| e.into_inner()).push(Ok(GetOutcome::Modified {
			html: Box::from("<body><main><p>Hi</p></main></body>"),
			etag: Some(Box::from("v1")),
			actions: ActionSet { read: true, write: true },
		}));

		let result = load(&name(), &doc, &storage, &admin, Some("token")).await.expect("load");
		assert_eq!(result.current_etag.as_deref(), Some("v1"));
		assert!(result.pending_rebuild_html.is_some());
		assert!(!result.action_set.expect("actions").is_read_only());
	}

	#[tokio::test]
	async fn not_modified_restores_from_stored_state_without_rebuild() {
		let seed = SharedDocument::new();
		collab_html::to_tree("<body><main><p>Hi</p></main></body>", &seed).expect("seed");
		let state = seed.encode_state();

		let doc = SharedDocument::new();
		let storage = MemStorage::new();
		let record = storage::chunk(&name(), &state, Some(Box::from("v1")), 64 * 1024).expect("chunk");
		storage.put(&name(), record).await.expect("put");

		let admin = FakeAdminClient::new();
		admin.get_responses.lock().unwrap_or_else(|e| e.into_inner()).push(Ok(GetOutcome::NotModified));

		let result = load(&name(), &doc, &storage, &admin, None).await.expect("load");
		assert_eq!(result.current_etag.as_deref(), Some("v1"));
		assert!(result.pending_rebuild_html.is_none());
	}

	#[tokio::test]
	async fn write_back_is_a_noop_when_html_is_unchanged() {
		let doc = SharedDocument::new();
		collab_html::to_tree("<body><main><p>Hi</p></main></body>", &doc).expect("seed");
		let html = collab_html::to_html(&doc).expect("render");
		let admin = FakeAdminClient::new();

		let outcome = write_back(&name(), &doc, &admin, Some(&html), &[]).await.expect("write_back");
		assert!(matches!(outcome, WriteBackOutcome::NoOp));
	}

	#[tokio::test]
	async fn write_back_skips_put_when_all_connections_read_only() {
		let doc = SharedDocument::new();
		collab_html::to_tree("<body><main><p>Hi</p></main></body>", &doc).expect("seed");
		let admin = FakeAdminClient::new();
		let conns = [ConnectionCredential { credential: Some("tok"), read_only: true }];

		let outcome = write_back(&name(), &doc, &admin, None, &conns).await.expect("write_back");
		assert!(matches!(outcome, WriteBackOutcome::SkippedReadOnly));
		assert!(admin.put_calls.lock().unwrap_or_else(|e| e.into_inner()).is_empty());
	}

	#[tokio::test]
	async fn write_back_puts_with_deduplicated_credentials() {
		let doc = SharedDocument::new();
		collab_html::to_tree("<body><main><p>Hi</p></main></body>", &doc).expect("seed");
		let admin = FakeAdminClient::new();
		admin
			.put_responses
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(Ok(PutOutcome::Ok { etag: Some(Box::from("v2")) }));
		let conns = [
			ConnectionCredential { credential: Some("tok-a"), read_only: false },
			ConnectionCredential { credential: Some("tok-a"), read_only: false },
			ConnectionCredential { credential: None, read_only: true },
		];

		let outcome = write_back(&name(), &doc, &admin, None, &conns).await.expect("write_back");
		match outcome {
			WriteBackOutcome::Wrote { etag, .. } => assert_eq!(etag.as_deref(), Some("v2")),
			_ => panic!("expected Wrote"),
		}
		assert_eq!(admin.put_calls.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
	}
}

// vim: ts=4
