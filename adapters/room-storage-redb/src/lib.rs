//! A `redb`-backed `PersistenceInterface` (§4.5): the shipped durable room
//! storage backend.
//!
//! Grounded in the same redb access pattern the CRDT adapter in this stack
//! uses elsewhere — a cached `redb::Database` handle, `TableDefinition`
//! constants, and a collect-keys-then-remove pass for bulk deletion (redb's
//! tables don't support deleting by range in one call). Unlike that adapter
//! this one needs no per-document in-memory cache: the Room above it is
//! already the single place that serializes access to one document's state,
//! so every call here is a one-shot transaction.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use collab_types::prelude::*;
use collab_types::storage::{ChunkedRecord, PersistenceInterface};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

/// Small record metadata: everything about a `ChunkedRecord` except the
/// bulk bytes, which live in their own tables so a cold read of just the
/// ETag never has to touch the (possibly large) document body.
#[derive(Serialize, Deserialize)]
struct RecordMeta {
	doc: Option<Box<str>>,
	chunks: Option<u32>,
	etag: Option<Box<str>>,
}

const TABLE_META: TableDefinition<&str, &str> = TableDefinition::new("room_meta");
const TABLE_DOCSTORE: TableDefinition<&str, &[u8]> = TableDefinition::new("room_docstore");
const TABLE_CHUNKS: TableDefinition<&str, &[u8]> = TableDefinition::new("room_chunks");

fn chunk_key(doc: &str, index: u32) -> String {
	format!("{doc}\u{1}{index:03}")
}

fn chunk_prefix(doc: &str) -> String {
	format!("{doc}\u{1}")
}

/// A `PersistenceInterface` backed by a single `redb` database file holding
/// every Room's durable state.
pub struct RedbRoomStorage {
	db: Database,
}

impl RedbRoomStorage {
	/// Open (creating if absent) the database file at `path`, along with its
	/// parent directory and its three tables.
	pub fn open(path: impl AsRef<Path>) -> ClResult<Self> {
		let path: PathBuf = path.as_ref().to_path_buf();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let db = Database::create(&path)?;
		let tx = db.begin_write()?;
		let _ = tx.open_table(TABLE_META)?;
		let _ = tx.open_table(TABLE_DOCSTORE)?;
		let _ = tx.open_table(TABLE_CHUNKS)?;
		tx.commit()?;
		info!("durable room storage opened at {}", path.display());
		Ok(Self { db })
	}
}

#[async_trait]
impl PersistenceInterface for RedbRoomStorage {
	async fn list(&self, doc: &DocName) -> ClResult<ChunkedRecord> {
		let tx = self.db.begin_read()?;
		let meta_table = tx.open_table(TABLE_META)?;
		let Some(meta_json) = meta_table.get(doc.as_str())? else {
			return Ok(ChunkedRecord::default());
		};
		let meta: RecordMeta = serde_json::from_str(meta_json.value())?;

		let docstore_table = tx.open_table(TABLE_DOCSTORE)?;
		let docstore = docstore_table.get(doc.as_str())?.map(|v| v.value().to_vec());

		let mut chunk_values = std::collections::BTreeMap::new();
		if meta.chunks.is_some() {
			let chunks_table = tx.open_table(TABLE_CHUNKS)?;
			let prefix = chunk_prefix(doc.as_str());
			let range = chunks_table.range(prefix.as_str()..)?;
			for item in range {
				let (key, value) = item?;
				let key_str = key.value();
				let Some(suffix) = key_str.strip_prefix(&prefix) else { break };
				let Ok(index) = suffix.parse::<u32>() else { continue };
				chunk_values.insert(index, value.value().to_vec());
			}
		}

		Ok(ChunkedRecord { doc: meta.doc, docstore, chunks: meta.chunks, chunk_values, etag: meta.etag })
	}

	async fn put(&self, doc: &DocName, record: ChunkedRecord) -> ClResult<()> {
		self.delete_all(doc).await?;

		let tx = self.db.begin_write()?;
		{
			if let Some(docstore) = &record.docstore {
				let mut table = tx.open_table(TABLE_DOCSTORE)?;
				table.insert(doc.as_str(), docstore.as_slice())?;
			}
			if !record.chunk_values.is_empty() {
				let mut table = tx.open_table(TABLE_CHUNKS)?;
				for (index, bytes) in &record.chunk_values {
					table.insert(chunk_key(doc.as_str(), *index).as_str(), bytes.as_slice())?;
				}
			}
			let meta = RecordMeta { doc: record.doc, chunks: record.chunks, etag: record.etag };
			let meta_json = serde_json::to_string(&meta)?;
			let mut meta_table = tx.open_table(TABLE_META)?;
			meta_table.insert(doc.as_str(), meta_json.as_str())?;
		}
		tx.commit()?;
		Ok(())
	}

	async fn delete_all(&self, doc: &DocName) -> ClResult<()> {
		let tx = self.db.begin_write()?;
		{
			let mut meta_table = tx.open_table(TABLE_META)?;
			meta_table.remove(doc.as_str())?;

			let mut docstore_table = tx.open_table(TABLE_DOCSTORE)?;
			docstore_table.remove(doc.as_str())?;

			let mut chunks_table = tx.open_table(TABLE_CHUNKS)?;
			let prefix = chunk_prefix(doc.as_str());
			let mut keys_to_delete = Vec::new();
			{
				let range = chunks_table.range(prefix.as_str()..)?;
				for item in range {
					let (key, _) = item?;
					let key_str = key.value();
					if !key_str.starts_with(&prefix) {
						break;
					}
					keys_to_delete.push(key_str.to_string());
				}
			}
			for key in keys_to_delete {
				chunks_table.remove(key.as_str())?;
			}
		}
		tx.commit()?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use collab_types::storage::{self, ReadOutcome};

	fn name() -> DocName {
		DocName::from("https://admin.da.live/source/a.html")
	}

	#[tokio::test]
	async fn round_trips_an_unchunked_record() {
		let dir = tempfile::tempdir().expect("tempdir");
		let storage = RedbRoomStorage::open(dir.path().join("rooms.redb")).expect("open");

		let record = storage::chunk(&name(), b"hello world", Some(Box::from("v1")), 64 * 1024).expect("chunk");
		storage.put(&name(), record).await.expect("put");

		let got = storage.list(&name()).await.expect("list");
		match storage::reassemble(&got, &name()) {
			ReadOutcome::Present { state, etag } => {
				assert_eq!(state, b"hello world");
				assert_eq!(etag.as_deref(), Some("v1"));
			}
			_ => panic!("expected Present"),
		}
	}

	#[tokio::test]
	async fn round_trips_a_chunked_record() {
		let dir = tempfile::tempdir().expect("tempdir");
		let storage = RedbRoomStorage::open(dir.path().join("rooms.redb")).expect("open");

		let state: Vec<u8> = (0..500u32).flat_map(u32::to_le_bytes).collect();
		let record = storage::chunk(&name(), &state, Some(Box::from("v2")), 37).expect("chunk");
		assert!(record.chunks.is_some());
		storage.put(&name(), record).await.expect("put");

		let got = storage.list(&name()).await.expect("list");
		match storage::reassemble(&got, &name()) {
			ReadOutcome::Present { state: got_state, .. } => assert_eq!(got_state, state),
			_ => panic!("expected Present"),
		}
	}

	#[tokio::test]
	async fn delete_all_wipes_every_table() {
		let dir = tempfile::tempdir().expect("tempdir");
		let storage = RedbRoomStorage::open(dir.path().join("rooms.redb")).expect("open");

		let record = storage::chunk(&name(), b"hi", None, 64 * 1024).expect("chunk");
		storage.put(&name(), record).await.expect("put");
		storage.delete_all(&name()).await.expect("delete_all");

		let got = storage.list(&name()).await.expect("list");
		assert!(got.is_empty());
	}

	#[tokio::test]
	async fn put_overwrites_a_previous_chunked_record_with_an_unchunked_one() {
		let dir = tempfile::tempdir().expect("tempdir");
		let storage = RedbRoomStorage::open(dir.path().join("rooms.redb")).expect("open");

		let big: Vec<u8> = (0..500u32).flat_map(u32::to_le_bytes).collect();
		let chunked = storage::chunk(&name(), &big, None, 37).expect("chunk");
		storage.put(&name(), chunked).await.expect("put chunked");

		let small = storage::chunk(&name(), b"small", None, 64 * 1024).expect("chunk");
		storage.put(&name(), small).await.expect("put small");

		let got = storage.list(&name()).await.expect("list");
		assert!(got.chunk_values.is_empty(), "stale chunks from the prior write must not linger");
		match storage::reassemble(&got, &name()) {
			ReadOutcome::Present { state, .. } => assert_eq!(state, b"small"),
			_ => panic!("expected Present"),
		}
	}
}

// vim: ts=4
