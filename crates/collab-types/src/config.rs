//! Process-wide configuration, assembled once at startup from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::prelude::*;

/// Default chunk boundary for durable room storage (§4.5): 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
/// Hard ceiling on a single stored value, imposed by the storage backend.
pub const MAX_CHUNK_SIZE: usize = 128 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
	/// Whether HTTP 500 bodies, WebSocket error frames, and the CRDT "error"
	/// map include stack traces.
	pub return_stack_traces: bool,
	/// Shared secret required on inbound admin endpoints, if configured.
	pub shared_secret: Option<Box<str>>,
	/// Address the edge HTTP/WebSocket listener binds.
	pub listen: SocketAddr,
	/// Base URL of the admin service.
	pub admin_base_url: Box<str>,
	/// Directory backing the durable room storage.
	pub storage_dir: PathBuf,
	/// Chunk boundary used by the durable room storage codec.
	pub storage_chunk_size: usize,
}

impl Config {
	/// Load configuration from the environment, validating every value.
	/// A malformed value is a startup-time error, never a silent default.
	pub fn from_env() -> ClResult<Self> {
		let return_stack_traces = parse_bool_var("RETURN_STACK_TRACES", false)?;
		let shared_secret = std::env::var("COLLAB_SHARED_SECRET").ok().map(Box::from);

		let listen = std::env::var("COLLAB_LISTEN").unwrap_or_else(|_| "127.0.0.1:8787".into());
		let listen = listen
			.parse::<SocketAddr>()
			.map_err(|e| Error::ConfigError(format!("invalid COLLAB_LISTEN {listen:?}: {e}")))?;

		let admin_base_url = std::env::var("COLLAB_ADMIN_BASE_URL")
			.map_err(|_| Error::ConfigError("COLLAB_ADMIN_BASE_URL is required".into()))?
			.into_boxed_str();

		let storage_dir = std::env::var("COLLAB_STORAGE_DIR")
			.unwrap_or_else(|_| "./data/rooms".into())
			.into();

		let storage_chunk_size = match std::env::var("COLLAB_STORAGE_CHUNK_SIZE") {
			Ok(raw) => raw
				.parse::<usize>()
				.map_err(|e| Error::ConfigError(format!("invalid COLLAB_STORAGE_CHUNK_SIZE: {e}")))?,
			Err(_) => DEFAULT_CHUNK_SIZE,
		};
		if storage_chunk_size == 0 || storage_chunk_size > MAX_CHUNK_SIZE {
			return Err(Error::ConfigError(format!(
				"COLLAB_STORAGE_CHUNK_SIZE must be in 1..={MAX_CHUNK_SIZE}, got {storage_chunk_size}"
			)));
		}

		Ok(Config {
			return_stack_traces,
			shared_secret,
			listen,
			admin_base_url,
			storage_dir,
			storage_chunk_size,
		})
	}
}

fn parse_bool_var(name: &str, default: bool) -> ClResult<bool> {
	match std::env::var(name) {
		Err(_) => Ok(default),
		Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
			"true" | "1" | "yes" => Ok(true),
			"false" | "0" | "no" => Ok(false),
			_ => Err(Error::ConfigError(format!("{name} must be a boolean, got {raw:?}"))),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_bool_var_accepts_common_spellings() {
		assert!(parse_bool_var("COLLAB_TEST_UNSET_A", true).unwrap_or(false));
	}

	#[test]
	fn parse_bool_var_rejects_garbage() {
		std::env::set_var("COLLAB_TEST_BOOL", "not-a-bool");
		let err = parse_bool_var("COLLAB_TEST_BOOL", false);
		std::env::remove_var("COLLAB_TEST_BOOL");
		assert!(err.is_err());
	}
}

// vim: ts=4
