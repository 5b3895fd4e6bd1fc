//! Edge Dispatcher library: the HTTP/WebSocket surface around the Room
//! Registry (§4.6, §6). Split from `main.rs` so integration tests can build
//! the same router the binary serves, the way the teacher's own server
//! package separates its library surface from its thin binary entry point.

pub mod admin_api;
pub mod app;
pub mod middleware;
pub mod routes;
pub mod websocket;

use std::sync::Arc;

use collab_room::{HttpAdminClient, Registry, RoomConfig};
use collab_room_storage_redb::RedbRoomStorage;
use collab_types::config::Config;
use collab_types::prelude::*;

/// Load configuration, wire the Room Registry to its adapters, bind, and
/// serve until the process is terminated. The sole caller is `main.rs`.
pub async fn run() -> ClResult<()> {
	collab_core::logging::init();

	info!("---------------------------------------------");
	info!(" collab-room-server v{}", env!("CARGO_PKG_VERSION"));
	info!("---------------------------------------------");

	let config = Config::from_env().map_err(|e| {
		error!("FATAL: configuration error: {}", e);
		e
	})?;

	let storage_path = config.storage_dir.join("rooms.redb");
	let storage = RedbRoomStorage::open(&storage_path).map_err(|e| {
		error!("FATAL: cannot open durable room storage at {}: {}", storage_path.display(), e);
		e
	})?;

	let admin = HttpAdminClient::new().map_err(|e| {
		error!("FATAL: cannot build admin service client: {}", e);
		e
	})?;

	let registry = Registry::new(RoomConfig {
		admin: Arc::new(admin),
		storage: Arc::new(storage),
		storage_chunk_size: config.storage_chunk_size,
		return_stack_traces: config.return_stack_traces,
	});

	let state: app::App = Arc::new(app::AppState::new(registry, &config));
	let router = routes::init(state);

	let listener = tokio::net::TcpListener::bind(config.listen).await.map_err(|e| {
		error!("FATAL: cannot bind {}: {}", config.listen, e);
		Error::from(e)
	})?;
	info!("Listening on {}", config.listen);
	info!("Admin service: {}", config.admin_base_url);

	axum::serve(listener, router).await.map_err(Error::from)?;
	Ok(())
}

// vim: ts=4
