//! Router composition: the WebSocket upgrade endpoint, the in-band admin
//! API (shared-secret gated), and the ungated `ping` probe.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::{admin_api, middleware as collab_middleware, websocket};

pub fn init(app: App) -> Router {
	let admin_router = Router::new()
		.route("/api/v1/syncadmin", post(admin_api::syncadmin))
		.route("/api/v1/deleteadmin", post(admin_api::deleteadmin))
		.route_layer(middleware::from_fn_with_state(app.clone(), collab_middleware::require_shared_secret));

	let ping_router = Router::new().route("/api/v1/ping", get(admin_api::ping));

	let ws_router = Router::new()
		.route("/ws", get(websocket::upgrade))
		.route("/ws/{*doc}", get(websocket::upgrade_path));

	Router::new()
		.merge(admin_router)
		.merge(ping_router)
		.merge(ws_router)
		.layer(CorsLayer::very_permissive())
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

// vim: ts=4
