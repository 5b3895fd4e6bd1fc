//! Shared-secret enforcement for the inbound admin API (§6).
//!
//! `COLLAB_SHARED_SECRET`, when configured, gates `syncadmin`/`deleteadmin`
//! behind `Authorization: token <secret>` — a literal `token` scheme, not
//! this stack's usual `Bearer`, because this header authenticates the admin
//! caller rather than an end user. `ping` never passes through this layer.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use collab_types::prelude::*;

use crate::app::App;

pub async fn require_shared_secret(State(app): State<App>, req: Request, next: Next) -> ClResult<Response> {
	let Some(expected) = &app.shared_secret else {
		return Ok(next.run(req).await);
	};

	let presented = req
		.headers()
		.get(axum::http::header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("token "));

	if presented != Some(expected.as_ref()) {
		return Err(Error::Unauthorized);
	}

	Ok(next.run(req).await)
}

// vim: ts=4
