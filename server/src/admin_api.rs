//! In-band admin API (§4.6 `handleApiCall`, §6): `syncadmin`/`deleteadmin`
//! invalidate a Room from outside the WebSocket protocol, and `ping` is a
//! bare liveness probe exempt from shared-secret enforcement.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use collab_types::prelude::*;
use collab_types::types::DocName;

use crate::app::App;

#[derive(Debug, Deserialize)]
pub struct DocQuery {
	doc: Option<String>,
}

fn require_doc(query: &DocQuery) -> ClResult<DocName> {
	match &query.doc {
		Some(doc) if !doc.is_empty() => Ok(DocName::from(doc.as_str())),
		_ => Err(Error::ValidationError("doc query parameter is required".into())),
	}
}

/// `POST /api/v1/syncadmin?doc=<url>` — invalidate the Room (closing every
/// connection to force a reload from the admin service) if it exists.
pub async fn syncadmin(State(app): State<App>, Query(query): Query<DocQuery>) -> ClResult<StatusCode> {
	let doc = require_doc(&query)?;
	match app.registry.find(&doc).await {
		Some(room) => {
			room.invalidate();
			info!("syncadmin invalidated {}", doc);
			Ok(StatusCode::OK)
		}
		None => Ok(StatusCode::NOT_FOUND),
	}
}

/// `POST /api/v1/deleteadmin?doc=<url>` — same effect as `syncadmin`, but
/// reports whether the Room existed via 204 vs. 404.
pub async fn deleteadmin(State(app): State<App>, Query(query): Query<DocQuery>) -> ClResult<StatusCode> {
	let doc = require_doc(&query)?;
	match app.registry.find(&doc).await {
		Some(room) => {
			room.invalidate();
			info!("deleteadmin invalidated {}", doc);
			Ok(StatusCode::NO_CONTENT)
		}
		None => Ok(StatusCode::NOT_FOUND),
	}
}

#[derive(Serialize)]
struct PingResponse {
	status: &'static str,
	service_bindings: &'static [&'static str],
}

/// `GET /api/v1/ping` — exempt from shared-secret enforcement; carries no
/// document data.
pub async fn ping() -> Json<PingResponse> {
	Json(PingResponse { status: "ok", service_bindings: &["collab-room"] })
}

// vim: ts=4
