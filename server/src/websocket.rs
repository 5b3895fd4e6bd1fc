//! WebSocket upgrade handler (§4.6, §6): resolves the document name, runs
//! the Room's connect handshake to completion *before* ever upgrading the
//! socket (so a binder failure comes back as a clean HTTP 500, never a
//! WebSocket that opens and immediately closes), then forwards frames
//! between the real socket and the Room's mailbox for the connection's
//! lifetime.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use collab_crdt::codec::{Message, SyncMessage};
use collab_room::{ConnectRequest, OutboundMsg, RoomHandle};
use collab_types::extract::{ActionSetHeader, Credential};
use collab_types::prelude::*;

use crate::app::App;

#[derive(Debug, Default, Deserialize)]
pub struct DocQuery {
	doc: Option<String>,
}

/// `/ws/{*doc}` — the document URL rides in the path.
pub async fn upgrade_path(
	ws: WebSocketUpgrade,
	State(app): State<App>,
	Path(doc): Path<String>,
	Query(query): Query<DocQuery>,
	Credential(credential): Credential,
	ActionSetHeader(action_set): ActionSetHeader,
	headers: HeaderMap,
) -> Response {
	serve(ws, app, Some(doc), query, credential, action_set, &headers).await
}

/// `/ws` — the document URL rides in `X-collab-room` or the `doc` query
/// parameter instead.
pub async fn upgrade(
	ws: WebSocketUpgrade,
	State(app): State<App>,
	Query(query): Query<DocQuery>,
	Credential(credential): Credential,
	ActionSetHeader(action_set): ActionSetHeader,
	headers: HeaderMap,
) -> Response {
	serve(ws, app, None, query, credential, action_set, &headers).await
}

fn resolve_doc_name(path: Option<&str>, query: &DocQuery, headers: &HeaderMap) -> ClResult<DocName> {
	if let Some(path) = path {
		if !path.is_empty() {
			return Ok(DocName::from(path));
		}
	}
	if let Some(header) = headers.get("x-collab-room").and_then(|v| v.to_str().ok()) {
		return Ok(DocName::from(header));
	}
	if let Some(doc) = &query.doc {
		if !doc.is_empty() {
			return Ok(DocName::from(doc.as_str()));
		}
	}
	Err(Error::ValidationError("no document URL in the path, X-collab-room, or the doc query parameter".into()))
}

/// The credential riding in `Sec-WebSocket-Protocol: yjs, <credential>`, for
/// clients (browsers) that cannot set an `Authorization` header on the
/// handshake request.
fn subprotocol_credential(headers: &HeaderMap) -> Option<Box<str>> {
	let raw = headers.get(axum::http::header::SEC_WEBSOCKET_PROTOCOL).and_then(|v| v.to_str().ok())?;
	raw.split(',').map(str::trim).find(|p| *p != "yjs" && !p.is_empty()).map(Box::from)
}

#[allow(clippy::too_many_arguments)]
async fn serve(
	ws: WebSocketUpgrade,
	app: App,
	path_doc: Option<String>,
	query: DocQuery,
	header_credential: Option<Box<str>>,
	action_set: Option<ActionSet>,
	headers: &HeaderMap,
) -> Response {
	let doc_name = match resolve_doc_name(path_doc.as_deref(), &query, headers) {
		Ok(name) => name,
		Err(e) => return e.into_response(),
	};
	let credential = header_credential.or_else(|| subprotocol_credential(headers));
	let offered_protocol = headers.get(axum::http::header::SEC_WEBSOCKET_PROTOCOL).and_then(|v| v.to_str().ok()).unwrap_or("");
	let negotiated = collab_room::select_subprotocol(offered_protocol);

	let room = app.registry.get_or_create(&doc_name).await;
	let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
	let accepted = match room.connect(ConnectRequest { credential, action_set, outbound: outbound_tx }).await {
		Ok(accepted) => accepted,
		Err(e) => {
			warn!("connect failed for {}: {}", doc_name, e);
			return e.into_response_with_stack(app.return_stack_traces);
		}
	};

	let ws = match negotiated {
		Some(protocol) => ws.protocols([protocol]),
		None => ws,
	};
	info!("websocket connected: doc={} conn_id={} read_only={}", doc_name, accepted.conn_id, accepted.read_only);
	ws.on_upgrade(move |socket| run_connection(socket, room, accepted, outbound_rx))
}

async fn run_connection(
	socket: WebSocket,
	room: RoomHandle,
	accepted: collab_room::ConnectAccepted,
	mut outbound_rx: mpsc::UnboundedReceiver<OutboundMsg>,
) {
	let (mut sink, mut stream) = socket.split();

	let step1 = Message::Sync(SyncMessage::Step1(accepted.sync_step1)).encode();
	if sink.send(WsMessage::Binary(step1.into())).await.is_err() {
		room.disconnect(accepted.conn_id);
		return;
	}
	if let Some(snapshot) = accepted.awareness_snapshot {
		let frame = Message::Awareness(snapshot).encode();
		if sink.send(WsMessage::Binary(frame.into())).await.is_err() {
			room.disconnect(accepted.conn_id);
			return;
		}
	}

	loop {
		tokio::select! {
			inbound = stream.next() => {
				match inbound {
					Some(Ok(WsMessage::Binary(bytes))) => room.message(accepted.conn_id, bytes.to_vec()),
					Some(Ok(WsMessage::Close(_))) | None => break,
					Some(Ok(_)) => {}
					Some(Err(e)) => {
						debug!("websocket read error for conn_id={}: {}", accepted.conn_id, e);
						break;
					}
				}
			}
			outbound = outbound_rx.recv() => {
				match outbound {
					Some(OutboundMsg::Frame(bytes)) => {
						if sink.send(WsMessage::Binary(bytes.into())).await.is_err() {
							break;
						}
					}
					Some(OutboundMsg::Close) | None => {
						let _ = sink.send(WsMessage::Close(None)).await;
						break;
					}
				}
			}
		}
	}
	room.disconnect(accepted.conn_id);
}

// vim: ts=4
