//! Integration tests for the WebSocket upgrade endpoint's synchronous
//! rejection paths (§4.6 `serve`: steps 1-2, before any socket is accepted).

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::adapters::test_router;

fn upgrade_headers(req: axum::http::request::Builder) -> axum::http::request::Builder {
	req.header("connection", "upgrade")
		.header("upgrade", "websocket")
		.header("sec-websocket-version", "13")
		.header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
}

#[tokio::test]
async fn non_websocket_request_to_ws_is_rejected_with_400() {
	let router = test_router(None);
	let req = Request::builder().uri("/ws").body(Body::empty()).expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn websocket_upgrade_without_a_document_name_is_rejected_with_400() {
	let router = test_router(None);
	let req = upgrade_headers(Request::builder().uri("/ws")).body(Body::empty()).expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn websocket_upgrade_with_a_failing_binder_never_opens_the_socket() {
	let router = test_router(None);
	let req = upgrade_headers(Request::builder().uri("/ws?doc=https://admin.da.live/source/a.html")).body(Body::empty()).expect("request");
	let res = router.oneshot(req).await.expect("response");
	// The fake admin client has no scripted GET response, so the Persistence
	// Binder's Load Protocol fails and the upgrade never completes (§4.6
	// step 5: any binding failure becomes a plain HTTP error response, not a
	// socket that opens and immediately closes).
	assert_ne!(res.status(), StatusCode::SWITCHING_PROTOCOLS);
	assert!(res.status().is_client_error() || res.status().is_server_error());
}
