//! Integration tests for the in-band admin API and the `ping` probe (§6),
//! driven through the real `axum::Router` returned by `routes::init`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::adapters::test_router;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
	let bytes = response.into_body().collect().await.expect("collect body").to_bytes();
	serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn ping_is_ungated_and_reports_ok() {
	let router = test_router(Some("s3cr3t"));
	let req = Request::builder().uri("/api/v1/ping").body(Body::empty()).expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
	let body = body_json(res).await;
	assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn syncadmin_requires_doc_query_param() {
	let router = test_router(None);
	let req = Request::builder().method("POST").uri("/api/v1/syncadmin").body(Body::empty()).expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn syncadmin_404s_when_the_room_does_not_exist() {
	let router = test_router(None);
	let req = Request::builder()
		.method("POST")
		.uri("/api/v1/syncadmin?doc=https://admin.da.live/source/a.html")
		.body(Body::empty())
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleteadmin_404s_when_the_room_does_not_exist() {
	let router = test_router(None);
	let req = Request::builder()
		.method("POST")
		.uri("/api/v1/deleteadmin?doc=https://admin.da.live/source/a.html")
		.body(Body::empty())
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_endpoints_reject_missing_shared_secret() {
	let router = test_router(Some("s3cr3t"));
	let req = Request::builder()
		.method("POST")
		.uri("/api/v1/syncadmin?doc=https://admin.da.live/source/a.html")
		.body(Body::empty())
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_endpoints_reject_wrong_shared_secret() {
	let router = test_router(Some("s3cr3t"));
	let req = Request::builder()
		.method("POST")
		.uri("/api/v1/syncadmin?doc=https://admin.da.live/source/a.html")
		.header("authorization", "token wrong")
		.body(Body::empty())
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_endpoints_accept_the_configured_shared_secret() {
	let router = test_router(Some("s3cr3t"));
	let req = Request::builder()
		.method("POST")
		.uri("/api/v1/syncadmin?doc=https://admin.da.live/source/a.html")
		.header("authorization", "token s3cr3t")
		.body(Body::empty())
		.expect("request");
	let res = router.oneshot(req).await.expect("response");
	// No room exists yet, but the shared-secret gate itself must pass.
	assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ping_is_exempt_from_the_shared_secret_gate() {
	let router = test_router(Some("s3cr3t"));
	let req = Request::builder().uri("/api/v1/ping").body(Body::empty()).expect("request");
	let res = router.oneshot(req).await.expect("response");
	assert_eq!(res.status(), StatusCode::OK);
}
