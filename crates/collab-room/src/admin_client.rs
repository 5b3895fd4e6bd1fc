//! Admin Service Client (SPEC_FULL §4.9): a small typed facade over the
//! admin service's GET/PUT contract, so the Persistence Binder and the
//! write-back observer never touch a raw HTTP client directly.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use collab_types::prelude::*;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::{Method, StatusCode};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;

/// Outcome of a conditional GET against the admin service (§4.4.1 step 3).
#[derive(Debug)]
pub enum GetOutcome {
	/// `304 Not Modified`: the caller should fall back to its cached state.
	NotModified,
	/// `2xx`: the authoritative body plus its ETag and action set.
	Modified { html: Box<str>, etag: Option<Box<str>>, actions: ActionSet },
}

/// Outcome of a write-back PUT to the admin service (§4.4.2 step d).
#[derive(Debug)]
pub enum PutOutcome {
	Ok { etag: Option<Box<str>> },
	AuthDenied,
	PreconditionFailed,
	Other(u16),
}

/// Narrow interface the Persistence Binder and write-back observer program
/// against; lets tests substitute a fake without standing up a real server.
#[async_trait]
pub trait AdminClient: Send + Sync {
	async fn get(&self, doc: &DocName, credential: Option<&str>, if_none_match: Option<&str>) -> ClResult<GetOutcome>;

	async fn put(&self, doc: &DocName, html: &str, authorization: Option<&str>) -> ClResult<PutOutcome>;
}

type HttpsClient = Client<HttpsConnector<HttpConnector>, BoxBody<Bytes, Error>>;

fn to_boxed<B>(body: B) -> BoxBody<Bytes, Error>
where
	B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
	B::Error: Send + 'static,
{
	body.map_err(|_| Error::NetworkError("body stream error".into())).boxed()
}

/// The real admin service client, backed by `hyper` over TLS.
pub struct HttpAdminClient {
	client: HttpsClient,
}

impl HttpAdminClient {
	pub fn new() -> ClResult<Self> {
		let connector = HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|_| Error::ConfigError("no native root CA certificates found".into()))?
			.https_or_http()
			.enable_http1()
			.build();
		Ok(Self { client: Client::builder(TokioExecutor::new()).build(connector) })
	}
}

#[async_trait]
impl AdminClient for HttpAdminClient {
	async fn get(&self, doc: &DocName, credential: Option<&str>, if_none_match: Option<&str>) -> ClResult<GetOutcome> {
		let mut builder = hyper::Request::builder().method(Method::GET).uri(doc.as_str());
		if let Some(cred) = credential {
			builder = builder.header(hyper::header::AUTHORIZATION, cred);
		}
		if let Some(etag) = if_none_match {
			builder = builder.header(hyper::header::IF_NONE_MATCH, etag);
		}
		let req = builder.body(to_boxed(Empty::new()))?;
		let res = self.client.request(req).await.map_err(Error::from)?;

		if res.status() == StatusCode::NOT_MODIFIED {
			return Ok(GetOutcome::NotModified);
		}
		if !res.status().is_success() {
			return Err(Error::AdminUnavailable(format!("GET {} -> {}", doc, res.status())));
		}

		let etag = res
			.headers()
			.get(hyper::header::ETAG)
			.and_then(|v| v.to_str().ok())
			.map(Box::from);
		let actions = res
			.headers()
			.get("x-da-actions")
			.and_then(|v| v.to_str().ok())
			.map(ActionSet::parse)
			.unwrap_or_default();
		let body = res.into_body().collect().await.map_err(Error::from)?.to_bytes();
		let html = String::from_utf8_lossy(&body).into_owned().into_boxed_str();
		Ok(GetOutcome::Modified { html, etag, actions })
	}

	async fn put(&self, doc: &DocName, html: &str, authorization: Option<&str>) -> ClResult<PutOutcome> {
		const BOUNDARY: &str = "----collab-room-write-back";
		let mut body = Vec::with_capacity(html.len() + 256);
		body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
		body.extend_from_slice(
			b"Content-Disposition: form-data; name=\"data\"\r\nContent-Type: text/html\r\n\r\n",
		);
		body.extend_from_slice(html.as_bytes());
		body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

		let mut builder = hyper::Request::builder()
			.method(Method::PUT)
			.uri(doc.as_str())
			.header(hyper::header::IF_MATCH, "*")
			.header("X-DA-Initiator", "collab")
			.header(hyper::header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
		if let Some(auth) = authorization {
			builder = builder.header(hyper::header::AUTHORIZATION, auth);
		}
		let req = builder.body(to_boxed(Full::from(body)))?;
		let res = self.client.request(req).await.map_err(Error::from)?;

		let status = res.status();
		if status.is_success() {
			let etag = res
				.headers()
				.get(hyper::header::ETAG)
				.and_then(|v| v.to_str().ok())
				.map(Box::from);
			return Ok(PutOutcome::Ok { etag });
		}
		match status {
			StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(PutOutcome::AuthDenied),
			StatusCode::PRECONDITION_FAILED => Ok(PutOutcome::PreconditionFailed),
			other => Ok(PutOutcome::Other(other.as_u16())),
		}
	}
}

pub type SharedAdminClient = Arc<dyn AdminClient>;

#[cfg(test)]
pub mod fake {
	use super::{AdminClient, GetOutcome, PutOutcome};
	use async_trait::async_trait;
	use collab_types::prelude::*;
	use std::sync::Mutex;

	/// A scripted admin client for binder/write-back tests.
	pub struct FakeAdminClient {
		pub get_responses: Mutex<Vec<ClResult<GetOutcome>>>,
		pub put_responses: Mutex<Vec<ClResult<PutOutcome>>>,
		pub put_calls: Mutex<Vec<Box<str>>>,
	}

	impl FakeAdminClient {
		pub fn new() -> Self {
			Self {
				get_responses: Mutex::new(Vec::new()),
				put_responses: Mutex::new(Vec::new()),
				put_calls: Mutex::new(Vec::new()),
			}
		}
	}

	impl Default for FakeAdminClient {
		fn default() -> Self {
			Self::new()
		}
	}

	#[async_trait]
	impl AdminClient for FakeAdminClient {
		async fn get(&self, _doc: &DocName, _credential: Option<&str>, _if_none_match: Option<&str>) -> ClResult<GetOutcome> {
			let mut responses = self.get_responses.lock().unwrap_or_else(|e| e.into_inner());
			if responses.is_empty() {
				return Err(Error::AdminUnavailable("no scripted GET response".into()));
			}
			responses.remove(0)
		}

		async fn put(&self, _doc: &DocName, html: &str, _authorization: Option<&str>) -> ClResult<PutOutcome> {
			self.put_calls.lock().unwrap_or_else(|e| e.into_inner()).push(Box::from(html));
			let mut responses = self.put_responses.lock().unwrap_or_else(|e| e.into_inner());
			if responses.is_empty() {
				return Err(Error::AdminUnavailable("no scripted PUT response".into()));
			}
			responses.remove(0)
		}
	}
}

// vim: ts=4
