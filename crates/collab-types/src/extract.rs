//! Custom extractors used at the edge of the collab room server.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::prelude::*;
use crate::types::ActionSet;

// Credential //
//************//

/// The opaque bearer credential a client presented, forwarded verbatim to
/// the admin service. Not interpreted locally — this system never evaluates
/// authorization policy itself.
#[derive(Clone, Debug, Default)]
pub struct Credential(pub Option<Box<str>>);

impl<S> FromRequestParts<S> for Credential
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		if let Some(cred) = parts.extensions.get::<Credential>().cloned() {
			return Ok(cred);
		}
		let header = parts
			.headers
			.get(axum::http::header::AUTHORIZATION)
			.and_then(|v| v.to_str().ok())
			.map(Box::from);
		Ok(Credential(header))
	}
}

// ActionSetHeader //
//*****************//

/// The pre-computed action set for this request, read from `X-auth-actions`.
/// Absent means "unknown" — the Persistence Binder then asks the admin
/// service directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActionSetHeader(pub Option<ActionSet>);

impl<S> FromRequestParts<S> for ActionSetHeader
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let set = parts
			.headers
			.get("x-auth-actions")
			.and_then(|v| v.to_str().ok())
			.map(ActionSet::parse);
		Ok(ActionSetHeader(set))
	}
}


// vim: ts=4
