//! Error handling subsystem. Implements a custom Error type.

use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::prelude::*;
use crate::types::ErrorResponse;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	// Core errors
	NotFound,
	PermissionDenied,
	Unauthorized, // 401 - missing/invalid auth token

	// Input validation and constraints
	ValidationError(String), // 400 - missing/malformed request data
	PreconditionFailed(String), // 412 - admin ETag/If-Match mismatch

	// Network and external services
	NetworkError(String), // admin service / transport failures
	AdminUnavailable(String), // non-2xx, non-404, non-412 admin response

	// CRDT / conversion
	Decode(String), // wire protocol or update decode failure
	Convert(String), // HTML<->tree conversion failure

	// Durable storage
	Storage(String),

	// System and configuration
	ConfigError(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

impl Error {
	/// Same mapping as [`IntoResponse::into_response`], but attaches a debug
	/// stack-trace surrogate to the body when `include_stack` is set (§4.6
	/// step 5, §7, §9: stack inclusion is governed exclusively by the
	/// `RETURN_STACK_TRACES` configuration flag, never by caller input).
	pub fn into_response_with_stack(self, include_stack: bool) -> axum::response::Response {
		let stack = include_stack.then(|| format!("{self:?}"));
		let (status, mut body) = self.response_parts();
		if let Some(stack) = stack {
			body = body.with_stack(stack);
		}
		(status, Json(body)).into_response()
	}

	fn response_parts(self) -> (StatusCode, ErrorResponse) {
		let (status, code, message) = match self {
			Error::NotFound => (
				StatusCode::NOT_FOUND,
				"E-CORE-NOTFOUND".to_string(),
				"Resource not found".to_string(),
			),
			Error::PermissionDenied => (
				StatusCode::FORBIDDEN,
				"E-AUTH-NOPERM".to_string(),
				"You do not have permission to access this resource".to_string(),
			),
			Error::Unauthorized => (
				StatusCode::UNAUTHORIZED,
				"E-AUTH-UNAUTH".to_string(),
				"Authentication required or invalid token".to_string(),
			),
			Error::ValidationError(msg) => (
				StatusCode::BAD_REQUEST,
				"E-VAL-INVALID".to_string(),
				format!("Request validation failed: {}", msg),
			),
			Error::PreconditionFailed(msg) => (
				StatusCode::PRECONDITION_FAILED,
				"E-ADMIN-PRECOND".to_string(),
				format!("Precondition failed: {}", msg),
			),
			Error::Internal(msg) => {
				warn!("internal error: {}", msg);
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-CORE-INTERNAL".to_string(),
					"Internal server error".to_string(),
				)
			}
			Error::Io(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-SYS-IO".to_string(),
				"Internal server error".to_string(),
			),
			Error::NetworkError(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-NET-ERROR".to_string(),
				"Internal server error".to_string(),
			),
			Error::AdminUnavailable(_) => (
				StatusCode::BAD_GATEWAY,
				"E-ADMIN-UNAVAIL".to_string(),
				"Admin service is unavailable".to_string(),
			),
			Error::Decode(_) => (
				StatusCode::BAD_REQUEST,
				"E-CRDT-DECODE".to_string(),
				"Failed to decode sync message".to_string(),
			),
			Error::Convert(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-HTML-CONVERT".to_string(),
				"Internal server error".to_string(),
			),
			Error::Storage(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-STORAGE".to_string(),
				"Internal server error".to_string(),
			),
			Error::ConfigError(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-CONF-CFGERR".to_string(),
				"Internal server error".to_string(),
			),
		};

		(status, ErrorResponse::new(code, message))
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, body) = self.response_parts();
		(status, Json(body)).into_response()
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		warn!("json error: {}", err);
		Error::Decode(err.to_string())
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		warn!("tokio join error: {}", err);
		Error::Internal("task execution failed".into())
	}
}

impl From<hyper::Error> for Error {
	fn from(err: hyper::Error) -> Self {
		warn!("hyper error: {}", err);
		Error::NetworkError(err.to_string())
	}
}

impl From<hyper_util::client::legacy::Error> for Error {
	fn from(err: hyper_util::client::legacy::Error) -> Self {
		warn!("hyper error: {}", err);
		Error::NetworkError(err.to_string())
	}
}

impl From<hyper::http::Error> for Error {
	fn from(err: hyper::http::Error) -> Self {
		warn!("http error: {}", err);
		Error::NetworkError(err.to_string())
	}
}

impl From<redb::Error> for Error {
	fn from(err: redb::Error) -> Self {
		warn!("redb error: {}", err);
		Error::Storage(err.to_string())
	}
}

impl From<redb::TransactionError> for Error {
	fn from(err: redb::TransactionError) -> Self {
		warn!("redb transaction error: {}", err);
		Error::Storage(err.to_string())
	}
}

impl From<redb::TableError> for Error {
	fn from(err: redb::TableError) -> Self {
		warn!("redb table error: {}", err);
		Error::Storage(err.to_string())
	}
}

impl From<redb::StorageError> for Error {
	fn from(err: redb::StorageError) -> Self {
		warn!("redb storage error: {}", err);
		Error::Storage(err.to_string())
	}
}

impl From<redb::CommitError> for Error {
	fn from(err: redb::CommitError) -> Self {
		warn!("redb commit error: {}", err);
		Error::Storage(err.to_string())
	}
}

impl From<redb::DatabaseError> for Error {
	fn from(err: redb::DatabaseError) -> Self {
		warn!("redb database error: {}", err);
		Error::Storage(err.to_string())
	}
}

/// Helper macro for locking mutexes with automatic internal error handling.
#[macro_export]
macro_rules! lock {
	($mutex:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal("mutex poisoned".into()))
	};
	($mutex:expr, $context:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal(format!("mutex poisoned: {}", $context)))
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn body_json(response: axum::response::Response) -> serde_json::Value {
		let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.expect("response body");
		serde_json::from_slice(&bytes).expect("json body")
	}

	#[tokio::test]
	async fn maps_known_variants_to_their_status_and_code() {
		let response = Error::PreconditionFailed("stale etag".into()).into_response();
		assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
		let body = body_json(response).await;
		assert_eq!(body["error"]["code"], "E-ADMIN-PRECOND");
		assert!(body["error"]["stack"].is_null());
	}

	#[tokio::test]
	async fn stack_is_omitted_unless_explicitly_requested() {
		let response = Error::Internal("boom".into()).into_response();
		let body = body_json(response).await;
		assert!(body["error"]["stack"].is_null());
	}

	#[tokio::test]
	async fn stack_is_attached_only_when_include_stack_is_true() {
		let with_stack = Error::Internal("boom".into()).into_response_with_stack(true);
		let body = body_json(with_stack).await;
		assert!(body["error"]["stack"].is_string());

		let without_stack = Error::Internal("boom".into()).into_response_with_stack(false);
		let body = body_json(without_stack).await;
		assert!(body["error"]["stack"].is_null());
	}
}

// vim: ts=4
