//! Common types shared across the collab room crates.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

// Timestamp //
//***********//
#[derive(Clone, Copy, Debug, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(res.as_secs() as i64)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::cmp::PartialEq for Timestamp {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}

impl std::cmp::Eq for Timestamp {}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

// DocName //
//*********//

/// The canonical URL that names a document, and therefore its Room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocName(pub Box<str>);

impl DocName {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for DocName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for DocName {
	fn from(s: &str) -> Self {
		DocName(s.into())
	}
}

impl From<String> for DocName {
	fn from(s: String) -> Self {
		DocName(s.into_boxed_str())
	}
}

/// The `{read, write}` subset allowed to a credential, as returned by the
/// admin service in `X-da-actions`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionSet {
	pub read: bool,
	pub write: bool,
}

impl ActionSet {
	/// Parse the `X-da-actions` header value: `"<action>=<policy>,…"`.
	/// Any action whose policy is "allow" grants it.
	pub fn parse(header: &str) -> Self {
		let mut set = ActionSet::default();
		for part in header.split(',') {
			let part = part.trim();
			let Some((action, policy)) = part.split_once('=') else { continue };
			let allowed = policy.trim().eq_ignore_ascii_case("allow");
			match action.trim() {
				"read" => set.read = set.read || allowed,
				"write" => set.write = set.write || allowed,
				_ => {}
			}
		}
		set
	}

	pub fn is_read_only(&self) -> bool {
		!self.write
	}
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
	pub error: ErrorDetails,
}

/// Error details with structured code and message
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
	pub code: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

impl ErrorResponse {
	pub fn new(code: String, message: String) -> Self {
		Self { error: ErrorDetails { code, message, stack: None } }
	}

	pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
		self.error.stack = Some(stack.into());
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn action_set_parses_allow_and_deny() {
		let set = ActionSet::parse("read=allow,write=deny");
		assert!(set.read);
		assert!(!set.write);
		assert!(set.is_read_only());
	}

	#[test]
	fn action_set_defaults_closed() {
		let set = ActionSet::parse("");
		assert!(!set.read);
		assert!(!set.write);
		assert!(set.is_read_only());
	}

	#[test]
	fn action_set_write_allow_grants_write() {
		let set = ActionSet::parse("read=allow,write=allow");
		assert!(!set.is_read_only());
	}
}

// vim: ts=4
