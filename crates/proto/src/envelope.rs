//! Request and reply envelopes and their JSON codec.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::value::{CallbackToken, Value};

/// Correlation identifier for one outstanding request.
///
/// Globally unique for the process lifetime. The operation-name prefix is
/// carried purely for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
	/// Mints a fresh id for a call to `operation`.
	pub fn mint(operation: &str) -> Self {
		Self(format!("{operation}-{}", Uuid::new_v4()))
	}

	/// Returns the id as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<String> for RequestId {
	fn from(raw: String) -> Self {
		Self(raw)
	}
}

/// A request from a client proxy to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
	/// Correlation id, echoed on every reply.
	#[serde(rename = "requestID")]
	pub request_id: RequestId,
	/// Name of the operation to invoke.
	pub callee: String,
	/// Positional arguments, callbacks already tokenized.
	pub args: Vec<Value>,
}

impl RequestEnvelope {
	/// Serializes the envelope to its JSON wire form.
	pub fn encode(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(self)?)
	}

	/// Parses an envelope from JSON wire bytes.
	pub fn decode(payload: &[u8]) -> Result<Self> {
		Ok(serde_json::from_slice(payload)?)
	}
}

/// A reply completing (one invocation of) a callback on an earlier request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
	/// Correlation id of the originating request.
	#[serde(rename = "requestID")]
	pub request_id: RequestId,
	/// Which of the request's callbacks this reply targets.
	#[serde(rename = "callbackID")]
	pub callback_id: CallbackToken,
	/// Positional arguments for the callback.
	pub data: Vec<serde_json::Value>,
}

impl ReplyEnvelope {
	/// Serializes the envelope to its JSON wire form.
	pub fn encode(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(self)?)
	}

	/// Parses an envelope from JSON wire bytes.
	pub fn decode(payload: &[u8]) -> Result<Self> {
		Ok(serde_json::from_slice(payload)?)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_ids_carry_operation_prefix() {
		let id = RequestId::mint("add");
		assert!(id.as_str().starts_with("add-"));
		assert_ne!(RequestId::mint("add"), RequestId::mint("add"));
	}

	#[test]
	fn request_wire_field_names() {
		let token = CallbackToken::mint();
		let envelope = RequestEnvelope {
			request_id: RequestId::from("add-X".to_string()),
			callee: "add".to_string(),
			args: vec![Value::Data(json!(2)), Value::Data(json!(3)), Value::Callback(token.clone())],
		};
		let wire: serde_json::Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
		assert_eq!(
			wire,
			json!({
				"requestID": "add-X",
				"callee": "add",
				"args": [2, 3, token.wire()],
			})
		);
	}

	#[test]
	fn request_decode_roundtrip() {
		let envelope = RequestEnvelope {
			request_id: RequestId::mint("mul"),
			callee: "mul".to_string(),
			args: vec![Value::Data(json!([1, "two"])), Value::Callback(CallbackToken::mint())],
		};
		let decoded = RequestEnvelope::decode(&envelope.encode().unwrap()).unwrap();
		assert_eq!(decoded, envelope);
	}

	#[test]
	fn reply_wire_field_names() {
		let token = CallbackToken::mint();
		let envelope = ReplyEnvelope {
			request_id: RequestId::from("add-X".to_string()),
			callback_id: token.clone(),
			data: vec![json!(5)],
		};
		let wire: serde_json::Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
		assert_eq!(
			wire,
			json!({
				"requestID": "add-X",
				"callbackID": token.wire(),
				"data": [5],
			})
		);
	}

	#[test]
	fn reply_rejects_unprefixed_callback_id() {
		let err = ReplyEnvelope::decode(br#"{"requestID":"a-1","callbackID":"nope","data":[]}"#);
		assert!(err.is_err());
	}

	#[test]
	fn undecodable_payload_is_an_error_not_a_panic() {
		assert!(RequestEnvelope::decode(b"{not json").is_err());
		assert!(ReplyEnvelope::decode(b"").is_err());
	}
}
