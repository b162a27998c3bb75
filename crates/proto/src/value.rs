//! Tagged argument values and callback correlation tokens.
//!
//! A function-typed argument cannot cross the process boundary, so the proxy
//! substitutes a [`CallbackToken`] for it and the worker substitutes a live
//! reply handle back. In memory the distinction is a first-class variant on
//! [`Value`]; the `callback.<token>` string convention exists only at the
//! serde boundary.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Wire prefix marking a string as a callback correlation token.
pub const CALLBACK_PREFIX: &str = "callback.";

/// Opaque correlation marker standing in for a function argument.
///
/// Unique within its owning request. Serializes as `callback.<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackToken(String);

impl CallbackToken {
	/// Mints a fresh token.
	pub fn mint() -> Self {
		Self(Uuid::new_v4().simple().to_string())
	}

	/// Parses the wire form, returning `None` unless it carries the prefix.
	pub fn from_wire(s: &str) -> Option<Self> {
		s.strip_prefix(CALLBACK_PREFIX)
			.filter(|rest| !rest.is_empty())
			.map(|rest| Self(rest.to_string()))
	}

	/// Returns the wire form, prefix included.
	pub fn wire(&self) -> String {
		format!("{CALLBACK_PREFIX}{}", self.0)
	}
}

impl fmt::Display for CallbackToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{CALLBACK_PREFIX}{}", self.0)
	}
}

impl Serialize for CallbackToken {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.wire())
	}
}

impl<'de> Deserialize<'de> for CallbackToken {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		Self::from_wire(&raw).ok_or_else(|| D::Error::custom(format!("invalid callback id: {raw:?}")))
	}
}

/// A request argument: wire-representable data or a callback placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// A plain JSON scalar, array, or object, passed through unchanged.
	Data(serde_json::Value),
	/// A placeholder for a function argument, carried as a token.
	Callback(CallbackToken),
}

impl Value {
	/// Classifies a raw JSON value read off the wire.
	///
	/// A string carrying the callback prefix is a token; everything else is
	/// data. This is the only place the prefix convention is interpreted.
	pub fn from_wire(raw: serde_json::Value) -> Self {
		match raw {
			serde_json::Value::String(s) => match CallbackToken::from_wire(&s) {
				Some(token) => Value::Callback(token),
				None => Value::Data(serde_json::Value::String(s)),
			},
			other => Value::Data(other),
		}
	}

	/// Returns the contained token, if this is a callback placeholder.
	pub fn as_callback(&self) -> Option<&CallbackToken> {
		match self {
			Value::Callback(token) => Some(token),
			Value::Data(_) => None,
		}
	}
}

impl From<serde_json::Value> for Value {
	fn from(raw: serde_json::Value) -> Self {
		Value::Data(raw)
	}
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Value::Data(raw) => raw.serialize(serializer),
			Value::Callback(token) => serializer.serialize_str(&token.wire()),
		}
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = serde_json::Value::deserialize(deserializer)?;
		Ok(Self::from_wire(raw))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn tokens_are_distinct() {
		assert_ne!(CallbackToken::mint(), CallbackToken::mint());
	}

	#[test]
	fn token_wire_roundtrip() {
		let token = CallbackToken::mint();
		let parsed = CallbackToken::from_wire(&token.wire()).unwrap();
		assert_eq!(token, parsed);
	}

	#[test]
	fn bare_prefix_is_not_a_token() {
		assert!(CallbackToken::from_wire("callback.").is_none());
		assert!(CallbackToken::from_wire("call").is_none());
	}

	#[test]
	fn data_values_pass_through() {
		for raw in [json!(2), json!("hello"), json!([1, 2]), json!({"a": 1}), json!(null)] {
			let value = Value::from_wire(raw.clone());
			assert_eq!(value, Value::Data(raw.clone()));
			assert_eq!(serde_json::to_value(&value).unwrap(), raw);
		}
	}

	#[test]
	fn prefixed_string_classifies_as_callback() {
		let value = Value::from_wire(json!("callback.abc123"));
		assert!(matches!(&value, Value::Callback(t) if t.wire() == "callback.abc123"));
	}

	#[test]
	fn callback_serializes_to_prefixed_string() {
		let token = CallbackToken::mint();
		let wire = serde_json::to_value(Value::Callback(token.clone())).unwrap();
		assert_eq!(wire, json!(token.wire()));
	}
}
