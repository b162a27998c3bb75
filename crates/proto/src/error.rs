//! Error types for wire encoding and decoding.

use thiserror::Error;

/// Errors that can occur when encoding or decoding protocol payloads.
#[derive(Debug, Error)]
pub enum ProtoError {
	/// The payload was not valid JSON or did not match the envelope shape.
	#[error("malformed payload: {0}")]
	Malformed(#[from] serde_json::Error),

	/// A callback identifier did not carry the expected wire prefix.
	#[error("invalid callback id: {0:?}")]
	InvalidCallbackId(String),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtoError>;
