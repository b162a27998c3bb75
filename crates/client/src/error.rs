//! Error types for the client role.

use tether_proto::{ProtoError, RequestId};
use thiserror::Error;

/// Errors that prevent the client role from starting.
#[derive(Debug, Error)]
pub enum ClientError {
	/// The request channel could not connect to the module's endpoint.
	#[error("failed to connect to {endpoint}: {source}")]
	Connect {
		/// Endpoint the connection was attempted against.
		endpoint: String,
		/// The underlying transport error.
		#[source]
		source: zeromq::ZmqError,
	},
}

/// Failures delivered to a call's error path instead of its data callbacks.
///
/// A call that completes normally never sees one of these; they are the
/// explicit surfacing of conditions the base design left silent.
#[derive(Debug, Error)]
pub enum CallError {
	/// The pending call expired before any (further) reply arrived.
	#[error("request {request_id} expired before completion")]
	Expired {
		/// Id of the expired request.
		request_id: RequestId,
	},

	/// The pending-call registry is at capacity; the request was not sent.
	#[error("pending-call registry is full (capacity {capacity})")]
	RegistryFull {
		/// Configured registry capacity.
		capacity: usize,
	},

	/// The request envelope could not be serialized; the request was not sent.
	#[error("failed to encode request {request_id}: {source}")]
	Encode {
		/// Id of the unsendable request.
		request_id: RequestId,
		/// The underlying codec error.
		#[source]
		source: ProtoError,
	},
}

/// Errors from proxy construction.
#[derive(Debug, Error)]
pub enum ProxyError {
	/// The descriptor does not declare the requested operation.
	#[error("module {module} does not expose operation {operation}")]
	UnknownOperation {
		/// Module name from the descriptor.
		module: String,
		/// The undeclared operation.
		operation: String,
	},
}

/// Result type for client-role operations.
pub type Result<T> = std::result::Result<T, ClientError>;
