//! Error types for the worker role.

use thiserror::Error;

/// Errors that prevent the worker role from starting.
#[derive(Debug, Error)]
pub enum WorkerError {
	/// The dispatcher could not connect to the broker's back endpoint.
	#[error("failed to connect to {endpoint}: {source}")]
	Connect {
		/// Endpoint the connection was attempted against.
		endpoint: String,
		/// The underlying transport error.
		#[source]
		source: zeromq::ZmqError,
	},
}

/// A failure reported by module code (the `start` hook or a callee).
///
/// Faults are caught and logged by the dispatcher; they never terminate
/// the dispatch loop.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ModuleError(String);

impl ModuleError {
	/// Creates a module error from a message.
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

impl From<String> for ModuleError {
	fn from(message: String) -> Self {
		Self(message)
	}
}

impl From<&str> for ModuleError {
	fn from(message: &str) -> Self {
		Self(message.to_string())
	}
}

/// Result type for worker-role operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
