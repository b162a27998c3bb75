//! Error types for the broker role.

use thiserror::Error;

/// Errors that prevent the broker role from starting.
#[derive(Debug, Error)]
pub enum BrokerError {
	/// An endpoint could not be bound (typically: address already in use).
	#[error("failed to bind {endpoint}: {source}")]
	Bind {
		/// The endpoint the bind was attempted on.
		endpoint: String,
		/// The underlying transport error.
		#[source]
		source: zeromq::ZmqError,
	},
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
