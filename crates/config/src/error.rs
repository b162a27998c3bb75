//! Error types for configuration parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// No configuration block exists for the requested module.
	#[error("unknown module: {0}")]
	UnknownModule(String),

	/// The back endpoint (port + 1000) does not fit in a port number.
	#[error("module {module}: port {port} leaves no room for the back endpoint")]
	PortOutOfRange {
		/// Module whose port is invalid.
		module: String,
		/// The configured front port.
		port: u16,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
