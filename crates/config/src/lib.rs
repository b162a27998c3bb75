//! Configuration system for tether.
//!
//! Each module that speaks the protocol is described by one table in a TOML
//! file. The table names the serving port and the role flags for a process
//! hosting that module; everything else has defaults.
//!
//! ```toml
//! [modules.math]
//! port = 7170
//! start_server = true
//! retain_pending_callbacks = false
//!
//! [modules.math.registry]
//! capacity = 1024
//! ttl_ms = 30000
//! ```
//!
//! The front (client-facing) endpoint is the configured port; the back
//! (worker-facing) endpoint is `port + 1000`. Both are derived here so every
//! role agrees on the addressing scheme.

#![warn(missing_docs)]

pub mod error;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

pub use error::{ConfigError, Result};

/// Offset between a module's front (client) and back (worker) ports.
pub const BACK_PORT_OFFSET: u16 = 1000;

/// Parsed configuration: one entry per module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
	/// Per-module settings, keyed by module name.
	#[serde(default)]
	pub modules: HashMap<String, ModuleConfig>,
}

impl Config {
	/// Parses configuration from a TOML string and validates it.
	pub fn parse(source: &str) -> Result<Self> {
		let config: Self = toml::from_str(source)?;
		for (name, module) in &config.modules {
			if module.port.checked_add(BACK_PORT_OFFSET).is_none() {
				return Err(ConfigError::PortOutOfRange {
					module: name.clone(),
					port: module.port,
				});
			}
		}
		Ok(config)
	}

	/// Loads and parses a configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&source)
	}

	/// Returns the settings for `module`, or a typed error if absent.
	pub fn module(&self, module: &str) -> Result<&ModuleConfig> {
		self.modules
			.get(module)
			.ok_or_else(|| ConfigError::UnknownModule(module.to_string()))
	}
}

/// Settings for one module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
	/// Front (client-facing) port; the back endpoint binds `port + 1000`.
	pub port: u16,
	/// Host peers connect to.
	#[serde(default = "default_host")]
	pub host: String,
	/// Address bound endpoints listen on.
	#[serde(default = "default_bind_host")]
	pub bind_host: String,
	/// Whether this process instance hosts the broker.
	#[serde(default = "default_true")]
	pub start_server: bool,
	/// Whether this process instance serves work as a worker.
	///
	/// Defaults to following `start_server`, matching the combined
	/// broker-and-worker process shape; set explicitly to run a worker-only
	/// process against a remote broker.
	#[serde(default)]
	pub serve: Option<bool>,
	/// Keep resolved pending-call entries after first use (multi-shot
	/// callbacks). Retained entries must be released explicitly.
	#[serde(default)]
	pub retain_pending_callbacks: bool,
	/// Client-side pending-call registry bounds.
	#[serde(default)]
	pub registry: RegistryConfig,
}

impl ModuleConfig {
	/// Creates settings with defaults for everything but the port.
	pub fn with_port(port: u16) -> Self {
		Self {
			port,
			host: default_host(),
			bind_host: default_bind_host(),
			start_server: true,
			serve: None,
			retain_pending_callbacks: false,
			registry: RegistryConfig::default(),
		}
	}

	/// Whether this process serves work.
	pub fn serve(&self) -> bool {
		self.serve.unwrap_or(self.start_server)
	}

	/// Back (worker-facing) port.
	pub fn back_port(&self) -> u16 {
		// Validated at parse time; saturate rather than wrap for hand-built
		// configs that skipped Config::parse.
		self.port.saturating_add(BACK_PORT_OFFSET)
	}

	/// Endpoint clients connect to.
	pub fn front_endpoint(&self) -> String {
		format!("tcp://{}:{}", self.host, self.port)
	}

	/// Endpoint workers connect to.
	pub fn back_endpoint(&self) -> String {
		format!("tcp://{}:{}", self.host, self.back_port())
	}

	/// Bind address for the broker's front endpoint.
	pub fn front_bind_endpoint(&self) -> String {
		format!("tcp://{}:{}", self.bind_host, self.port)
	}

	/// Bind address for the broker's back endpoint.
	pub fn back_bind_endpoint(&self) -> String {
		format!("tcp://{}:{}", self.bind_host, self.back_port())
	}
}

/// Bounds for the client-side pending-call registry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
	/// Maximum number of simultaneously pending calls.
	#[serde(default = "default_capacity")]
	pub capacity: usize,
	/// Time-to-live for a pending call, in milliseconds.
	#[serde(default = "default_ttl_ms")]
	pub ttl_ms: u64,
}

impl RegistryConfig {
	/// Time-to-live as a [`Duration`].
	pub fn ttl(&self) -> Duration {
		Duration::from_millis(self.ttl_ms)
	}
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			capacity: default_capacity(),
			ttl_ms: default_ttl_ms(),
		}
	}
}

fn default_host() -> String {
	"127.0.0.1".to_string()
}

fn default_bind_host() -> String {
	"0.0.0.0".to_string()
}

fn default_true() -> bool {
	true
}

fn default_capacity() -> usize {
	1024
}

fn default_ttl_ms() -> u64 {
	30_000
}
