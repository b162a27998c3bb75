//! Role composition for tether RPC.
//!
//! One process may hold up to three roles for a module at once: the client
//! stack (always), the broker (when the module's configuration says this
//! instance hosts it), and a worker serving the module's operations.
//! [`ModuleHost`] wires them together from a [`ModuleConfig`], with every
//! startup failure surfaced as an explicit error rather than absorbed.

#![warn(missing_docs)]

use tether_broker::Broker;
use tether_client::{CallbackRegistry, RemoteModule, RequestChannel, Retention};
use tether_config::ModuleConfig;
use tether_proto::ModuleDescriptor;
use tether_worker::{Module, WorkerDispatcher};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while starting a module host.
#[derive(Debug, Error)]
pub enum HostError {
	/// The broker role failed to start.
	#[error(transparent)]
	Broker(#[from] tether_broker::BrokerError),

	/// The worker role failed to start.
	#[error(transparent)]
	Worker(#[from] tether_worker::WorkerError),

	/// The client role failed to start.
	#[error(transparent)]
	Client(#[from] tether_client::ClientError),
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;

/// A module's composed roles, running in this process.
pub struct ModuleHost {
	remote: RemoteModule,
	channel: RequestChannel,
	broker: Option<JoinHandle<()>>,
	worker: Option<WorkerDispatcher>,
	cancel: CancellationToken,
}

impl ModuleHost {
	/// Starts every role the configuration asks for.
	///
	/// The broker (if `start_server`) binds first so locally served and
	/// locally issued calls find live endpoints; then the worker (if
	/// `serve`), then the client stack. Any failure aborts the start and is
	/// returned. When the configuration disables serving, `module` is simply
	/// dropped.
	pub async fn start<M: Module>(
		config: &ModuleConfig,
		descriptor: ModuleDescriptor,
		module: M,
	) -> Result<Self> {
		let cancel = CancellationToken::new();

		let broker = if config.start_server {
			let broker = Broker::bind(&config.front_bind_endpoint(), &config.back_bind_endpoint()).await?;
			Some(tokio::spawn(broker.run(cancel.child_token())))
		} else {
			None
		};

		let worker = if config.serve() {
			Some(WorkerDispatcher::start(&config.back_endpoint(), descriptor.clone(), module).await?)
		} else {
			None
		};

		let (remote, channel) = Self::client_stack(config, descriptor).await?;
		tracing::info!(
			module = remote.descriptor().name(),
			port = config.port,
			broker = broker.is_some(),
			worker = worker.is_some(),
			"module host started"
		);
		Ok(Self {
			remote,
			channel,
			broker,
			worker,
			cancel,
		})
	}

	/// Starts only the client stack, regardless of the role flags.
	///
	/// For short-lived clients of a module served elsewhere.
	pub async fn connect(config: &ModuleConfig, descriptor: ModuleDescriptor) -> Result<Self> {
		let cancel = CancellationToken::new();
		let (remote, channel) = Self::client_stack(config, descriptor).await?;
		Ok(Self {
			remote,
			channel,
			broker: None,
			worker: None,
			cancel,
		})
	}

	async fn client_stack(
		config: &ModuleConfig,
		descriptor: ModuleDescriptor,
	) -> Result<(RemoteModule, RequestChannel)> {
		let retention = if config.retain_pending_callbacks {
			Retention::Retain
		} else {
			Retention::SingleShot
		};
		let registry = CallbackRegistry::new(config.registry.capacity, config.registry.ttl(), retention);
		let channel = RequestChannel::connect(&config.front_endpoint(), registry).await?;
		let remote = RemoteModule::new(descriptor, channel.handle());
		Ok((remote, channel))
	}

	/// The remote stand-ins for the module's operations.
	pub fn remote(&self) -> &RemoteModule {
		&self.remote
	}

	/// Stops every role this host owns.
	pub async fn shutdown(self) {
		self.cancel.cancel();
		if let Some(worker) = self.worker {
			worker.shutdown().await;
		}
		self.channel.shutdown().await;
		if let Some(broker) = self.broker {
			let _ = broker.await;
		}
	}
}
