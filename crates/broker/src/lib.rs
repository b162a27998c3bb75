//! Frame-relay broker for tether RPC.
//!
//! The broker is a pure relay: a ROUTER endpoint faces many short-lived
//! clients, a bound DEALER endpoint faces a pool of equivalent workers, and
//! every multipart message received on one side is forwarded
//! frame-for-frame to the other. Payloads are never parsed; the routing
//! frame the ROUTER stamps on each inbound request is echoed verbatim by
//! workers, which is all the state reply routing needs.
//!
//! Worker selection is round-robin: the bound DEALER rotates across its
//! connected peers. Requests that arrive before any worker has attached are
//! buffered in arrival order and flushed once one connects, so early
//! clients lose nothing.

#![warn(missing_docs)]

pub mod error;

use std::collections::VecDeque;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use zeromq::{DealerSocket, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

pub use error::{BrokerError, Result};

/// How often buffered requests are re-offered to the worker pool.
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// A bound broker, ready to relay.
pub struct Broker {
	front: RouterSocket,
	back: DealerSocket,
	front_endpoint: String,
	back_endpoint: String,
}

impl Broker {
	/// Binds the client-facing and worker-facing endpoints.
	///
	/// # Errors
	///
	/// Returns an error if either bind fails (typically: address already in
	/// use). The role does not start; nothing is silently absorbed.
	pub async fn bind(front: &str, back: &str) -> Result<Self> {
		let mut front_socket = RouterSocket::new();
		let front_endpoint = front_socket
			.bind(front)
			.await
			.map_err(|source| BrokerError::Bind {
				endpoint: front.to_string(),
				source,
			})?
			.to_string();
		let mut back_socket = DealerSocket::new();
		let back_endpoint = back_socket
			.bind(back)
			.await
			.map_err(|source| BrokerError::Bind {
				endpoint: back.to_string(),
				source,
			})?
			.to_string();
		tracing::info!(front = %front_endpoint, back = %back_endpoint, "broker endpoints bound");
		Ok(Self {
			front: front_socket,
			back: back_socket,
			front_endpoint,
			back_endpoint,
		})
	}

	/// The resolved client-facing endpoint.
	pub fn front_endpoint(&self) -> &str {
		&self.front_endpoint
	}

	/// The resolved worker-facing endpoint.
	pub fn back_endpoint(&self) -> &str {
		&self.back_endpoint
	}

	/// Runs the relay until cancelled or the transport fails.
	pub async fn run(self, cancel: CancellationToken) {
		let Self {
			mut front, mut back, ..
		} = self;
		let mut pending: VecDeque<ZmqMessage> = VecDeque::new();
		let mut flush = tokio::time::interval(FLUSH_INTERVAL);
		flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		loop {
			tokio::select! {
				_ = cancel.cancelled() => {
					tracing::info!("broker shutting down");
					break;
				}
				inbound = front.recv() => match inbound {
					Ok(message) => {
						pending.push_back(message);
						flush_pending(&mut back, &mut pending).await;
					}
					Err(error) => {
						tracing::error!(%error, "broker front receive failed, stopping relay");
						break;
					}
				},
				outbound = back.recv() => match outbound {
					Ok(message) => {
						// The first frame addresses the originating client;
						// if it has since disconnected, the reply is
						// best-effort and dropped.
						if let Err(error) = front.send(message).await {
							tracing::warn!(%error, "failed to relay reply to client, dropping");
						}
					}
					Err(error) => {
						tracing::error!(%error, "broker back receive failed, stopping relay");
						break;
					}
				},
				_ = flush.tick(), if !pending.is_empty() => {
					flush_pending(&mut back, &mut pending).await;
				}
			}
		}
	}
}

/// Offers buffered requests to the worker pool in arrival order.
///
/// The send fails while no worker is attached; the head of the queue stays
/// put and is re-offered on the next front message or flush tick. A message
/// is only popped after its send succeeds, so nothing is lost or
/// duplicated.
async fn flush_pending(back: &mut DealerSocket, pending: &mut VecDeque<ZmqMessage>) {
	while let Some(message) = pending.front() {
		match back.send(message.clone()).await {
			Ok(()) => {
				pending.pop_front();
			}
			Err(error) => {
				tracing::trace!(%error, queued = pending.len(), "no worker attached, buffering request");
				break;
			}
		}
	}
}
