//! Worker-side dispatch loop.
//!
//! Connects to the broker's back endpoint as one of potentially many
//! equivalent workers, decodes request envelopes, resolves callees against
//! the module's descriptor, re-materializes callback placeholders into live
//! [`ReplyHandle`]s, and invokes the callee. Replies produced by the handles
//! drain through the same loop, tagged with the routing frame captured from
//! their originating request.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use tether_proto::{ModuleDescriptor, RequestEnvelope, Value};

use crate::error::{Result, WorkerError};
use crate::module::{CallArg, Module};
use crate::reply::{OutboundReply, ReplyHandle};

/// Connection attempts before giving up on the broker.
const MAX_CONNECT_ATTEMPTS: u32 = 10;

/// First retry delay; doubles per attempt up to [`MAX_CONNECT_DELAY`].
const INITIAL_CONNECT_DELAY: Duration = Duration::from_millis(100);

/// Ceiling for the connect backoff.
const MAX_CONNECT_DELAY: Duration = Duration::from_secs(2);

/// A running worker dispatch loop.
pub struct WorkerDispatcher {
	cancel: CancellationToken,
	task: JoinHandle<()>,
}

impl WorkerDispatcher {
	/// Connects to the broker's back endpoint and starts dispatching.
	///
	/// The module's `start` hook runs once, before the first request; its
	/// failure is logged and tolerated. Connect failures after bounded
	/// retries are returned — the role does not start.
	pub async fn start<M: Module>(endpoint: &str, descriptor: ModuleDescriptor, module: M) -> Result<Self> {
		let socket = connect_with_retry(endpoint).await?;
		tracing::info!(%endpoint, module = descriptor.name(), "worker connected");

		let cancel = CancellationToken::new();
		let task = tokio::spawn(run_loop(socket, descriptor, module, cancel.clone()));
		Ok(Self { cancel, task })
	}

	/// Stops the dispatch loop and waits for it to finish.
	pub async fn shutdown(self) {
		self.cancel.cancel();
		let _ = self.task.await;
	}
}

async fn connect_with_retry(endpoint: &str) -> Result<DealerSocket> {
	let mut delay = INITIAL_CONNECT_DELAY;
	for attempt in 1..=MAX_CONNECT_ATTEMPTS {
		let mut socket = DealerSocket::new();
		match socket.connect(endpoint).await {
			Ok(()) => return Ok(socket),
			Err(source) => {
				if attempt == MAX_CONNECT_ATTEMPTS {
					return Err(WorkerError::Connect {
						endpoint: endpoint.to_string(),
						source,
					});
				}
				tracing::debug!(%endpoint, attempt, %source, "worker connect failed, retrying");
				tokio::time::sleep(delay).await;
				delay = (delay * 2).min(MAX_CONNECT_DELAY);
			}
		}
	}
	unreachable!("loop returns on the last attempt")
}

async fn run_loop<M: Module>(
	mut socket: DealerSocket,
	descriptor: ModuleDescriptor,
	mut module: M,
	cancel: CancellationToken,
) {
	if let Err(error) = module.start() {
		tracing::error!(module = descriptor.name(), %error, "module start hook failed, continuing");
	}

	let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
	loop {
		tokio::select! {
			_ = cancel.cancelled() => break,
			reply = reply_rx.recv() => {
				// The loop holds a sender, so recv never yields None here.
				if let Some(reply) = reply {
					send_reply(&mut socket, reply).await;
				}
			}
			inbound = socket.recv() => match inbound {
				Ok(message) => handle_request(message, &descriptor, &mut module, &reply_tx),
				Err(error) => {
					tracing::error!(module = descriptor.name(), %error, "worker receive failed, stopping dispatch");
					break;
				}
			}
		}
	}
}

async fn send_reply(socket: &mut DealerSocket, reply: OutboundReply) {
	let mut frames = VecDeque::with_capacity(2);
	frames.push_back(reply.route);
	frames.push_back(Bytes::from(reply.payload));
	match ZmqMessage::try_from(frames) {
		Ok(message) => {
			if let Err(error) = socket.send(message).await {
				tracing::warn!(%error, "failed to transmit reply");
			}
		}
		Err(error) => {
			tracing::warn!(?error, "failed to assemble reply message");
		}
	}
}

/// Decodes and dispatches one inbound request. Every failure path drops the
/// message with a diagnostic; nothing here can take the loop down.
fn handle_request<M: Module>(
	message: ZmqMessage,
	descriptor: &ModuleDescriptor,
	module: &mut M,
	reply_tx: &mpsc::UnboundedSender<OutboundReply>,
) {
	let mut frames = message.into_vecdeque();
	let (Some(route), Some(payload)) = (frames.pop_front(), frames.pop_front()) else {
		tracing::warn!("dropping message with missing frames");
		return;
	};
	let envelope = match RequestEnvelope::decode(&payload) {
		Ok(envelope) => envelope,
		Err(error) => {
			tracing::warn!(%error, "dropping undecodable request");
			return;
		}
	};
	let RequestEnvelope {
		request_id,
		callee,
		args,
	} = envelope;
	if !descriptor.contains(&callee) {
		tracing::warn!(request_id = %request_id, %callee, "unknown callee, dropping request");
		return;
	}
	let args: Vec<CallArg> = args
		.into_iter()
		.map(|value| match value {
			Value::Data(data) => CallArg::Data(data),
			Value::Callback(token) => CallArg::Callback(ReplyHandle::new(
				request_id.clone(),
				token,
				route.clone(),
				reply_tx.clone(),
			)),
		})
		.collect();
	// Fire-and-forget: no return value is awaited or transmitted.
	if let Err(error) = module.invoke(&callee, args) {
		tracing::error!(request_id = %request_id, %callee, %error, "callee invocation failed");
	}
}
